//! Shared data model and platform contracts for analysis recalculation.

pub mod analysis;
pub mod attribute;
pub mod config;
pub mod error;
pub mod platform;
pub mod time;

pub use analysis::*;
pub use attribute::*;
pub use config::Config;
pub use error::*;
pub use platform::*;
pub use time::TimeRange;
