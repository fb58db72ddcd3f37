//! Analysis recalculation engine.
//!
//! This crate provides:
//! - Event discovery for periodic and natural triggers
//! - Configuration validation and error triage
//! - The evaluation orchestrator and its batched output publisher
//! - An in-memory platform loaded from YAML fixtures

pub mod classify;
pub mod error;
pub mod events;
pub mod executor;
pub mod memory;
pub mod publisher;
pub mod validation;

pub use error::{EventError, RunError};
pub use executor::{EvaluationOrchestrator, RunOutcome, RunReport};
pub use publisher::{FlushReport, OutputPublisher};
