//! In-memory platform: a time-series store, time rules, and fixture-defined
//! analyses. Backs the command-line tool and the test suites.

mod analysis;
mod fixture;
mod store;
mod time_rules;

pub use self::analysis::{Aggregate, FixtureAnalysis, FixtureOutput, Guard};
pub use self::fixture::{
    AnalysisSpec, ElementSpec, Fixture, MemoryPlatform, OutputSpec, TriggerSpec,
};
pub use self::store::MemoryStore;
pub use self::time_rules::{CronTimeRule, IntervalTimeRule, NaturalTimeRule, OpaqueTimeRule};
