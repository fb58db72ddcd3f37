//! Contracts for the platform collaborators the engine drives.
//!
//! The engine never evaluates rules, stores values, or resolves paths on its
//! own. It reaches the host platform only through these traits:
//!
//! - [`Analysis`]: one analysis definition (status, trigger, configuration,
//!   evaluation step)
//! - [`TimeRule`]: the analysis's triggering mechanism
//! - [`AttributeData`]: recorded-value queries
//! - [`ValueWriter`]: the batched write
//! - [`AnalysisLookup`]: path-based resolution, used by entry points only
//!
//! All calls are blocking.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisStatus, Configuration, EvaluationState};
use crate::attribute::{AttributeRef, RecordedValue, TimeSeriesValue};
use crate::error::Result;
use crate::time::TimeRange;

// ── Triggering ──────────────────────────────────────────────────────

/// Triggering mechanism kinds the engine knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    Periodic,
    Natural,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Periodic => write!(f, "Periodic"),
            TriggerKind::Natural => write!(f, "Natural"),
        }
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Periodic" => Ok(TriggerKind::Periodic),
            "Natural" => Ok(TriggerKind::Natural),
            other => Err(format!("unknown trigger kind: '{}'", other)),
        }
    }
}

/// The interval a time rule assigns to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An analysis's triggering mechanism.
pub trait TimeRule {
    /// Declared kind name, e.g. `"Periodic"`. Unrecognized names are
    /// rejected by the engine.
    fn kind(&self) -> &str;

    /// The next event whose window starts at or after `after`.
    fn next_event(&self, after: DateTime<Utc>) -> Result<EventWindow>;
}

// ── Analysis ────────────────────────────────────────────────────────

/// One analysis definition as exposed by the host platform.
pub trait Analysis {
    /// Full path, used in operator messages.
    fn path(&self) -> String;

    fn status(&self) -> AnalysisStatus;

    fn time_rule(&self) -> &dyn TimeRule;

    /// Resolve the configuration, including diagnostics.
    fn configuration(&self) -> Result<Configuration>;

    /// Populate `state.inputs()` for `state.execution_time()`. Failures are
    /// recorded on the state, not returned.
    fn populate_inputs(&self, state: &mut EvaluationState);

    /// Run the rule once. Outputs and any error are recorded on the state.
    fn evaluate(&self, state: &mut EvaluationState);
}

/// Resolves an analysis from an element path and an analysis name.
pub trait AnalysisLookup {
    fn find_analysis(&self, element_path: &str, analysis_name: &str) -> Result<&dyn Analysis>;
}

// ── Data access ─────────────────────────────────────────────────────

/// How a recorded-values query treats the range edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryType {
    /// Only values recorded within the range.
    Inside,
    /// Values within the range plus the nearest one beyond each edge.
    Outside,
}

/// Recorded-value queries against the store.
pub trait AttributeData {
    fn recorded_values(
        &self,
        attribute: &AttributeRef,
        range: &TimeRange,
        boundary: BoundaryType,
    ) -> Result<Vec<RecordedValue>>;
}

// ── Writes ──────────────────────────────────────────────────────────

/// How a write treats an existing value at the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Overwrite the existing value.
    Replace,
    /// Fail the item if a value already exists.
    Insert,
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(UpdateMode::Replace),
            "insert" => Ok(UpdateMode::Insert),
            other => Err(format!("unknown update mode: '{}'", other)),
        }
    }
}

/// Tier of the write path a destination error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestinationTier {
    /// The asset server holding attribute definitions.
    AssetServer,
    /// The data archive holding the time series.
    DataArchive,
}

impl fmt::Display for DestinationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationTier::AssetServer => write!(f, "asset server"),
            DestinationTier::DataArchive => write!(f, "data archive"),
        }
    }
}

/// A failure attributed to a whole destination on the write path.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationError {
    pub tier: DestinationTier,
    pub destination: String,
    pub message: String,
}

/// A failure attributed to one submitted value.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemError {
    pub value: TimeSeriesValue,
    pub message: String,
}

/// Per-origin failure detail returned by a completed batched write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteErrors {
    pub destinations: Vec<DestinationError>,
    pub items: Vec<ItemError>,
}

impl WriteErrors {
    pub fn has_errors(&self) -> bool {
        !self.destinations.is_empty() || !self.items.is_empty()
    }
}

/// The batched write.
pub trait ValueWriter {
    /// Write every value in one call. `Err` means the call itself failed
    /// and nothing can be said about individual values.
    fn update_values(&self, values: &[TimeSeriesValue], mode: UpdateMode) -> Result<WriteErrors>;
}
