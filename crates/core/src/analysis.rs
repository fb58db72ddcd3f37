//! Resolved analysis configuration and per-event evaluation state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeRef, TimeSeriesValue, Value};

// ── Severity ────────────────────────────────────────────────────────

/// Severity shared by configuration diagnostics and evaluation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Information => write!(f, "information"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "information" | "info" => Ok(Severity::Information),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity: '{}'", other)),
        }
    }
}

/// Operational status of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Enabled,
    Disabled,
}

// ── Configuration ───────────────────────────────────────────────────

/// A problem found while resolving an analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDiagnostic {
    pub severity: Severity,
    pub message: String,
}

impl ConfigDiagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// An output slot of the rule, bound or not to a destination attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOutput {
    pub name: String,
    pub attribute: Option<AttributeRef>,
}

/// A rule input. Only attribute inputs are backed by recorded data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputRef {
    Attribute(AttributeRef),
    Variable(String),
}

impl InputRef {
    pub fn attribute(&self) -> Option<&AttributeRef> {
        match self {
            InputRef::Attribute(attr) => Some(attr),
            InputRef::Variable(_) => None,
        }
    }
}

/// Resolved description of an analysis, produced once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub outputs: Vec<ResolvedOutput>,
    pub inputs: Vec<InputRef>,
    pub diagnostics: Vec<ConfigDiagnostic>,
}

impl Configuration {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Diagnostics of exactly `severity`, in declaration order.
    pub fn diagnostics_of(&self, severity: Severity) -> impl Iterator<Item = &ConfigDiagnostic> {
        self.diagnostics.iter().filter(move |d| d.severity == severity)
    }

    /// Attribute-backed inputs, in declaration order.
    pub fn input_attributes(&self) -> impl Iterator<Item = &AttributeRef> {
        self.inputs.iter().filter_map(InputRef::attribute)
    }

    /// Destination attributes of bound outputs, in declaration order.
    pub fn output_attributes(&self) -> impl Iterator<Item = &AttributeRef> {
        self.outputs.iter().filter_map(|o| o.attribute.as_ref())
    }
}

// ── Outputs ─────────────────────────────────────────────────────────

/// An event frame opened (and possibly closed) by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrameOutput {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// A value produced by one rule evaluation for one output slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputValue {
    TimeSeries(TimeSeriesValue),
    EventFrame(EventFrameOutput),
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputValue::TimeSeries(v) => write!(f, "{v}"),
            OutputValue::EventFrame(ef) => match ef.end {
                Some(end) => write!(f, "event frame '{}' {} to {}", ef.name, ef.start, end),
                None => write!(f, "event frame '{}' from {}", ef.name, ef.start),
            },
        }
    }
}

// ── Evaluation errors ───────────────────────────────────────────────

/// Closed set of evaluation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Raised deliberately by the rule engine with a declared severity.
    Domain(Severity),
    /// Anything the rule engine did not categorize.
    Unexpected,
}

/// Error recorded on the state by a failed evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationError {
    pub message: String,
    pub kind: ErrorKind,
}

impl EvaluationError {
    pub fn domain(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Domain(severity),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Unexpected,
        }
    }

    pub fn is_domain(&self) -> bool {
        matches!(self.kind, ErrorKind::Domain(_))
    }

    /// Declared severity; `None` for unexpected errors.
    pub fn severity(&self) -> Option<Severity> {
        match self.kind {
            ErrorKind::Domain(severity) => Some(severity),
            ErrorKind::Unexpected => None,
        }
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

// ── Evaluation state ────────────────────────────────────────────────

/// Mutable state for one evaluation.
///
/// `inputs` and `outputs` are parallel to the configuration's inputs and
/// resolved outputs; their lengths are fixed at construction and kept by
/// [`reset`](EvaluationState::reset).
#[derive(Debug, Clone)]
pub struct EvaluationState {
    execution_time: Option<DateTime<Utc>>,
    inputs: Vec<Option<Value>>,
    outputs: Vec<Option<OutputValue>>,
    error: Option<EvaluationError>,
}

impl EvaluationState {
    pub fn new(configuration: &Configuration) -> Self {
        Self {
            execution_time: None,
            inputs: vec![None; configuration.inputs.len()],
            outputs: vec![None; configuration.outputs.len()],
            error: None,
        }
    }

    /// Clear everything produced by the previous evaluation.
    pub fn reset(&mut self) {
        self.execution_time = None;
        self.inputs.iter_mut().for_each(|v| *v = None);
        self.outputs.iter_mut().for_each(|v| *v = None);
        self.error = None;
    }

    pub fn execution_time(&self) -> Option<DateTime<Utc>> {
        self.execution_time
    }

    pub fn set_execution_time(&mut self, time: DateTime<Utc>) {
        self.execution_time = Some(time);
    }

    pub fn inputs(&self) -> &[Option<Value>] {
        &self.inputs
    }

    /// Store an input value. Returns `false` when `index` is out of range.
    pub fn set_input(&mut self, index: usize, value: Option<Value>) -> bool {
        match self.inputs.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn outputs(&self) -> &[Option<OutputValue>] {
        &self.outputs
    }

    /// Store an output value. Returns `false` when `index` is out of range.
    pub fn set_output(&mut self, index: usize, value: OutputValue) -> bool {
        match self.outputs.get_mut(index) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn error(&self) -> Option<&EvaluationError> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: EvaluationError) {
        self.error = Some(error);
    }
}
