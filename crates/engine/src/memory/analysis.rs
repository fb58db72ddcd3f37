//! [`FixtureAnalysis`]: an analysis whose rule is a fixed aggregate over its
//! inputs, evaluated against a [`MemoryStore`].

use std::sync::Arc;

use recalc_core::{
    Analysis, AnalysisStatus, AttributeRef, ConfigDiagnostic, Configuration, EvaluationError,
    EvaluationState, EventFrameOutput, InputRef, OutputValue, ResolvedOutput, Result, Severity,
    TimeRule, TimeSeriesValue, Value,
};
use serde::{Deserialize, Serialize};

use super::store::MemoryStore;

/// Aggregate functions available to fixture outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Sum,
    #[default]
    Mean,
    Min,
    Max,
    Count,
    First,
    Last,
}

impl Aggregate {
    /// Apply to the input values in declaration order. `None` when the
    /// function is undefined for an empty input set.
    pub fn apply(self, values: &[f64]) -> Option<Value> {
        match self {
            Aggregate::Sum => Some(Value::Float(values.iter().sum())),
            Aggregate::Mean => {
                if values.is_empty() {
                    None
                } else {
                    Some(Value::Float(values.iter().sum::<f64>() / values.len() as f64))
                }
            }
            Aggregate::Min => values.iter().copied().reduce(f64::min).map(Value::Float),
            Aggregate::Max => values.iter().copied().reduce(f64::max).map(Value::Float),
            Aggregate::Count => Some(Value::Integer(values.len() as i64)),
            Aggregate::First => values.first().copied().map(Value::Float),
            Aggregate::Last => values.last().copied().map(Value::Float),
        }
    }
}

/// Raises an evaluation error when any computed output exceeds `above`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub above: f64,
    #[serde(default = "default_guard_severity")]
    pub severity: Severity,
    /// Raise an uncategorized error instead of a domain error.
    #[serde(default)]
    pub unexpected: bool,
}

fn default_guard_severity() -> Severity {
    Severity::Warning
}

/// One output slot of a fixture analysis.
#[derive(Debug, Clone)]
pub struct FixtureOutput {
    pub name: String,
    pub attribute: Option<AttributeRef>,
    pub function: Aggregate,
    /// Produce an event frame instead of a time-series value.
    pub event_frame: bool,
}

/// Analysis backed by the in-memory store.
pub struct FixtureAnalysis {
    pub(crate) path: String,
    pub(crate) status: AnalysisStatus,
    pub(crate) time_rule: Box<dyn TimeRule>,
    pub(crate) inputs: Vec<AttributeRef>,
    pub(crate) outputs: Vec<FixtureOutput>,
    pub(crate) guard: Option<Guard>,
    pub(crate) diagnostics: Vec<ConfigDiagnostic>,
    pub(crate) store: Arc<MemoryStore>,
}

impl FixtureAnalysis {
    pub fn name(&self) -> &str {
        self.path.rsplit('|').next().unwrap_or(&self.path)
    }

    fn check_guard(&self, values: &[(usize, Value)]) -> Option<EvaluationError> {
        let guard = self.guard.as_ref()?;
        let (index, value) = values
            .iter()
            .find(|(_, v)| v.as_f64().is_some_and(|n| n > guard.above))?;
        let message = format!(
            "'{}' computed {} which is above the limit of {}",
            self.outputs[*index].name, value, guard.above
        );
        Some(if guard.unexpected {
            EvaluationError::unexpected(message)
        } else {
            EvaluationError::domain(message, guard.severity)
        })
    }
}

impl Analysis for FixtureAnalysis {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn status(&self) -> AnalysisStatus {
        self.status
    }

    fn time_rule(&self) -> &dyn TimeRule {
        self.time_rule.as_ref()
    }

    fn configuration(&self) -> Result<Configuration> {
        let mut diagnostics = self.diagnostics.clone();
        for output in self.outputs.iter().filter(|o| o.attribute.is_none()) {
            diagnostics.push(ConfigDiagnostic::warning(format!(
                "Output '{}' is not mapped to an attribute",
                output.name
            )));
        }
        Ok(Configuration {
            outputs: self
                .outputs
                .iter()
                .map(|o| ResolvedOutput {
                    name: o.name.clone(),
                    attribute: o.attribute.clone(),
                })
                .collect(),
            inputs: self.inputs.iter().cloned().map(InputRef::Attribute).collect(),
            diagnostics,
        })
    }

    fn populate_inputs(&self, state: &mut EvaluationState) {
        let Some(at) = state.execution_time() else {
            state.set_error(EvaluationError::unexpected("execution time is not set"));
            return;
        };
        for (index, input) in self.inputs.iter().enumerate() {
            match self.store.latest_at(&input.id, at) {
                Ok(Some(recorded)) => {
                    state.set_input(index, Some(recorded.value));
                }
                Ok(None) => {
                    state.set_error(EvaluationError::domain(
                        format!("No data for input '{}' at {}", input.name, at),
                        Severity::Warning,
                    ));
                    return;
                }
                Err(e) => {
                    state.set_error(EvaluationError::unexpected(e.to_string()));
                    return;
                }
            }
        }
    }

    fn evaluate(&self, state: &mut EvaluationState) {
        let Some(at) = state.execution_time() else {
            state.set_error(EvaluationError::unexpected("execution time is not set"));
            return;
        };

        let mut numbers = Vec::with_capacity(self.inputs.len());
        let mut non_numeric = None;
        for (input, value) in self.inputs.iter().zip(state.inputs()) {
            match value.as_ref().and_then(Value::as_f64) {
                Some(n) => numbers.push(n),
                None => {
                    non_numeric = Some(input);
                    break;
                }
            }
        }
        if let Some(input) = non_numeric {
            let message = format!("Input '{}' is not numeric", input.name);
            state.set_error(EvaluationError::unexpected(message));
            return;
        }

        let mut computed = Vec::with_capacity(self.outputs.len());
        for (index, output) in self.outputs.iter().enumerate() {
            match output.function.apply(&numbers) {
                Some(value) => computed.push((index, value)),
                None => {
                    state.set_error(EvaluationError::domain(
                        format!("'{}' is undefined without input values", output.name),
                        Severity::Warning,
                    ));
                    return;
                }
            }
        }

        if let Some(err) = self.check_guard(&computed) {
            state.set_error(err);
            return;
        }

        for (index, value) in computed {
            let output = &self.outputs[index];
            let produced = if output.event_frame {
                OutputValue::EventFrame(EventFrameOutput {
                    name: output.name.clone(),
                    start: at,
                    end: None,
                })
            } else {
                OutputValue::TimeSeries(TimeSeriesValue::new(at, value))
            };
            state.set_output(index, produced);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::memory::NaturalTimeRule;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn make_analysis(guard: Option<Guard>) -> FixtureAnalysis {
        let store = Arc::new(MemoryStore::new());
        store.insert("a", at("2024-01-01T09:00:00Z"), Value::Float(2.0));
        store.insert("b", at("2024-01-01T09:30:00Z"), Value::Float(6.0));
        FixtureAnalysis {
            path: r"\\af\db\Plant|Mix".into(),
            status: AnalysisStatus::Enabled,
            time_rule: Box::new(NaturalTimeRule),
            inputs: vec![AttributeRef::new("a", "A"), AttributeRef::new("b", "B")],
            outputs: vec![
                FixtureOutput {
                    name: "Avg".into(),
                    attribute: Some(AttributeRef::new("avg", "Avg")),
                    function: Aggregate::Mean,
                    event_frame: false,
                },
                FixtureOutput {
                    name: "Peak".into(),
                    attribute: None,
                    function: Aggregate::Max,
                    event_frame: false,
                },
            ],
            guard,
            diagnostics: Vec::new(),
            store,
        }
    }

    fn evaluate_at(analysis: &FixtureAnalysis, t: &str) -> EvaluationState {
        let config = analysis.configuration().unwrap();
        let mut state = EvaluationState::new(&config);
        state.set_execution_time(at(t));
        analysis.populate_inputs(&mut state);
        if state.error().is_none() {
            analysis.evaluate(&mut state);
        }
        state
    }

    // -- aggregates -------------------------------------------------------

    #[test]
    fn aggregate_functions() {
        let values = [3.0, 1.0, 2.0];
        assert_eq!(Aggregate::Sum.apply(&values), Some(Value::Float(6.0)));
        assert_eq!(Aggregate::Mean.apply(&values), Some(Value::Float(2.0)));
        assert_eq!(Aggregate::Min.apply(&values), Some(Value::Float(1.0)));
        assert_eq!(Aggregate::Max.apply(&values), Some(Value::Float(3.0)));
        assert_eq!(Aggregate::Count.apply(&values), Some(Value::Integer(3)));
        assert_eq!(Aggregate::First.apply(&values), Some(Value::Float(3.0)));
        assert_eq!(Aggregate::Last.apply(&values), Some(Value::Float(2.0)));
    }

    #[test]
    fn aggregates_on_empty_input() {
        assert_eq!(Aggregate::Mean.apply(&[]), None);
        assert_eq!(Aggregate::Max.apply(&[]), None);
        assert_eq!(Aggregate::Sum.apply(&[]), Some(Value::Float(0.0)));
        assert_eq!(Aggregate::Count.apply(&[]), Some(Value::Integer(0)));
    }

    // -- analysis ---------------------------------------------------------

    #[test]
    fn configuration_warns_about_unmapped_outputs() {
        let config = make_analysis(None).configuration().unwrap();
        assert_eq!(config.inputs.len(), 2);
        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.diagnostics.len(), 1);
        assert_eq!(config.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn evaluates_latest_values() {
        let state = evaluate_at(&make_analysis(None), "2024-01-01T10:00:00Z");
        assert!(state.error().is_none());
        match &state.outputs()[0] {
            Some(OutputValue::TimeSeries(v)) => {
                assert_eq!(v.value, Value::Float(4.0));
                assert_eq!(v.timestamp, at("2024-01-01T10:00:00Z"));
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn missing_input_is_a_warning() {
        let state = evaluate_at(&make_analysis(None), "2024-01-01T09:10:00Z");
        let err = state.error().unwrap();
        assert_eq!(err.severity(), Some(Severity::Warning));
        assert!(err.message.contains("'B'"));
    }

    #[test]
    fn guard_raises_configured_error() {
        let guard = Guard {
            above: 5.0,
            severity: Severity::Error,
            unexpected: false,
        };
        let state = evaluate_at(&make_analysis(Some(guard)), "2024-01-01T10:00:00Z");
        let err = state.error().unwrap();
        assert_eq!(err.severity(), Some(Severity::Error));
        assert!(err.message.contains("Peak"));
        assert!(state.outputs().iter().all(Option::is_none));
    }

    #[test]
    fn guard_can_raise_unexpected_error() {
        let guard = Guard {
            above: 0.0,
            severity: Severity::Warning,
            unexpected: true,
        };
        let state = evaluate_at(&make_analysis(Some(guard)), "2024-01-01T10:00:00Z");
        assert!(!state.error().unwrap().is_domain());
    }

    #[test]
    fn text_input_is_unexpected() {
        let analysis = make_analysis(None);
        analysis
            .store
            .insert("a", at("2024-01-01T09:45:00Z"), Value::Text("Bad Input".into()));
        let state = evaluate_at(&analysis, "2024-01-01T10:00:00Z");
        assert!(!state.error().unwrap().is_domain());
    }
}
