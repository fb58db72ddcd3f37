//! YAML fixture describing elements, analyses, and recorded data, and the
//! [`MemoryPlatform`] built from it.
//!
//! ```yaml
//! elements:
//!   - path: '\\plant\db\Unit1'
//!     analyses:
//!       - name: Hourly Average
//!         trigger: { kind: Periodic, every: 1h }
//!         inputs: ['|Temperature']
//!         outputs:
//!           - { name: Avg, attribute: '|TemperatureAvg', function: mean }
//! data:
//!   '\\plant\db\Unit1|Temperature':
//!     - { timestamp: '2024-01-01T09:15:00Z', value: 71.5 }
//! ```
//!
//! Attribute paths starting with `|` are relative to their element.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use recalc_core::time::parse_duration;
use recalc_core::{
    Analysis, AnalysisLookup, AnalysisStatus, AttributeRef, ConfigDiagnostic, PlatformError,
    RecordedValue, Result, TimeRule,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::analysis::{Aggregate, FixtureAnalysis, FixtureOutput, Guard};
use super::store::MemoryStore;
use super::time_rules::{CronTimeRule, IntervalTimeRule, NaturalTimeRule, OpaqueTimeRule};

// ── Schema ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    /// Attribute path → recorded values.
    #[serde(default)]
    pub data: BTreeMap<String, Vec<RecordedValue>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementSpec {
    pub path: String,
    #[serde(default)]
    pub analyses: Vec<AnalysisSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisSpec {
    pub name: String,
    #[serde(default = "default_status")]
    pub status: AnalysisStatus,
    pub trigger: TriggerSpec,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub guard: Option<Guard>,
    /// Diagnostics reported verbatim by the resolved configuration.
    #[serde(default)]
    pub diagnostics: Vec<ConfigDiagnostic>,
}

fn default_status() -> AnalysisStatus {
    AnalysisStatus::Enabled
}

/// Trigger declaration. `kind` is passed through as the time rule's kind,
/// so unknown kinds reach the engine unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSpec {
    pub kind: String,
    /// Periodic interval, e.g. `15m`.
    #[serde(default)]
    pub every: Option<String>,
    /// Alignment offset for `every`.
    #[serde(default)]
    pub offset: Option<String>,
    /// Periodic cron schedule (5 or 6 fields).
    #[serde(default)]
    pub cron: Option<String>,
}

impl TriggerSpec {
    pub fn build(&self) -> Result<Box<dyn TimeRule>> {
        match self.kind.as_str() {
            "Periodic" => match (&self.every, &self.cron) {
                (Some(every), None) => {
                    let period = parse_duration(every)
                        .ok_or_else(|| PlatformError::InvalidDuration(every.clone()))?;
                    let offset = match &self.offset {
                        Some(raw) => parse_duration(raw)
                            .ok_or_else(|| PlatformError::InvalidDuration(raw.clone()))?,
                        None => chrono::Duration::zero(),
                    };
                    Ok(Box::new(IntervalTimeRule::new(period, offset)?))
                }
                (None, Some(cron)) => Ok(Box::new(CronTimeRule::new(cron)?)),
                _ => Err(PlatformError::Parse(
                    "a Periodic trigger needs exactly one of `every` or `cron`".to_string(),
                )),
            },
            "Natural" => Ok(Box::new(NaturalTimeRule)),
            other => Ok(Box::new(OpaqueTimeRule::new(other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSpec {
    pub name: String,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub function: Aggregate,
    #[serde(default)]
    pub event_frame: bool,
}

fn resolve_path(element: &str, path: &str) -> String {
    if path.starts_with('|') {
        format!("{element}{path}")
    } else {
        path.to_string()
    }
}

// ── Loading ─────────────────────────────────────────────────────────

impl Fixture {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| PlatformError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        serde_yaml::from_str(&yaml)
            .map_err(|e| PlatformError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Build the in-memory platform: seed the store and construct every analysis.
    pub fn into_platform(self) -> Result<MemoryPlatform> {
        let store = Arc::new(MemoryStore::new());
        let mut points = 0usize;
        for (attribute, values) in &self.data {
            for recorded in values {
                store.insert(attribute, recorded.timestamp, recorded.value.clone());
                points += 1;
            }
        }

        let mut elements = Vec::with_capacity(self.elements.len());
        for element in self.elements {
            let mut analyses = Vec::with_capacity(element.analyses.len());
            for spec in element.analyses {
                analyses.push(build_analysis(&element.path, spec, Arc::clone(&store))?);
            }
            elements.push(Element {
                path: element.path,
                analyses,
            });
        }

        info!(
            elements = elements.len(),
            attributes = self.data.len(),
            points,
            "fixture platform ready"
        );
        Ok(MemoryPlatform { store, elements })
    }
}

fn build_analysis(element: &str, spec: AnalysisSpec, store: Arc<MemoryStore>) -> Result<FixtureAnalysis> {
    let time_rule = spec.trigger.build().map_err(|e| {
        PlatformError::Parse(format!("analysis '{}|{}': {}", element, spec.name, e))
    })?;
    Ok(FixtureAnalysis {
        path: format!("{}|{}", element, spec.name),
        status: spec.status,
        time_rule,
        inputs: spec
            .inputs
            .iter()
            .map(|p| AttributeRef::from_path(&resolve_path(element, p)))
            .collect(),
        outputs: spec
            .outputs
            .into_iter()
            .map(|o| FixtureOutput {
                attribute: o
                    .attribute
                    .as_deref()
                    .map(|p| AttributeRef::from_path(&resolve_path(element, p))),
                name: o.name,
                function: o.function,
                event_frame: o.event_frame,
            })
            .collect(),
        guard: spec.guard,
        diagnostics: spec.diagnostics,
        store,
    })
}

// ── Platform ────────────────────────────────────────────────────────

struct Element {
    path: String,
    analyses: Vec<FixtureAnalysis>,
}

/// Elements and analyses from a fixture, sharing one [`MemoryStore`].
pub struct MemoryPlatform {
    store: Arc<MemoryStore>,
    elements: Vec<Element>,
}

impl MemoryPlatform {
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn has_element(&self, path: &str) -> bool {
        self.elements.iter().any(|e| e.path.eq_ignore_ascii_case(path))
    }
}

impl AnalysisLookup for MemoryPlatform {
    fn find_analysis(&self, element_path: &str, analysis_name: &str) -> Result<&dyn Analysis> {
        let element = self
            .elements
            .iter()
            .find(|e| e.path.eq_ignore_ascii_case(element_path))
            .ok_or_else(|| PlatformError::NotFound(format!("element '{element_path}'")))?;
        element
            .analyses
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(analysis_name))
            .map(|a| a as &dyn Analysis)
            .ok_or_else(|| {
                PlatformError::NotFound(format!("analysis '{element_path}|{analysis_name}'"))
            })
    }
}
