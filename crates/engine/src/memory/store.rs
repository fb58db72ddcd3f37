//! [`MemoryStore`]: an in-process time-series store with injectable faults.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use recalc_core::{
    AttributeData, AttributeRef, BoundaryType, DestinationError, DestinationTier, ItemError,
    PlatformError, RecordedValue, Result, TimeRange, TimeSeriesValue, UpdateMode, Value,
    ValueWriter, WriteErrors,
};
use tracing::debug;

#[derive(Default)]
struct Faults {
    /// Every read and write fails with this message.
    offline: Option<String>,
    destinations: Vec<DestinationError>,
    /// Attribute id → rejection message.
    attributes: HashMap<String, String>,
}

/// Time-series store keyed by attribute id.
///
/// Implements both [`AttributeData`] and [`ValueWriter`], so one instance
/// can back a whole run. Faults can be injected to exercise partial and
/// total write failures.
#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<String, BTreeMap<DateTime<Utc>, Value>>>,
    faults: RwLock<Faults>,
    written: RwLock<Vec<TimeSeriesValue>>,
    write_calls: RwLock<usize>,
}

fn poisoned(what: &str) -> PlatformError {
    PlatformError::Store(format!("{what} lock poisoned"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value, replacing any value at the same timestamp.
    pub fn insert(&self, attribute_id: &str, timestamp: DateTime<Utc>, value: Value) {
        if let Ok(mut series) = self.series.write() {
            series
                .entry(attribute_id.to_string())
                .or_default()
                .insert(timestamp, value);
        }
    }

    /// Recorded values of `attribute_id` within `range`, both edges included.
    pub fn values(&self, attribute_id: &str, range: &TimeRange) -> Vec<RecordedValue> {
        let Ok(series) = self.series.read() else {
            return Vec::new();
        };
        series
            .get(attribute_id)
            .map(|values| {
                values
                    .range(range.start()..=range.end())
                    .map(|(t, v)| RecordedValue {
                        timestamp: *t,
                        value: v.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Latest value recorded at or before `at`.
    pub fn latest_at(&self, attribute_id: &str, at: DateTime<Utc>) -> Result<Option<RecordedValue>> {
        self.check_online()?;
        let series = self.series.read().map_err(|_| poisoned("series"))?;
        Ok(series.get(attribute_id).and_then(|values| {
            values.range(..=at).next_back().map(|(t, v)| RecordedValue {
                timestamp: *t,
                value: v.clone(),
            })
        }))
    }

    /// Every value accepted by [`ValueWriter::update_values`], in write order.
    pub fn written(&self) -> Vec<TimeSeriesValue> {
        self.written.read().map(|w| w.clone()).unwrap_or_default()
    }

    /// Number of batched write calls received.
    pub fn write_calls(&self) -> usize {
        self.write_calls.read().map(|n| *n).unwrap_or_default()
    }

    // -- faults -----------------------------------------------------------

    /// Fail every subsequent call with a connection error.
    pub fn set_offline(&self, message: &str) {
        if let Ok(mut faults) = self.faults.write() {
            faults.offline = Some(message.to_string());
        }
    }

    /// Report a write-path error for `destination` on every write.
    pub fn reject_destination(&self, tier: DestinationTier, destination: &str, message: &str) {
        if let Ok(mut faults) = self.faults.write() {
            faults.destinations.push(DestinationError {
                tier,
                destination: destination.to_string(),
                message: message.to_string(),
            });
        }
    }

    /// Fail every value written to `attribute_id`.
    pub fn reject_attribute(&self, attribute_id: &str, message: &str) {
        if let Ok(mut faults) = self.faults.write() {
            faults
                .attributes
                .insert(attribute_id.to_string(), message.to_string());
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.write() {
            *faults = Faults::default();
        }
    }

    fn check_online(&self) -> Result<()> {
        let faults = self.faults.read().map_err(|_| poisoned("faults"))?;
        match &faults.offline {
            Some(message) => Err(PlatformError::Connection(message.clone())),
            None => Ok(()),
        }
    }
}

impl AttributeData for MemoryStore {
    fn recorded_values(
        &self,
        attribute: &AttributeRef,
        range: &TimeRange,
        boundary: BoundaryType,
    ) -> Result<Vec<RecordedValue>> {
        self.check_online()?;
        let series = self.series.read().map_err(|_| poisoned("series"))?;
        let Some(values) = series.get(&attribute.id) else {
            return Ok(Vec::new());
        };

        let to_recorded = |(t, v): (&DateTime<Utc>, &Value)| RecordedValue {
            timestamp: *t,
            value: v.clone(),
        };

        let mut recorded: Vec<RecordedValue> = Vec::new();
        if boundary == BoundaryType::Outside {
            recorded.extend(values.range(..range.start()).next_back().map(to_recorded));
        }
        recorded.extend(values.range(range.start()..=range.end()).map(to_recorded));
        if boundary == BoundaryType::Outside {
            let after = values
                .range(range.end()..)
                .find(|(t, _)| **t > range.end())
                .map(to_recorded);
            recorded.extend(after);
        }
        Ok(recorded)
    }
}

impl ValueWriter for MemoryStore {
    fn update_values(&self, values: &[TimeSeriesValue], mode: UpdateMode) -> Result<WriteErrors> {
        {
            let mut calls = self.write_calls.write().map_err(|_| poisoned("write_calls"))?;
            *calls += 1;
        }
        self.check_online()?;

        let faults = self.faults.read().map_err(|_| poisoned("faults"))?;
        let mut series = self.series.write().map_err(|_| poisoned("series"))?;
        let mut written = self.written.write().map_err(|_| poisoned("written"))?;

        let mut errors = WriteErrors {
            destinations: faults.destinations.clone(),
            items: Vec::new(),
        };

        for value in values {
            let Some(attribute) = &value.attribute else {
                errors.items.push(ItemError {
                    value: value.clone(),
                    message: "value has no destination attribute".to_string(),
                });
                continue;
            };
            if let Some(message) = faults.attributes.get(&attribute.id) {
                errors.items.push(ItemError {
                    value: value.clone(),
                    message: message.clone(),
                });
                continue;
            }

            let entry = series.entry(attribute.id.clone()).or_default();
            if mode == UpdateMode::Insert && entry.contains_key(&value.timestamp) {
                errors.items.push(ItemError {
                    value: value.clone(),
                    message: format!("a value already exists at {}", value.timestamp),
                });
                continue;
            }
            entry.insert(value.timestamp, value.value.clone());
            written.push(value.clone());
        }

        debug!(
            submitted = values.len(),
            failed = errors.items.len(),
            "memory store write"
        );
        Ok(errors)
    }
}
