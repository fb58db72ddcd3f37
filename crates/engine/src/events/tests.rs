//! Tests for the event sources.

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::{DateTime, Duration, Utc};
    use recalc_core::config::RunConfig;
    use recalc_core::{
        AttributeRef, Configuration, EventWindow, InputRef, PlatformError, TimeRange, TimeRule,
        Value,
    };

    use crate::error::{EventError, RunError};
    use crate::events::{EventSource, NaturalEventSource, PeriodicEventSource, TriggerPolicy};
    use crate::memory::{CronTimeRule, IntervalTimeRule, MemoryStore, NaturalTimeRule};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(at(start), at(end)).unwrap()
    }

    fn hourly() -> IntervalTimeRule {
        IntervalTimeRule::new(Duration::hours(1), Duration::zero()).unwrap()
    }

    fn collect(source: &dyn EventSource, range: &TimeRange) -> Vec<DateTime<Utc>> {
        source
            .events(range)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    /// Rule that keeps returning the same window.
    struct StuckRule;

    impl TimeRule for StuckRule {
        fn kind(&self) -> &str {
            "Periodic"
        }

        fn next_event(&self, _after: DateTime<Utc>) -> recalc_core::Result<EventWindow> {
            let t = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc);
            Ok(EventWindow { start: t, end: t })
        }
    }

    /// Rule that fails on its n-th call.
    struct FlakyRule {
        inner: IntervalTimeRule,
        calls: Cell<usize>,
        fail_on: usize,
    }

    impl TimeRule for FlakyRule {
        fn kind(&self) -> &str {
            "Periodic"
        }

        fn next_event(&self, after: DateTime<Utc>) -> recalc_core::Result<EventWindow> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if call == self.fail_on {
                return Err(PlatformError::Other("time rule unavailable".into()));
            }
            self.inner.next_event(after)
        }
    }

    struct NamedRule(&'static str);

    impl TimeRule for NamedRule {
        fn kind(&self) -> &str {
            self.0
        }

        fn next_event(&self, _after: DateTime<Utc>) -> recalc_core::Result<EventWindow> {
            Err(PlatformError::Other("not steppable".into()))
        }
    }

    fn natural_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("a", at("2024-01-01T09:15:00Z"), Value::Float(1.0));
        store.insert("a", at("2024-01-01T10:00:00Z"), Value::Float(2.0));
        store.insert("b", at("2024-01-01T10:00:00Z"), Value::Float(3.0));
        store.insert("b", at("2024-01-01T11:45:00Z"), Value::Float(4.0));
        store
    }

    fn inputs(ids: &[&str]) -> Vec<AttributeRef> {
        ids.iter().map(|id| AttributeRef::new(*id, *id)).collect()
    }

    // -- periodic ---------------------------------------------------------

    #[test]
    fn periodic_hourly_emits_window_ends() {
        let rule = hourly();
        let source = PeriodicEventSource::new(&rule, 1_000).unwrap();
        let events = collect(&source, &range("2024-01-01T09:00:00Z", "2024-01-01T12:00:00Z"));
        assert_eq!(
            events,
            vec![
                at("2024-01-01T10:00:00Z"),
                at("2024-01-01T11:00:00Z"),
                at("2024-01-01T12:00:00Z"),
            ]
        );
    }

    #[test]
    fn periodic_matches_repeated_stepping() {
        let rule = IntervalTimeRule::new(Duration::minutes(15), Duration::minutes(5)).unwrap();
        let r = range("2024-01-01T00:00:00Z", "2024-01-01T02:00:00Z");
        let source = PeriodicEventSource::new(&rule, 1_000).unwrap();
        let events = collect(&source, &r);

        let mut expected = Vec::new();
        let mut last = r.start() - recalc_core::time::epsilon();
        loop {
            let next = rule.next_event(last).unwrap().end;
            if next > r.end() {
                break;
            }
            expected.push(next);
            last = next;
        }
        assert_eq!(events, expected);
        assert!(events.iter().all(|t| r.contains(*t)));
        assert!(events.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn periodic_range_shorter_than_period_is_empty() {
        let rule = hourly();
        let source = PeriodicEventSource::new(&rule, 1_000).unwrap();
        let events = collect(&source, &range("2024-01-01T09:10:00Z", "2024-01-01T09:50:00Z"));
        assert!(events.is_empty());
    }

    #[test]
    fn periodic_rejects_non_periodic_rule() {
        let rule = NaturalTimeRule;
        let err = PeriodicEventSource::new(&rule, 10).err().unwrap();
        assert!(matches!(err, RunError::InvalidConfiguration(_)));
    }

    #[test]
    fn periodic_detects_stalled_rule() {
        let rule = StuckRule;
        let source = PeriodicEventSource::new(&rule, 1_000).unwrap();
        let items: Vec<_> = source
            .events(&range("2024-01-01T09:00:00Z", "2024-01-01T12:00:00Z"))
            .unwrap()
            .collect();
        assert_eq!(items.len(), 2);
        assert_eq!(*items[0].as_ref().unwrap(), at("2024-01-01T10:00:00Z"));
        assert!(matches!(items[1], Err(EventError::Stalled { .. })));
    }

    #[test]
    fn periodic_from_earliest_instant_is_an_error() {
        let rule = CronTimeRule::new("0 * * * *").unwrap();
        let source = PeriodicEventSource::new(&rule, 10).unwrap();
        let earliest = TimeRange::new(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MIN_UTC).unwrap();
        let result = source.events(&earliest);
        assert!(matches!(
            result,
            Err(EventError::Platform(PlatformError::InvalidTime(_)))
        ));
    }

    #[test]
    fn periodic_caps_event_count() {
        let rule = hourly();
        let source = PeriodicEventSource::new(&rule, 2).unwrap();
        let items: Vec<_> = source
            .events(&range("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"))
            .unwrap()
            .collect();
        assert_eq!(items.len(), 3);
        assert!(items[..2].iter().all(|i| i.is_ok()));
        assert!(matches!(items[2], Err(EventError::LimitExceeded { limit: 2 })));
    }

    #[test]
    fn periodic_rule_failure_ends_stream() {
        let rule = FlakyRule {
            inner: hourly(),
            calls: Cell::new(0),
            fail_on: 2,
        };
        let source = PeriodicEventSource::new(&rule, 100).unwrap();
        let items: Vec<_> = source
            .events(&range("2024-01-01T09:00:00Z", "2024-01-01T12:00:00Z"))
            .unwrap()
            .collect();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(EventError::Platform(_))));
    }

    // -- natural ----------------------------------------------------------

    #[test]
    fn natural_unions_and_dedups_inputs() {
        let store = natural_store();
        let source = NaturalEventSource::new(inputs(&["a", "b"]), &store);
        let events = collect(&source, &range("2024-01-01T09:00:00Z", "2024-01-01T12:00:00Z"));
        assert_eq!(
            events,
            vec![
                at("2024-01-01T09:15:00Z"),
                at("2024-01-01T10:00:00Z"),
                at("2024-01-01T11:45:00Z"),
            ]
        );
    }

    #[test]
    fn natural_ignores_values_outside_range() {
        let store = natural_store();
        store.insert("a", at("2024-01-01T08:00:00Z"), Value::Float(0.0));
        store.insert("b", at("2024-01-01T13:00:00Z"), Value::Float(0.0));
        let source = NaturalEventSource::new(inputs(&["a", "b"]), &store);
        let events = collect(&source, &range("2024-01-01T09:00:00Z", "2024-01-01T12:00:00Z"));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn natural_boundary_policy() {
        let store = natural_store();
        let r = range("2024-01-01T09:15:00Z", "2024-01-01T11:45:00Z");

        let inclusive = NaturalEventSource::new(inputs(&["a", "b"]), &store);
        assert_eq!(collect(&inclusive, &r).len(), 3);

        let exclusive = NaturalEventSource::new(inputs(&["a", "b"]), &store)
            .include_start(false)
            .include_end(false);
        assert_eq!(collect(&exclusive, &r), vec![at("2024-01-01T10:00:00Z")]);
    }

    #[test]
    fn natural_caps_event_count() {
        let store = natural_store();
        let source = NaturalEventSource::new(inputs(&["a", "b"]), &store).max_events(2);
        let items: Vec<_> = source
            .events(&range("2024-01-01T09:00:00Z", "2024-01-01T12:00:00Z"))
            .unwrap()
            .collect();
        assert_eq!(items.len(), 3);
        assert_eq!(*items[0].as_ref().unwrap(), at("2024-01-01T09:15:00Z"));
        assert_eq!(*items[1].as_ref().unwrap(), at("2024-01-01T10:00:00Z"));
        assert!(matches!(items[2], Err(EventError::LimitExceeded { limit: 2 })));

        let exact = NaturalEventSource::new(inputs(&["a", "b"]), &store).max_events(3);
        assert_eq!(collect(&exact, &range("2024-01-01T09:00:00Z", "2024-01-01T12:00:00Z")).len(), 3);
    }

    #[test]
    fn natural_without_inputs_is_empty() {
        let store = natural_store();
        let source = NaturalEventSource::new(Vec::new(), &store);
        assert!(collect(&source, &range("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")).is_empty());
    }

    #[test]
    fn natural_query_failure_is_reported() {
        let store = natural_store();
        store.set_offline("archive unreachable");
        let source = NaturalEventSource::new(inputs(&["a"]), &store);
        let result = source.events(&range("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"));
        assert!(matches!(result, Err(EventError::Platform(_))));
    }

    // -- policy -----------------------------------------------------------

    #[test]
    fn policy_selects_by_kind() {
        let config = Configuration {
            inputs: vec![
                InputRef::Attribute(AttributeRef::new("a", "a")),
                InputRef::Variable("k".into()),
            ],
            ..Default::default()
        };

        let periodic = hourly();
        let policy = TriggerPolicy::resolve(&periodic, &config).unwrap();
        assert!(matches!(policy, TriggerPolicy::Periodic(_)));

        let natural = NaturalTimeRule;
        match TriggerPolicy::resolve(&natural, &config).unwrap() {
            TriggerPolicy::Natural(attrs) => assert_eq!(attrs, inputs(&["a"])),
            TriggerPolicy::Periodic(_) => panic!("expected natural policy"),
        }
    }

    #[test]
    fn policy_rejects_unknown_kind() {
        let rule = NamedRule("Event");
        let err = TriggerPolicy::resolve(&rule, &Configuration::default()).err().unwrap();
        assert!(matches!(err, RunError::UnsupportedTriggerKind(kind) if kind == "Event"));
    }

    #[test]
    fn policy_builds_natural_source_with_options() {
        let store = natural_store();
        let rule = NaturalTimeRule;
        let config = Configuration {
            inputs: vec![
                InputRef::Attribute(AttributeRef::new("a", "a")),
                InputRef::Attribute(AttributeRef::new("b", "b")),
            ],
            ..Default::default()
        };
        let options = RunConfig {
            include_start: false,
            ..RunConfig::default()
        };
        let source = TriggerPolicy::resolve(&rule, &config)
            .unwrap()
            .into_source(&store, &options)
            .unwrap();
        let events = collect(source.as_ref(), &range("2024-01-01T09:15:00Z", "2024-01-01T12:00:00Z"));
        assert_eq!(events, vec![at("2024-01-01T10:00:00Z"), at("2024-01-01T11:45:00Z")]);
    }
}
