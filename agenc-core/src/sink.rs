//! Injected observability collaborators.
//!
//! The comparison service reports through these traits; it calls them
//! synchronously but never depends on their return value for correctness.
//! Implementations that bridge to a real metrics backend live outside the
//! core crates.

use std::sync::Arc;

use crate::anomaly::Anomaly;

/// Counter/histogram sink.
pub trait MetricsSink: Send + Sync {
    /// Increment a named counter.
    fn incr_counter(&self, name: &str, value: u64);

    /// Record one observation in a named histogram.
    fn observe_histogram(&self, name: &str, value: f64);
}

/// Anomaly alert dispatcher. One call per anomaly.
pub trait AlertDispatcher: Send + Sync {
    fn dispatch(&self, anomaly: &Anomaly);
}

/// Sink that drops everything. Default when no sink is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn incr_counter(&self, _name: &str, _value: u64) {}
    fn observe_histogram(&self, _name: &str, _value: f64) {}
}

impl<T: MetricsSink + ?Sized> MetricsSink for Arc<T> {
    fn incr_counter(&self, name: &str, value: u64) {
        (**self).incr_counter(name, value);
    }
    fn observe_histogram(&self, name: &str, value: f64) {
        (**self).observe_histogram(name, value);
    }
}

impl<T: AlertDispatcher + ?Sized> AlertDispatcher for Arc<T> {
    fn dispatch(&self, anomaly: &Anomaly) {
        (**self).dispatch(anomaly);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{Anomaly, AnomalyCode};
    use std::sync::Mutex;

    struct Recording {
        counters: Mutex<Vec<(String, u64)>>,
    }

    impl MetricsSink for Recording {
        fn incr_counter(&self, name: &str, value: u64) {
            self.counters.lock().unwrap().push((name.to_string(), value));
        }
        fn observe_histogram(&self, _name: &str, _value: f64) {}
    }

    #[test]
    fn test_noop_sink_is_callable() {
        let sink = NoopMetricsSink;
        sink.incr_counter("comparison.total", 1);
        sink.observe_histogram("comparison.latency_ms", 0.5);
    }

    #[test]
    fn test_arc_sink_delegates() {
        let sink = Arc::new(Recording {
            counters: Mutex::new(Vec::new()),
        });
        sink.incr_counter("x", 2);
        assert_eq!(
            sink.counters.lock().unwrap().as_slice(),
            &[("x".to_string(), 2)]
        );
        let _ = Anomaly::error(AnomalyCode::ExtraEvent, "e", serde_json::json!({}));
    }
}
