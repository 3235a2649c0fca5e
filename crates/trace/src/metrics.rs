//! Request-scoped metrics accumulator.
//!
//! One accumulator per construction request. Counters are atomics, stage
//! durations a single-writer list; the whole thing is merged into the
//! configured `MetricsSink` once, at request finalization. No stage ever
//! writes to a shared metrics map.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use promptforge_core::metrics::MetricsSink;

/// Per-request counters and timings.
#[derive(Default)]
pub struct RequestMetrics {
    /// Retrieval cache hits / misses.
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    /// Classifier calls that fell back to rule-based defaults.
    pub classifier_fallbacks: AtomicU64,
    /// Metadata store calls that hit the deadline.
    pub store_timeouts: AtomicU64,
    /// Candidate sections considered / selected by the optimizer.
    pub sections_considered: AtomicU64,
    pub sections_selected: AtomicU64,
    /// Stage name, duration, success — appended by the recorder only.
    stage_timings: Mutex<Vec<(&'static str, u64, bool)>>,
}

impl RequestMetrics {
    pub fn record_stage(&self, name: &'static str, duration_ms: u64, success: bool) {
        self.stage_timings
            .lock()
            .expect("stage timing lock poisoned")
            .push((name, duration_ms, success));
    }

    /// Merge everything into the sink. Called exactly once.
    pub fn merge_into(&self, sink: &dyn MetricsSink) {
        let pairs = [
            ("promptforge.cache.hits", &self.cache_hits),
            ("promptforge.cache.misses", &self.cache_misses),
            ("promptforge.classifier.fallbacks", &self.classifier_fallbacks),
            ("promptforge.store.timeouts", &self.store_timeouts),
            ("promptforge.sections.considered", &self.sections_considered),
            ("promptforge.sections.selected", &self.sections_selected),
        ];
        for (name, counter) in pairs {
            let value = counter.load(Ordering::Relaxed);
            if value > 0 {
                sink.incr_counter(name, value);
            }
        }

        let timings = self
            .stage_timings
            .lock()
            .expect("stage timing lock poisoned");
        for (name, duration_ms, success) in timings.iter() {
            sink.record_duration_ms(name, *duration_ms);
            if !success {
                sink.incr_counter("promptforge.stage.failures", 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct CapturingSink {
        counters: Mutex<HashMap<String, u64>>,
        durations: Mutex<Vec<(String, u64)>>,
    }

    impl MetricsSink for CapturingSink {
        fn incr_counter(&self, name: &str, value: u64) {
            *self
                .counters
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_insert(0) += value;
        }

        fn record_duration_ms(&self, name: &str, millis: u64) {
            self.durations.lock().unwrap().push((name.to_string(), millis));
        }
    }

    #[test]
    fn merge_carries_counters_and_timings() {
        let metrics = RequestMetrics::default();
        metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
        metrics.sections_considered.fetch_add(12, Ordering::Relaxed);
        metrics.sections_selected.fetch_add(5, Ordering::Relaxed);
        metrics.record_stage("analyze_context", 42, true);
        metrics.record_stage("retrieve_metadata", 130, false);

        let sink = CapturingSink::default();
        metrics.merge_into(&sink);

        let counters = sink.counters.lock().unwrap();
        assert_eq!(counters.get("promptforge.cache.hits"), Some(&1));
        assert_eq!(counters.get("promptforge.sections.considered"), Some(&12));
        assert_eq!(counters.get("promptforge.stage.failures"), Some(&1));
        // zero counters are not emitted
        assert!(!counters.contains_key("promptforge.store.timeouts"));

        let durations = sink.durations.lock().unwrap();
        assert_eq!(durations.len(), 2);
        assert_eq!(durations[0], ("analyze_context".to_string(), 42));
    }
}
