//! Operational metrics with Prometheus.
//!
//! Covers the hot paths: recommendation latency, cache single-flight
//! outcomes, config pushes, and loader rebuilds.
//!
//! NOTE: client names are low-cardinality tenant ids, so they are safe as
//! labels; user and item ids are intentionally never used as labels.

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    /// Recommendation computation duration per algorithm
    pub static ref RECOMMEND_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "recserve_recommend_duration_seconds",
            "Recommendation computation duration per algorithm"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["algorithm"]
    ).unwrap();

    /// Results surfaced per recommendation request
    pub static ref RECOMMEND_RESULTS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "recserve_recommend_results",
            "Number of items surfaced per recommendation request"
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0])
    ).unwrap();

    /// Cache single-flight outcomes
    pub static ref CACHE_SINGLE_FLIGHT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "recserve_cache_single_flight_total",
            "Single-flight cache refresh outcomes"
        ),
        &["outcome"]  // fresh, stale, recomputed, waited, wait_timeout, failed, unsupported, ceded
    ).unwrap();

    /// Config pushes applied or rejected, per config kind
    pub static ref CONFIG_UPDATES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recserve_config_updates_total", "Config pushes by kind and result"),
        &["kind", "result"]
    ).unwrap();

    /// Strategy resolutions by source level
    pub static ref STRATEGY_RESOLUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "recserve_strategy_resolutions_total",
            "Strategy resolutions by precedence level that served them"
        ),
        &["source"]  // test, rectag, client, global, none
    ).unwrap();

    /// Bulk-resource rebuilds per store kind
    pub static ref LOADER_RELOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("recserve_loader_reloads_total", "Store rebuilds by kind and result"),
        &["kind", "result"]
    ).unwrap();

    /// Algorithms dropped from a pipeline run after failing
    pub static ref PIPELINE_ALGORITHM_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "recserve_pipeline_algorithm_failures_total",
            "Pipeline algorithm executions that failed and were dropped"
        ),
        &["algorithm"]
    ).unwrap();
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    METRICS_REGISTRY.register(Box::new(RECOMMEND_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(RECOMMEND_RESULTS.clone()))?;
    METRICS_REGISTRY.register(Box::new(CACHE_SINGLE_FLIGHT_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(CONFIG_UPDATES_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(STRATEGY_RESOLUTIONS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(LOADER_RELOADS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(PIPELINE_ALGORITHM_FAILURES.clone()))?;
    Ok(())
}

/// Helper to time operations with a histogram (RAII pattern).
pub struct Timer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl Timer {
    /// Create a timer that records duration to the histogram on drop.
    pub fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        register_metrics().expect("metrics register cleanly");
    }

    #[test]
    fn test_single_flight_counter_labels() {
        CACHE_SINGLE_FLIGHT_TOTAL.with_label_values(&["fresh"]).inc();
        assert!(CACHE_SINGLE_FLIGHT_TOTAL.with_label_values(&["fresh"]).get() >= 1);
    }
}
