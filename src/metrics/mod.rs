//! Prometheus metrics (spec.md §6.5 equivalent from SPEC_FULL.md). The core
//! never exposes an HTTP surface of its own; a caller embedding this crate
//! is expected to scrape [`REGISTRY`] (e.g. behind its own metrics server).

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use tracing::warn;

use crate::model::CycleCounters;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref CYCLES_TOTAL: IntCounter = IntCounter::new(
        "relay_cycles_total",
        "Total number of orchestrator cycles run"
    ).unwrap();

    pub static ref CONTAINERS_CHECKED_TOTAL: IntCounter = IntCounter::new(
        "relay_containers_checked_total",
        "Total number of containers checked for updates"
    ).unwrap();

    pub static ref CONTAINERS_UPDATED_TOTAL: IntCounter = IntCounter::new(
        "relay_containers_updated_total",
        "Total number of containers successfully updated"
    ).unwrap();

    pub static ref CONTAINERS_FAILED_TOTAL: IntCounter = IntCounter::new(
        "relay_containers_failed_total",
        "Total number of containers that failed an update check or replacement"
    ).unwrap();

    pub static ref CYCLE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "relay_cycle_duration_seconds",
            "Time spent running one orchestrator cycle"
        ).buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0])
    ).unwrap();
}

/// Register every metric with [`REGISTRY`]. Call once at startup.
pub fn register_metrics() {
    REGISTRY.register(Box::new(CYCLES_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(CONTAINERS_CHECKED_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(CONTAINERS_UPDATED_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(CONTAINERS_FAILED_TOTAL.clone())).ok();
    if let Err(e) = REGISTRY.register(Box::new(CYCLE_DURATION_SECONDS.clone())) {
        warn!(error = %e, "failed to register cycle duration histogram");
    }
}

/// Roll one cycle's counters and duration into the process-wide metrics.
pub fn record_cycle(counters: &CycleCounters, elapsed: Duration) {
    CYCLES_TOTAL.inc();
    CONTAINERS_CHECKED_TOTAL.inc_by(counters.checked);
    CONTAINERS_UPDATED_TOTAL.inc_by(counters.updated);
    CONTAINERS_FAILED_TOTAL.inc_by(counters.failed);
    CYCLE_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_cycle_increments_matching_counters() {
        register_metrics();
        let before = CYCLES_TOTAL.get();
        record_cycle(&CycleCounters { checked: 3, updated: 1, failed: 1 }, Duration::from_millis(50));
        assert_eq!(CYCLES_TOTAL.get(), before + 1);
    }
}
