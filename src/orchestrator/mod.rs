//! Cycle Orchestrator (spec.md §4.6): enumerate monitored containers, run
//! the detector and, when needed, the replacement engine against each in
//! turn, and aggregate per-cycle counters.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::detector;
use crate::engine::EngineClient;
use crate::error::RelayError;
use crate::metrics;
use crate::model::{CycleCounters, DetectorResult};
use crate::registry::RegistryClient;
use crate::replace::{self, ReplacementOptions};

pub struct Orchestrator<'a> {
    engine: &'a dyn EngineClient,
    registry: &'a dyn RegistryClient,
    config: &'a RelayConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(engine: &'a dyn EngineClient, registry: &'a dyn RegistryClient, config: &'a RelayConfig) -> Self {
        Self { engine, registry, config }
    }

    /// Run one cycle sequentially over every monitored container.
    /// Containers are processed one after another; there is no parallelism
    /// in the core (spec.md §4.6, §5).
    pub async fn run_cycle(&self, cancellation: &CancellationToken) -> CycleCounters {
        let start = std::time::Instant::now();
        let mut counters = CycleCounters::new();

        let containers = match self.engine.list_monitored(&self.config.enable_label_key, cancellation).await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(error = %e, "failed to list monitored containers, skipping cycle");
                return counters;
            }
        };

        if containers.is_empty() {
            info!("no monitored containers found");
            return counters;
        }

        let credentials_lookup = |host: &str| self.config.credentials_for(host);
        let credentials_lookup: crate::registry::CredentialsLookup = &credentials_lookup;

        for container in &containers {
            if cancellation.is_cancelled() {
                info!(checked = counters.checked, "cancellation observed, stopping cycle early");
                break;
            }

            counters.record_checked();

            let result =
                detector::check(container, self.engine, self.registry, &credentials_lookup, cancellation).await;

            match result {
                // Cancellation propagates without counting the container as
                // failed (spec.md §7, §4.6): it was already counted as
                // checked above, but a cancelled check is neither a no-op
                // nor a failure, so the cycle simply stops here.
                Err(RelayError::Cancelled) => {
                    info!(checked = counters.checked, "cancellation observed during detection, stopping cycle early");
                    break;
                }
                Err(e) => {
                    warn!(container = %container.name, error = %e, "update check failed");
                    counters.record_failed();
                }
                Ok(DetectorResult::NoUpdate { .. }) => {}
                Ok(DetectorResult::Failed { reason, .. }) => {
                    warn!(container = %container.name, reason, "update check failed");
                    counters.record_failed();
                }
                Ok(DetectorResult::UpdateFound { new_image_reference, .. }) => {
                    let options = ReplacementOptions {
                        rolling_update_enabled: self.config.rolling_update_enabled,
                        healthcheck_timeout: self.config.healthcheck_timeout(),
                        healthcheck_interval: self.config.healthcheck_interval(),
                        cleanup_old_images: self.config.cleanup_old_images,
                    };

                    let success =
                        replace::replace(container, &new_image_reference, self.engine, options, cancellation).await;

                    if success {
                        info!(container = %container.name, new_image_reference, "container updated");
                        counters.record_updated();
                    } else {
                        warn!(container = %container.name, new_image_reference, "replacement failed");
                        counters.record_failed();
                    }
                }
            }
        }

        metrics::record_cycle(&counters, start.elapsed());
        info!(
            checked = counters.checked,
            updated = counters.updated,
            failed = counters.failed,
            "cycle complete"
        );

        counters
    }
}
