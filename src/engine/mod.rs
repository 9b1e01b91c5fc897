//! Engine Client (spec.md §4.3): abstraction over the local container
//! engine. The core only ever talks to the [`EngineClient`] trait; the
//! `bollard`-backed implementation lives in [`bollard_client`].

pub mod bollard_client;
pub mod health;
pub mod mock;

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::secret::{ContainerInspectResponse, EndpointSettings, HostConfig};
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::model::MonitoredContainer;

/// The portion of a container's configuration the Replacement Engine clones
/// and mutates: image, env, cmd, labels, healthcheck, ports, etc. This is
/// exactly `bollard`'s own container-create config type; the core has no
/// need to re-express it.
pub type ContainerConfig = bollard::container::Config<String>;

/// Per-network endpoint settings, keyed by network name.
pub type NetworkConfig = HashMap<String, EndpointSettings>;

/// Every operation takes the cycle's cancellation token and returns
/// [`RelayError::Cancelled`] if it observes cancellation mid-call (spec.md
/// §5).
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Running containers carrying `<enable_label_key>=true`.
    async fn list_monitored(
        &self,
        enable_label_key: &str,
        cancellation: &CancellationToken,
    ) -> Result<Vec<MonitoredContainer>, RelayError>;

    /// Full configuration of a container: image reference, env, cmd,
    /// entrypoint, labels, host config, network endpoints, etc.
    async fn inspect(
        &self,
        id: &str,
        cancellation: &CancellationToken,
    ) -> Result<ContainerInspectResponse, RelayError>;

    /// Pull `image_reference` and return the resulting local image digest.
    async fn pull(&self, image_reference: &str, cancellation: &CancellationToken) -> Result<String, RelayError>;

    /// The locally cached digest for `image_reference`, if any.
    async fn local_image_digest(
        &self,
        image_reference: &str,
        cancellation: &CancellationToken,
    ) -> Result<Option<String>, RelayError>;

    /// Create and start a container with `name`, returning the new id.
    async fn create_and_start(
        &self,
        name: &str,
        config: &ContainerConfig,
        host_config: &HostConfig,
        network_config: &NetworkConfig,
        cancellation: &CancellationToken,
    ) -> Result<String, RelayError>;

    /// Create and start an ephemeral staging container. `host_config` must
    /// already have port bindings stripped and `publish_all_ports=false`.
    async fn create_staging_and_start(
        &self,
        staging_name: &str,
        config: &ContainerConfig,
        host_config: &HostConfig,
        network_config: &NetworkConfig,
        cancellation: &CancellationToken,
    ) -> Result<String, RelayError>;

    /// Graceful stop with a bounded kill timeout (~10s).
    async fn stop(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError>;

    /// Remove a stopped container; anonymous volumes are preserved.
    async fn remove(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError>;

    /// Best-effort stop (~5s), then forced remove. Tolerates "not found".
    async fn force_remove(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError>;

    /// Poll `id` until it is healthy, unhealthy, gone, or `timeout` elapses.
    /// Returns `true` only for the healthy outcome. See [`health`].
    async fn wait_healthy(
        &self,
        id: &str,
        timeout: std::time::Duration,
        poll_interval: std::time::Duration,
        cancellation: &CancellationToken,
    ) -> Result<bool, RelayError>;

    /// Remove a dangling image. "Image in use" is tolerated as a non-error.
    async fn remove_image(&self, digest: &str, cancellation: &CancellationToken) -> Result<(), RelayError>;
}
