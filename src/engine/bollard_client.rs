//! `bollard`-backed [`EngineClient`], talking to the local Docker Engine API
//! over its Unix socket (or `DOCKER_HOST`), grounded in the connection and
//! listing style of `ivynet-docker`'s `DockerClient`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::container::{
    CreateContainerOptions, ListContainersOptions, RemoveContainerOptions, StopContainerOptions,
};
use bollard::image::{CreateImageOptions, RemoveImageOptions};
use bollard::secret::{ContainerInspectResponse, HostConfig};
use bollard::Docker;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::health::{HealthGate, HealthStatus, Observation, Poll};
use super::{ContainerConfig, EngineClient, NetworkConfig};
use crate::error::RelayError;
use crate::model::MonitoredContainer;

pub struct BollardEngineClient {
    docker: Docker,
}

impl BollardEngineClient {
    /// Connect to `engine_host` if given, else the platform default local
    /// socket (mirrors `DOCKER_HOST`-aware connection pattern used across
    /// the corpus's Docker clients).
    pub fn connect(engine_host: Option<&str>, operation_timeout: Duration) -> Result<Self, RelayError> {
        let timeout_secs = operation_timeout.as_secs();
        let docker = match engine_host {
            Some(host) => Docker::connect_with_http(host, timeout_secs, bollard::API_DEFAULT_VERSION)
                .map_err(|e| RelayError::Engine(format!("failed to connect to engine at {host}: {e}")))?,
            None => Docker::connect_with_local_defaults()
                .map_err(|e| RelayError::Engine(format!("failed to connect to local engine: {e}")))?,
        };
        Ok(Self { docker })
    }

    async fn resolve_digest(&self, image_reference: &str) -> Result<Option<String>, RelayError> {
        match self.docker.inspect_image(image_reference).await {
            Ok(image) => Ok(digest_from_repo_digests(&image.repo_digests.unwrap_or_default())),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(None),
            Err(e) => Err(RelayError::Engine(format!("inspect_image failed: {e}"))),
        }
    }

    async fn observe(&self, id: &str) -> Result<Observation, RelayError> {
        let inspection = match self.docker.inspect_container(id, None).await {
            Ok(inspection) => inspection,
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                return Ok(Observation::Gone)
            }
            Err(e) => return Err(RelayError::Engine(format!("inspect_container failed: {e}"))),
        };

        let status = inspection.state.as_ref().and_then(|s| s.status).map(|s| s.to_string());
        let is_exited = matches!(status.as_deref(), Some("exited") | Some("dead"));
        if is_exited {
            return Ok(Observation::Exited);
        }

        let has_healthcheck = inspection
            .config
            .as_ref()
            .and_then(|c| c.healthcheck.as_ref())
            .and_then(|h| h.test.as_ref())
            .map(|test| !test.is_empty())
            .unwrap_or(false);

        if !has_healthcheck {
            let running = status.as_deref() == Some("running");
            return Ok(Observation::NoHealthcheck { running });
        }

        let health_status = inspection
            .state
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status)
            .map(|s| s.to_string());

        Ok(match health_status.as_deref() {
            Some("healthy") => Observation::Health(HealthStatus::Healthy),
            Some("unhealthy") => Observation::Health(HealthStatus::Unhealthy),
            _ => Observation::Health(HealthStatus::Starting),
        })
    }

    async fn create_container_internal(
        &self,
        name: &str,
        config: &ContainerConfig,
        host_config: &HostConfig,
        network_config: &NetworkConfig,
    ) -> Result<String, RelayError> {
        let mut full_config = config.clone();
        full_config.host_config = Some(host_config.clone());
        full_config.networking_config = Some(bollard::secret::NetworkingConfig {
            endpoints_config: Some(network_config.clone()),
        });

        let options = CreateContainerOptions { name, platform: None };
        let created = self
            .docker
            .create_container(Some(options), full_config)
            .await
            .map_err(|e| RelayError::Engine(format!("create_container {name} failed: {e}")))?;

        self.docker
            .start_container::<String>(&created.id, None)
            .await
            .map_err(|e| RelayError::Engine(format!("start_container {name} failed: {e}")))?;

        Ok(created.id)
    }
}

fn digest_from_repo_digests(repo_digests: &[String]) -> Option<String> {
    repo_digests.first().and_then(|d| d.split_once('@')).map(|(_, digest)| digest.to_string())
}

fn check_cancelled(cancellation: &CancellationToken) -> Result<(), RelayError> {
    if cancellation.is_cancelled() {
        return Err(RelayError::Cancelled);
    }
    Ok(())
}

#[async_trait]
impl EngineClient for BollardEngineClient {
    async fn list_monitored(
        &self,
        enable_label_key: &str,
        cancellation: &CancellationToken,
    ) -> Result<Vec<MonitoredContainer>, RelayError> {
        check_cancelled(cancellation)?;

        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{enable_label_key}=true")]);

        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions { all: false, filters, ..Default::default() }))
            .await
            .map_err(|e| RelayError::Engine(format!("list_containers failed: {e}")))?;

        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            check_cancelled(cancellation)?;

            let Some(id) = summary.id.clone() else { continue };
            let name = summary
                .names
                .as_ref()
                .and_then(|names| names.first())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| id.clone());
            let image_reference = summary.image.clone().unwrap_or_default();
            let labels: HashMap<String, String> = summary.labels.clone().unwrap_or_default();

            let image_digest = self
                .resolve_digest(&image_reference)
                .await?
                .or_else(|| summary.image_id.clone())
                .unwrap_or_default();

            containers.push(MonitoredContainer { id, name, image_reference, image_digest, labels });
        }

        Ok(containers)
    }

    async fn inspect(
        &self,
        id: &str,
        cancellation: &CancellationToken,
    ) -> Result<ContainerInspectResponse, RelayError> {
        check_cancelled(cancellation)?;
        self.docker
            .inspect_container(id, None)
            .await
            .map_err(|e| RelayError::Engine(format!("inspect_container {id} failed: {e}")))
    }

    async fn pull(&self, image_reference: &str, cancellation: &CancellationToken) -> Result<String, RelayError> {
        check_cancelled(cancellation)?;

        let options = CreateImageOptions { from_image: image_reference, ..Default::default() };
        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(progress) = stream.next().await {
            check_cancelled(cancellation)?;
            if let Err(e) = progress {
                return Err(RelayError::Engine(format!("pull {image_reference} failed: {e}")));
            }
        }

        self.resolve_digest(image_reference)
            .await?
            .ok_or_else(|| RelayError::Engine(format!("pulled image {image_reference} has no digest")))
    }

    async fn local_image_digest(
        &self,
        image_reference: &str,
        cancellation: &CancellationToken,
    ) -> Result<Option<String>, RelayError> {
        check_cancelled(cancellation)?;
        self.resolve_digest(image_reference).await
    }

    async fn create_and_start(
        &self,
        name: &str,
        config: &ContainerConfig,
        host_config: &HostConfig,
        network_config: &NetworkConfig,
        cancellation: &CancellationToken,
    ) -> Result<String, RelayError> {
        check_cancelled(cancellation)?;
        self.create_container_internal(name, config, host_config, network_config).await
    }

    async fn create_staging_and_start(
        &self,
        staging_name: &str,
        config: &ContainerConfig,
        host_config: &HostConfig,
        network_config: &NetworkConfig,
        cancellation: &CancellationToken,
    ) -> Result<String, RelayError> {
        check_cancelled(cancellation)?;
        self.create_container_internal(staging_name, config, host_config, network_config).await
    }

    async fn stop(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError> {
        check_cancelled(cancellation)?;
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: 10 }))
            .await
            .map_err(|e| RelayError::Engine(format!("stop_container {id} failed: {e}")))
    }

    async fn remove(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError> {
        check_cancelled(cancellation)?;
        self.docker
            .remove_container(id, Some(RemoveContainerOptions { force: false, v: false, link: false }))
            .await
            .map_err(|e| RelayError::Engine(format!("remove_container {id} failed: {e}")))
    }

    async fn force_remove(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError> {
        check_cancelled(cancellation)?;

        if let Err(e) = self.docker.stop_container(id, Some(StopContainerOptions { t: 5 })).await {
            debug!(id, error = %e, "best-effort stop before force-remove failed, continuing");
        }

        match self
            .docker
            .remove_container(id, Some(RemoveContainerOptions { force: true, v: false, link: false }))
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(e) => Err(RelayError::Engine(format!("force_remove {id} failed: {e}"))),
        }
    }

    async fn wait_healthy(
        &self,
        id: &str,
        timeout: Duration,
        poll_interval: Duration,
        cancellation: &CancellationToken,
    ) -> Result<bool, RelayError> {
        let deadline = Instant::now() + timeout;
        let mut gate = HealthGate::new();

        loop {
            check_cancelled(cancellation)?;

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }

            let observation = self.observe(id).await?;
            match gate.step(observation, now) {
                Poll::Done(outcome) => return Ok(outcome),
                Poll::Continue => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = cancellation.cancelled() => return Err(RelayError::Cancelled),
            }
        }
    }

    async fn remove_image(&self, digest: &str, cancellation: &CancellationToken) -> Result<(), RelayError> {
        check_cancelled(cancellation)?;

        match self.docker.remove_image(digest, Some(RemoveImageOptions::default()), None).await {
            Ok(_) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 409, .. }) => {
                warn!(digest, "image still in use, skipping removal");
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(e) => Err(RelayError::Engine(format!("remove_image {digest} failed: {e}"))),
        }
    }
}
