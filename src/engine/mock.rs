//! An in-memory [`EngineClient`] used by this crate's own tests and
//! exported for integration tests, in the spirit of `ivynet-docker`'s
//! `TestDockerClient`/`MockDocker` pair and headwind's exported
//! `test_should_update` helper: a hand-rolled mock over the trait rather
//! than a `mockall`-generated one.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bollard::secret::{ContainerInspectResponse, HostConfig};
use tokio_util::sync::CancellationToken;

use super::{ContainerConfig, EngineClient, NetworkConfig};
use crate::error::RelayError;
use crate::model::MonitoredContainer;

#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub name: String,
    pub config: ContainerConfig,
    pub host_config: HostConfig,
    pub network_config: NetworkConfig,
    pub staging: bool,
}

#[derive(Default)]
struct MockState {
    monitored: Vec<MonitoredContainer>,
    inspections: HashMap<String, ContainerInspectResponse>,
    pull_results: HashMap<String, Result<String, String>>,
    local_digests: HashMap<String, String>,
    wait_healthy_result: bool,
    created: Vec<CreatedContainer>,
    stopped: Vec<String>,
    removed: Vec<String>,
    force_removed: Vec<String>,
    removed_images: Vec<String>,
    next_id: u64,
}

/// Canned, inspectable stand-in for [`super::bollard_client::BollardEngineClient`].
pub struct MockEngineClient {
    state: Mutex<MockState>,
}

impl MockEngineClient {
    pub fn new() -> Self {
        Self { state: Mutex::new(MockState { wait_healthy_result: true, ..Default::default() }) }
    }

    pub fn with_monitored(self, containers: Vec<MonitoredContainer>) -> Self {
        self.state.lock().unwrap().monitored = containers;
        self
    }

    pub fn with_inspection(self, id: &str, inspection: ContainerInspectResponse) -> Self {
        self.state.lock().unwrap().inspections.insert(id.to_string(), inspection);
        self
    }

    pub fn with_pull_result(self, image_reference: &str, digest: Result<&str, &str>) -> Self {
        self.state
            .lock()
            .unwrap()
            .pull_results
            .insert(image_reference.to_string(), digest.map(|d| d.to_string()).map_err(|e| e.to_string()));
        self
    }

    pub fn with_local_digest(self, image_reference: &str, digest: &str) -> Self {
        self.state.lock().unwrap().local_digests.insert(image_reference.to_string(), digest.to_string());
        self
    }

    pub fn with_wait_healthy_result(self, healthy: bool) -> Self {
        self.state.lock().unwrap().wait_healthy_result = healthy;
        self
    }

    pub fn created_containers(&self) -> Vec<CreatedContainer> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn stopped_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn removed_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn force_removed_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().force_removed.clone()
    }

    pub fn removed_images(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_images.clone()
    }
}

impl Default for MockEngineClient {
    fn default() -> Self {
        Self::new()
    }
}

fn check_cancelled(cancellation: &CancellationToken) -> Result<(), RelayError> {
    if cancellation.is_cancelled() {
        return Err(RelayError::Cancelled);
    }
    Ok(())
}

#[async_trait]
impl EngineClient for MockEngineClient {
    async fn list_monitored(
        &self,
        _enable_label_key: &str,
        cancellation: &CancellationToken,
    ) -> Result<Vec<MonitoredContainer>, RelayError> {
        check_cancelled(cancellation)?;
        Ok(self.state.lock().unwrap().monitored.clone())
    }

    async fn inspect(
        &self,
        id: &str,
        cancellation: &CancellationToken,
    ) -> Result<ContainerInspectResponse, RelayError> {
        check_cancelled(cancellation)?;
        self.state
            .lock()
            .unwrap()
            .inspections
            .get(id)
            .cloned()
            .ok_or_else(|| RelayError::Engine(format!("no mock inspection configured for {id}")))
    }

    async fn pull(&self, image_reference: &str, cancellation: &CancellationToken) -> Result<String, RelayError> {
        check_cancelled(cancellation)?;
        match self.state.lock().unwrap().pull_results.get(image_reference) {
            Some(Ok(digest)) => Ok(digest.clone()),
            Some(Err(message)) => Err(RelayError::Engine(message.clone())),
            None => Err(RelayError::Engine(format!("no mock pull result configured for {image_reference}"))),
        }
    }

    async fn local_image_digest(
        &self,
        image_reference: &str,
        cancellation: &CancellationToken,
    ) -> Result<Option<String>, RelayError> {
        check_cancelled(cancellation)?;
        Ok(self.state.lock().unwrap().local_digests.get(image_reference).cloned())
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
        let mut state = self.state.lock().unwrap();
        state.created.push(CreatedContainer {
            name: name.to_string(),
            config: config.clone(),
            host_config: host_config.clone(),
            network_config: network_config.clone(),
            staging: false,
        });
        state.next_id += 1;
        Ok(format!("mock-id-{}", state.next_id))
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
        let mut state = self.state.lock().unwrap();
        state.created.push(CreatedContainer {
            name: staging_name.to_string(),
            config: config.clone(),
            host_config: host_config.clone(),
            network_config: network_config.clone(),
            staging: true,
        });
        state.next_id += 1;
        Ok(format!("mock-staging-id-{}", state.next_id))
    }

    async fn stop(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError> {
        check_cancelled(cancellation)?;
        self.state.lock().unwrap().stopped.push(id.to_string());
        Ok(())
    }

    async fn remove(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError> {
        check_cancelled(cancellation)?;
        self.state.lock().unwrap().removed.push(id.to_string());
        Ok(())
    }

    async fn force_remove(&self, id: &str, cancellation: &CancellationToken) -> Result<(), RelayError> {
        check_cancelled(cancellation)?;
        self.state.lock().unwrap().force_removed.push(id.to_string());
        Ok(())
    }

    async fn wait_healthy(
        &self,
        _id: &str,
        _timeout: std::time::Duration,
        _poll_interval: std::time::Duration,
        cancellation: &CancellationToken,
    ) -> Result<bool, RelayError> {
        check_cancelled(cancellation)?;
        Ok(self.state.lock().unwrap().wait_healthy_result)
    }

    async fn remove_image(&self, digest: &str, cancellation: &CancellationToken) -> Result<(), RelayError> {
        check_cancelled(cancellation)?;
        self.state.lock().unwrap().removed_images.push(digest.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_created_containers() {
        let mock = MockEngineClient::new();
        let token = CancellationToken::new();
        mock.create_and_start(
            "nginx",
            &ContainerConfig::default(),
            &HostConfig::default(),
            &NetworkConfig::default(),
            &token,
        )
        .await
        .unwrap();

        let created = mock.created_containers();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "nginx");
        assert!(!created[0].staging);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_every_call() {
        let mock = MockEngineClient::new();
        let token = CancellationToken::new();
        token.cancel();

        let result = mock.list_monitored("relay.enable", &token).await;
        assert!(matches!(result, Err(RelayError::Cancelled)));
    }
}
