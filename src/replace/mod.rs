//! Replacement Engine (spec.md §4.5): roll a container onto a new image,
//! either via a staged, health-gated switchover or a simple
//! stop-then-recreate fallback.

use bollard::secret::{ContainerInspectResponse, EndpointSettings, HostConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::{ContainerConfig, EngineClient, NetworkConfig};
use crate::error::RelayError;
use crate::model::MonitoredContainer;

/// Parameters the orchestrator resolves from [`crate::config::RelayConfig`]
/// and any per-container label override before invoking the replacement.
#[derive(Debug, Clone, Copy)]
pub struct ReplacementOptions {
    pub rolling_update_enabled: bool,
    pub healthcheck_timeout: std::time::Duration,
    pub healthcheck_interval: std::time::Duration,
    pub cleanup_old_images: bool,
}

/// Execute a replacement plan. Returns `true` on success.
///
/// Preconditions per spec.md §4.5: `new_image_reference` has already been
/// pulled to the local engine by the detector.
pub async fn replace(
    container: &MonitoredContainer,
    new_image_reference: &str,
    engine: &dyn EngineClient,
    options: ReplacementOptions,
    cancellation: &CancellationToken,
) -> bool {
    let result = if options.rolling_update_enabled {
        rolling_replace(container, new_image_reference, engine, options, cancellation).await
    } else {
        legacy_replace(container, new_image_reference, engine, options, cancellation).await
    };

    match result {
        Ok(success) => success,
        Err(RelayError::Cancelled) => false,
        Err(e) => {
            error!(container = %container.name, error = %e, "replacement failed");
            false
        }
    }
}

async fn rolling_replace(
    container: &MonitoredContainer,
    new_image_reference: &str,
    engine: &dyn EngineClient,
    options: ReplacementOptions,
    cancellation: &CancellationToken,
) -> Result<bool, RelayError> {
    let inspection = engine.inspect(&container.id, cancellation).await?;

    let original_host_config = inspection.host_config.clone().unwrap_or_default();
    let original_networks = extract_network_config(&inspection);
    let new_config = build_new_config(&inspection, new_image_reference);

    let staging_host_config = staging_host_config(&original_host_config);
    let staging_network_config = staging_network_config(&original_networks);

    let staging_name = container.staging_name();
    let staging_id = match engine
        .create_staging_and_start(&staging_name, &new_config, &staging_host_config, &staging_network_config, cancellation)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!(container = %container.name, error = %e, "failed to create staging container, old container untouched");
            return Ok(false);
        }
    };

    let timeout_override = container
        .healthcheck_timeout_override()
        .map(std::time::Duration::from_secs)
        .unwrap_or(options.healthcheck_timeout);

    let healthy =
        match engine.wait_healthy(&staging_id, timeout_override, options.healthcheck_interval, cancellation).await {
            Ok(healthy) => healthy,
            Err(RelayError::Cancelled) => {
                best_effort_force_remove(engine, &staging_id, cancellation).await;
                return Err(RelayError::Cancelled);
            }
            Err(e) => {
                warn!(container = %container.name, error = %e, "wait_healthy failed, old container untouched");
                best_effort_force_remove(engine, &staging_id, cancellation).await;
                return Ok(false);
            }
        };

    if !healthy {
        info!(container = %container.name, "staging container did not become healthy, rolling back");
        best_effort_force_remove(engine, &staging_id, cancellation).await;
        return Ok(false);
    }

    // Past this point the old container is torn down; any failure here is
    // catastrophic and not automatically rolled back (spec.md §4.5, §9).
    engine.stop(&container.id, cancellation).await?;
    engine.remove(&container.id, cancellation).await?;
    best_effort_force_remove(engine, &staging_id, cancellation).await;

    engine
        .create_and_start(&container.name, &new_config, &original_host_config, &original_networks, cancellation)
        .await?;

    if options.cleanup_old_images {
        if let Err(e) = engine.remove_image(&container.image_digest, cancellation).await {
            warn!(container = %container.name, error = %e, "failed to remove old image, ignoring");
        }
    }

    Ok(true)
}

async fn legacy_replace(
    container: &MonitoredContainer,
    new_image_reference: &str,
    engine: &dyn EngineClient,
    options: ReplacementOptions,
    cancellation: &CancellationToken,
) -> Result<bool, RelayError> {
    let inspection = engine.inspect(&container.id, cancellation).await?;
    let original_host_config = inspection.host_config.clone().unwrap_or_default();
    let original_networks = extract_network_config(&inspection);
    let new_config = build_new_config(&inspection, new_image_reference);

    engine.stop(&container.id, cancellation).await?;
    engine.remove(&container.id, cancellation).await?;
    engine
        .create_and_start(&container.name, &new_config, &original_host_config, &original_networks, cancellation)
        .await?;

    if options.cleanup_old_images {
        if let Err(e) = engine.remove_image(&container.image_digest, cancellation).await {
            warn!(container = %container.name, error = %e, "failed to remove old image, ignoring");
        }
    }

    Ok(true)
}

async fn best_effort_force_remove(engine: &dyn EngineClient, id: &str, cancellation: &CancellationToken) {
    if let Err(e) = engine.force_remove(id, cancellation).await {
        warn!(id, error = %e, "failed to force-remove staging container");
    }
}

/// Clone the inspected config with `image` replaced; every other field is
/// copied verbatim (spec.md §4.5 step 2).
fn build_new_config(inspection: &ContainerInspectResponse, new_image_reference: &str) -> ContainerConfig {
    let inspected = inspection.config.clone().unwrap_or_default();

    ContainerConfig {
        hostname: inspected.hostname,
        domainname: inspected.domainname,
        user: inspected.user,
        attach_stdin: inspected.attach_stdin,
        attach_stdout: inspected.attach_stdout,
        attach_stderr: inspected.attach_stderr,
        exposed_ports: inspected.exposed_ports,
        tty: inspected.tty,
        open_stdin: inspected.open_stdin,
        stdin_once: inspected.stdin_once,
        env: inspected.env,
        cmd: inspected.cmd,
        healthcheck: inspected.healthcheck,
        args_escaped: inspected.args_escaped,
        image: Some(new_image_reference.to_string()),
        volumes: inspected.volumes,
        working_dir: inspected.working_dir,
        entrypoint: inspected.entrypoint,
        network_disabled: inspected.network_disabled,
        mac_address: inspected.mac_address,
        on_build: inspected.on_build,
        labels: inspected.labels,
        stop_signal: inspected.stop_signal,
        stop_timeout: inspected.stop_timeout,
        shell: inspected.shell,
        host_config: None,
        networking_config: None,
    }
}

/// Strip port bindings and disable `publish_all_ports`; every other field of
/// the host config is preserved (spec.md §4.5 step 3).
fn staging_host_config(original: &HostConfig) -> HostConfig {
    HostConfig { port_bindings: None, publish_all_ports: Some(false), ..original.clone() }
}

/// Keep aliases, network id, driver options, links, and IPAM config; blank
/// out assigned addresses so the engine assigns fresh ones (spec.md §4.5
/// step 4).
fn staging_network_config(original: &NetworkConfig) -> NetworkConfig {
    original
        .iter()
        .map(|(network_name, endpoint)| {
            let staged = EndpointSettings {
                ip_address: None,
                ip_prefix_len: None,
                global_ipv6_address: None,
                global_ipv6_prefix_len: None,
                mac_address: None,
                ..endpoint.clone()
            };
            (network_name.clone(), staged)
        })
        .collect()
}

fn extract_network_config(inspection: &ContainerInspectResponse) -> NetworkConfig {
    inspection
        .network_settings
        .as_ref()
        .and_then(|settings| settings.networks.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngineClient;
    use std::collections::HashMap;

    fn container() -> MonitoredContainer {
        MonitoredContainer {
            id: "orig-id".into(),
            name: "nginx".into(),
            image_reference: "nginx:1.25.0".into(),
            image_digest: "sha256:old".into(),
            labels: HashMap::new(),
        }
    }

    fn default_options() -> ReplacementOptions {
        ReplacementOptions {
            rolling_update_enabled: true,
            healthcheck_timeout: std::time::Duration::from_secs(1),
            healthcheck_interval: std::time::Duration::from_millis(10),
            cleanup_old_images: false,
        }
    }

    fn inspection_with_port_bindings() -> ContainerInspectResponse {
        let mut port_bindings = HashMap::new();
        port_bindings.insert("80/tcp".to_string(), None);

        ContainerInspectResponse {
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                publish_all_ports: Some(true),
                binds: Some(vec!["/data:/data".to_string()]),
                ..Default::default()
            }),
            config: Some(bollard::secret::ContainerConfig {
                image: Some("nginx:1.25.0".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rolling_success_strips_port_bindings_for_staging_only() {
        let c = container();
        let engine = MockEngineClient::new()
            .with_inspection(&c.id, inspection_with_port_bindings())
            .with_wait_healthy_result(true);
        let token = CancellationToken::new();

        let success = replace(&c, "nginx:1.26.0", &engine, default_options(), &token).await;
        assert!(success);

        let created = engine.created_containers();
        assert_eq!(created.len(), 2);

        let staging = created.iter().find(|c| c.staging).unwrap();
        assert_eq!(staging.host_config.port_bindings, None);
        assert_eq!(staging.host_config.publish_all_ports, Some(false));
        assert_eq!(staging.host_config.binds, Some(vec!["/data:/data".to_string()]));

        let final_container = created.iter().find(|c| !c.staging).unwrap();
        assert_eq!(final_container.name, "nginx");
        assert!(final_container.host_config.port_bindings.is_some());
        assert_eq!(final_container.host_config.publish_all_ports, Some(true));

        assert_eq!(engine.stopped_ids(), vec!["orig-id".to_string()]);
        assert_eq!(engine.removed_ids(), vec!["orig-id".to_string()]);
        assert!(!engine.force_removed_ids().is_empty());
    }

    #[tokio::test]
    async fn unhealthy_staging_rolls_back_without_touching_original() {
        let c = container();
        let engine = MockEngineClient::new()
            .with_inspection(&c.id, inspection_with_port_bindings())
            .with_wait_healthy_result(false);
        let token = CancellationToken::new();

        let success = replace(&c, "nginx:1.26.0", &engine, default_options(), &token).await;
        assert!(!success);

        assert!(engine.stopped_ids().is_empty());
        assert!(engine.removed_ids().is_empty());
        assert_eq!(engine.force_removed_ids().len(), 1);
    }

    #[tokio::test]
    async fn legacy_mode_never_creates_staging_container() {
        let c = container();
        let engine = MockEngineClient::new().with_inspection(&c.id, inspection_with_port_bindings());
        let token = CancellationToken::new();

        let mut options = default_options();
        options.rolling_update_enabled = false;

        let success = replace(&c, "nginx:1.26.0", &engine, options, &token).await;
        assert!(success);

        let created = engine.created_containers();
        assert_eq!(created.len(), 1);
        assert!(!created[0].staging);
        assert_eq!(engine.stopped_ids(), vec!["orig-id".to_string()]);
        assert_eq!(engine.removed_ids(), vec!["orig-id".to_string()]);
    }

    #[tokio::test]
    async fn cleanup_disabled_never_removes_image() {
        let c = container();
        let engine = MockEngineClient::new()
            .with_inspection(&c.id, inspection_with_port_bindings())
            .with_wait_healthy_result(true);
        let token = CancellationToken::new();

        replace(&c, "nginx:1.26.0", &engine, default_options(), &token).await;
        assert!(engine.removed_images().is_empty());
    }
}
