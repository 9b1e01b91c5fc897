//! Update Detector (spec.md §4.4): decide whether a monitored container has
//! an available update and, if so, produce a replacement plan.

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::engine::EngineClient;
use crate::error::RelayError;
use crate::model::{DetectorResult, MonitoredContainer, UpdateStrategy};
use crate::registry::{CredentialsLookup, RegistryClient};
use crate::version;

/// `check(container) -> DetectorResult`, dispatching to the digest or
/// version strategy path and falling back from version to digest as
/// described in spec.md §4.4.
///
/// Returns `Err(RelayError::Cancelled)` rather than folding it into
/// `DetectorResult::Failed`: spec.md §7 requires cancellation to propagate
/// without counting the container as checked-and-failed, which only works
/// if the orchestrator can tell cancellation apart from every other error.
#[instrument(skip(engine, registry, credentials, cancellation), fields(container = %container.name))]
pub async fn check(
    container: &MonitoredContainer,
    engine: &dyn EngineClient,
    registry: &dyn RegistryClient,
    credentials: CredentialsLookup<'_>,
    cancellation: &CancellationToken,
) -> Result<DetectorResult, RelayError> {
    let strategy = container.strategy();

    let result = if strategy.requires_registry_query() {
        version_strategy_path(container, strategy, engine, registry, credentials, cancellation).await
    } else {
        digest_strategy_path(container, &container.image_reference, engine, cancellation).await
    };

    match result {
        Ok(outcome) => Ok(outcome),
        Err(RelayError::Cancelled) => Err(RelayError::Cancelled),
        Err(e) => Ok(DetectorResult::Failed { current_digest: container.image_digest.clone(), reason: e.to_string() }),
    }
}

async fn digest_strategy_path(
    container: &MonitoredContainer,
    image_reference: &str,
    engine: &dyn EngineClient,
    cancellation: &CancellationToken,
) -> Result<DetectorResult, RelayError> {
    let pull_result = engine.pull(image_reference, cancellation).await;

    let latest_digest = match pull_result {
        Ok(digest) => digest,
        Err(RelayError::Cancelled) => return Err(RelayError::Cancelled),
        Err(e) => {
            return Ok(DetectorResult::Failed {
                current_digest: container.image_digest.clone(),
                reason: format!("Failed to pull image: {e}"),
            })
        }
    };

    if latest_digest.eq_ignore_ascii_case(&container.image_digest) {
        Ok(DetectorResult::NoUpdate { current_digest: container.image_digest.clone() })
    } else {
        Ok(DetectorResult::UpdateFound {
            current_digest: container.image_digest.clone(),
            new_digest: latest_digest,
            new_image_reference: image_reference.to_string(),
        })
    }
}

async fn version_strategy_path(
    container: &MonitoredContainer,
    strategy: UpdateStrategy,
    engine: &dyn EngineClient,
    registry: &dyn RegistryClient,
    credentials: CredentialsLookup<'_>,
    cancellation: &CancellationToken,
) -> Result<DetectorResult, RelayError> {
    let tags = registry.tags(&container.image_reference, credentials).await;

    if tags.is_empty() {
        debug!(container = %container.name, "empty tag list, falling back to digest path");
        return digest_strategy_path(container, &container.image_reference, engine, cancellation).await;
    }

    let candidates = tags.iter().map(String::as_str);
    let Some(chosen_tag) = version::find_newest(&container.tag(), candidates, strategy) else {
        debug!(container = %container.name, "no strategy-newer tag found, falling back to digest path");
        return digest_strategy_path(container, &container.image_reference, engine, cancellation).await;
    };

    let new_image_reference = format!("{}:{chosen_tag}", container.repository());
    let pull_result = engine.pull(&new_image_reference, cancellation).await;

    match pull_result {
        Ok(new_digest) => Ok(DetectorResult::UpdateFound {
            current_digest: container.image_digest.clone(),
            new_digest,
            new_image_reference,
        }),
        Err(RelayError::Cancelled) => Err(RelayError::Cancelled),
        Err(e) => Ok(DetectorResult::Failed {
            current_digest: container.image_digest.clone(),
            reason: format!("Failed to pull image: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::engine::mock::MockEngineClient;
    use crate::model::RegistryCredentials;

    fn container(image_reference: &str, digest: &str, strategy: Option<&str>) -> MonitoredContainer {
        let mut labels = HashMap::new();
        if let Some(strategy) = strategy {
            labels.insert("relay.update".to_string(), strategy.to_string());
        }
        MonitoredContainer {
            id: "abc".into(),
            name: "nginx".into(),
            image_reference: image_reference.into(),
            image_digest: digest.into(),
            labels,
        }
    }

    struct StubRegistry(Vec<String>);

    #[async_trait::async_trait]
    impl RegistryClient for StubRegistry {
        async fn tags(&self, _image_reference: &str, _credentials: CredentialsLookup<'_>) -> Vec<String> {
            self.0.clone()
        }
    }

    fn anon(_host: &str) -> RegistryCredentials {
        RegistryCredentials::anonymous("unused")
    }

    #[tokio::test]
    async fn digest_no_op() {
        let c = container("nginx:latest", "sha256:A", None);
        let engine = MockEngineClient::new().with_pull_result("nginx:latest", Ok("sha256:A"));
        let registry = StubRegistry(vec![]);
        let token = CancellationToken::new();

        let result = check(&c, &engine, &registry, &anon, &token).await.unwrap();
        assert_eq!(result, DetectorResult::NoUpdate { current_digest: "sha256:A".into() });
    }

    #[tokio::test]
    async fn digest_update_found() {
        let c = container("nginx:latest", "sha256:A", None);
        let engine = MockEngineClient::new().with_pull_result("nginx:latest", Ok("sha256:B"));
        let registry = StubRegistry(vec![]);
        let token = CancellationToken::new();

        let result = check(&c, &engine, &registry, &anon, &token).await.unwrap();
        assert_eq!(
            result,
            DetectorResult::UpdateFound {
                current_digest: "sha256:A".into(),
                new_digest: "sha256:B".into(),
                new_image_reference: "nginx:latest".into(),
            }
        );
    }

    #[tokio::test]
    async fn minor_strategy_picks_newest_qualifying_tag() {
        let c = container("nginx:1.25.0", "sha256:A", Some("minor"));
        let engine = MockEngineClient::new().with_pull_result("nginx:1.26.0", Ok("sha256:N"));
        let registry = StubRegistry(vec!["1.25.0".into(), "1.25.1".into(), "1.26.0".into(), "2.0.0".into()]);
        let token = CancellationToken::new();

        let result = check(&c, &engine, &registry, &anon, &token).await.unwrap();
        assert_eq!(
            result,
            DetectorResult::UpdateFound {
                current_digest: "sha256:A".into(),
                new_digest: "sha256:N".into(),
                new_image_reference: "nginx:1.26.0".into(),
            }
        );
    }

    #[tokio::test]
    async fn patch_guardrail_falls_back_to_digest_path() {
        let c = container("nginx:1.25.0", "sha256:A", Some("patch"));
        let engine = MockEngineClient::new().with_pull_result("nginx:1.25.0", Ok("sha256:A"));
        let registry = StubRegistry(vec!["1.25.0".into(), "1.26.0".into()]);
        let token = CancellationToken::new();

        let result = check(&c, &engine, &registry, &anon, &token).await.unwrap();
        assert_eq!(result, DetectorResult::NoUpdate { current_digest: "sha256:A".into() });
    }

    #[tokio::test]
    async fn empty_tag_list_falls_back_to_digest_path() {
        let c = container("nginx:1.25.0", "sha256:A", Some("major"));
        let engine = MockEngineClient::new().with_pull_result("nginx:1.25.0", Ok("sha256:B"));
        let registry = StubRegistry(vec![]);
        let token = CancellationToken::new();

        let result = check(&c, &engine, &registry, &anon, &token).await.unwrap();
        assert_eq!(
            result,
            DetectorResult::UpdateFound {
                current_digest: "sha256:A".into(),
                new_digest: "sha256:B".into(),
                new_image_reference: "nginx:1.25.0".into(),
            }
        );
    }

    #[tokio::test]
    async fn pull_failure_yields_failed() {
        let c = container("nginx:latest", "sha256:A", None);
        let engine = MockEngineClient::new().with_pull_result("nginx:latest", Err("connection reset"));
        let registry = StubRegistry(vec![]);
        let token = CancellationToken::new();

        let result = check(&c, &engine, &registry, &anon, &token).await.unwrap();
        assert!(result.is_failed());
    }

    #[tokio::test]
    async fn cancellation_propagates_instead_of_becoming_failed() {
        let c = container("nginx:latest", "sha256:A", None);
        let engine = MockEngineClient::new().with_pull_result("nginx:latest", Ok("sha256:B"));
        let registry = StubRegistry(vec![]);
        let token = CancellationToken::new();
        token.cancel();

        let result = check(&c, &engine, &registry, &anon, &token).await;
        assert!(matches!(result, Err(RelayError::Cancelled)));
    }
}
