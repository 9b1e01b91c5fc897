use std::collections::HashMap;

use super::labels;
use super::reference::split_reference;
use super::strategy::UpdateStrategy;

/// A running container the orchestrator has selected for monitoring this
/// cycle, as reported by `EngineClient::list_monitored` (spec.md §3).
///
/// Constructed once by the engine client from its listing and never mutated
/// afterwards; it is discarded at the end of the cycle that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredContainer {
    pub id: String,
    pub name: String,
    pub image_reference: String,
    pub image_digest: String,
    pub labels: HashMap<String, String>,
}

impl MonitoredContainer {
    /// `(repository, tag)` parsed out of `image_reference` (spec.md §3).
    pub fn repository_and_tag(&self) -> (String, String) {
        split_reference(&self.image_reference)
    }

    pub fn repository(&self) -> String {
        self.repository_and_tag().0
    }

    pub fn tag(&self) -> String {
        self.repository_and_tag().1
    }

    /// Update strategy from the `relay.update` label, defaulting to
    /// [`UpdateStrategy::Digest`] when unset or unrecognized.
    pub fn strategy(&self) -> UpdateStrategy {
        self.labels
            .get(labels::UPDATE)
            .map(|v| v.parse().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Per-container healthcheck timeout override from
    /// `relay.healthcheck.timeout`. Zero, negative, or unparseable values are
    /// ignored (spec.md §6).
    pub fn healthcheck_timeout_override(&self) -> Option<u64> {
        self.labels
            .get(labels::HEALTHCHECK_TIMEOUT)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(|v| v as u64)
    }

    /// Name of the ephemeral staging container used during a rolling
    /// replacement (spec.md §4.5).
    pub fn staging_name(&self) -> String {
        format!("{}-relay-staging", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container_with_labels(labels: HashMap<String, String>) -> MonitoredContainer {
        MonitoredContainer {
            id: "abc123".to_string(),
            name: "nginx".to_string(),
            image_reference: "nginx:1.25.0".to_string(),
            image_digest: "sha256:aaa".to_string(),
            labels,
        }
    }

    #[test]
    fn repository_and_tag_are_derived() {
        let c = container_with_labels(HashMap::new());
        assert_eq!(c.repository(), "nginx");
        assert_eq!(c.tag(), "1.25.0");
    }

    #[test]
    fn strategy_defaults_to_digest() {
        let c = container_with_labels(HashMap::new());
        assert_eq!(c.strategy(), UpdateStrategy::Digest);
    }

    #[test]
    fn strategy_reads_label() {
        let mut labels = HashMap::new();
        labels.insert("relay.update".to_string(), "minor".to_string());
        let c = container_with_labels(labels);
        assert_eq!(c.strategy(), UpdateStrategy::Minor);
    }

    #[test]
    fn healthcheck_override_ignores_non_positive() {
        for bad in ["0", "-5", "not-a-number", ""] {
            let mut labels = HashMap::new();
            labels.insert("relay.healthcheck.timeout".to_string(), bad.to_string());
            let c = container_with_labels(labels);
            assert_eq!(c.healthcheck_timeout_override(), None, "input: {bad}");
        }
    }

    #[test]
    fn healthcheck_override_accepts_positive_integer() {
        let mut labels = HashMap::new();
        labels.insert("relay.healthcheck.timeout".to_string(), "90".to_string());
        let c = container_with_labels(labels);
        assert_eq!(c.healthcheck_timeout_override(), Some(90));
    }

    #[test]
    fn staging_name_suffix() {
        let c = container_with_labels(HashMap::new());
        assert_eq!(c.staging_name(), "nginx-relay-staging");
    }
}
