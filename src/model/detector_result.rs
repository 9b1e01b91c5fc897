/// Outcome of running the Update Detector against a single monitored
/// container (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorResult {
    /// No update available. `current_digest` is the digest the container was
    /// already running.
    NoUpdate { current_digest: String },
    /// An update is available and ready to be rolled out.
    UpdateFound {
        current_digest: String,
        new_digest: String,
        /// Fully qualified reference to pull for the replacement, e.g.
        /// `nginx:1.26.0` for a version-strategy match or the container's own
        /// reference re-pulled for a digest-strategy match.
        new_image_reference: String,
    },
    /// Detection itself failed (registry unreachable, pull failed, etc). Does
    /// not indicate a failed replacement — that is a separate failure path in
    /// the Replacement Engine.
    Failed { current_digest: String, reason: String },
}

impl DetectorResult {
    pub fn is_update_found(&self) -> bool {
        matches!(self, DetectorResult::UpdateFound { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DetectorResult::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_predicates() {
        let no_update = DetectorResult::NoUpdate { current_digest: "sha256:a".into() };
        let found = DetectorResult::UpdateFound {
            current_digest: "sha256:a".into(),
            new_digest: "sha256:b".into(),
            new_image_reference: "nginx:1.26.0".into(),
        };
        let failed = DetectorResult::Failed {
            current_digest: "sha256:a".into(),
            reason: "registry unreachable".into(),
        };

        assert!(!no_update.is_update_found());
        assert!(!no_update.is_failed());
        assert!(found.is_update_found());
        assert!(!found.is_failed());
        assert!(!failed.is_update_found());
        assert!(failed.is_failed());
    }
}
