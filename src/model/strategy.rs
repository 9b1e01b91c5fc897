use std::str::FromStr;

/// Per-container update policy, read from the `relay.update` label.
///
/// Unset or unrecognized values fall back to [`UpdateStrategy::Digest`]
/// (spec.md §6 labels table) rather than failing the container out of
/// monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    /// Compare the currently-running image's digest against a fresh pull of
    /// the same reference. Never consults the registry's tag list.
    #[default]
    Digest,
    /// Accept a newer tag only if major and minor match the current tag.
    Patch,
    /// Accept a newer tag only if major matches the current tag.
    Minor,
    /// Accept any strictly newer tag.
    Major,
}

impl UpdateStrategy {
    /// `true` for every strategy except [`UpdateStrategy::Digest`], which
    /// never needs the registry's tag list.
    pub fn requires_registry_query(self) -> bool {
        !matches!(self, UpdateStrategy::Digest)
    }
}

impl FromStr for UpdateStrategy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "patch" => UpdateStrategy::Patch,
            "minor" => UpdateStrategy::Minor,
            "major" => UpdateStrategy::Major,
            _ => UpdateStrategy::Digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_and_missing_fall_back_to_digest() {
        assert_eq!("".parse::<UpdateStrategy>().unwrap(), UpdateStrategy::Digest);
        assert_eq!("bogus".parse::<UpdateStrategy>().unwrap(), UpdateStrategy::Digest);
        assert_eq!(UpdateStrategy::default(), UpdateStrategy::Digest);
    }

    #[test]
    fn recognized_values_are_case_insensitive() {
        assert_eq!("PATCH".parse::<UpdateStrategy>().unwrap(), UpdateStrategy::Patch);
        assert_eq!("Minor".parse::<UpdateStrategy>().unwrap(), UpdateStrategy::Minor);
        assert_eq!("major".parse::<UpdateStrategy>().unwrap(), UpdateStrategy::Major);
    }

    #[test]
    fn requires_registry_query() {
        assert!(!UpdateStrategy::Digest.requires_registry_query());
        assert!(UpdateStrategy::Patch.requires_registry_query());
        assert!(UpdateStrategy::Minor.requires_registry_query());
        assert!(UpdateStrategy::Major.requires_registry_query());
    }
}
