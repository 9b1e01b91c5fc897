//! Version Resolver (spec.md §4.1): normalize registry tags to
//! `(major, minor, patch)` triples and pick the newest one a strategy
//! permits.

use tracing::debug;

use crate::model::{UpdateStrategy, Version};

const REJECTED_TAGS: &[&str] = &["latest", "stable", "edge", "dev", "nightly"];
const PREFIXES: &[&str] = &["version-", "release-", "v", "V"];

/// Parse a registry tag into a [`Version`], or `None` if it does not denote
/// a version at all.
///
/// Strips the single longest-matching prefix from `version-`, `release-`,
/// `v`, `V`, then tries a strict semver parse before falling back to a
/// permissive `.`/`-`/`+` split.
pub fn normalize(tag: &str) -> Option<Version> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return None;
    }
    if REJECTED_TAGS.iter().any(|rejected| trimmed.eq_ignore_ascii_case(rejected)) {
        return None;
    }

    let stripped = strip_longest_prefix(trimmed);

    if let Ok(semver) = semver::Version::parse(stripped) {
        return Some(Version::new(semver.major, semver.minor, semver.patch, tag));
    }

    parse_loosely(stripped).map(|(major, minor, patch)| Version::new(major, minor, patch, tag))
}

fn strip_longest_prefix(tag: &str) -> &str {
    PREFIXES
        .iter()
        .filter_map(|prefix| {
            let lower_tag = tag.to_ascii_lowercase();
            let lower_prefix = prefix.to_ascii_lowercase();
            lower_tag.starts_with(&lower_prefix).then_some(prefix.len())
        })
        .max()
        .map(|len| &tag[len..])
        .unwrap_or(tag)
}

fn parse_loosely(text: &str) -> Option<(u64, u64, u64)> {
    let segments: Vec<&str> =
        text.split(|c| c == '.' || c == '-' || c == '+').filter(|s| !s.is_empty()).collect();

    let major = segments.first()?.parse::<u64>().ok()?;
    let minor = segments.get(1).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
    let patch = segments.get(2).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
    Some((major, minor, patch))
}

/// Whether `candidate` is newer than `current` under `strategy` (spec.md
/// §4.1's strategy-bounded newer-than rule).
pub fn is_newer(current: &Version, candidate: &Version, strategy: UpdateStrategy) -> bool {
    if candidate <= current {
        return false;
    }
    match strategy {
        UpdateStrategy::Digest => false,
        UpdateStrategy::Patch => candidate.major == current.major && candidate.minor == current.minor,
        UpdateStrategy::Minor => candidate.major == current.major,
        UpdateStrategy::Major => true,
    }
}

/// Pick the newest candidate tag string permitted by `strategy`, or `None`
/// if `current_tag` is not itself a version or no candidate qualifies.
pub fn find_newest<'a, I>(current_tag: &str, candidates: I, strategy: UpdateStrategy) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let current = normalize(current_tag)?;

    let mut best: Option<(Version, &str)> = None;
    for candidate_tag in candidates {
        let Some(candidate) = normalize(candidate_tag) else { continue };
        if !is_newer(&current, &candidate, strategy) {
            continue;
        }
        match &best {
            Some((best_version, _)) if candidate <= *best_version => {}
            _ => best = Some((candidate, candidate_tag)),
        }
    }

    if let Some((_, tag)) = &best {
        debug!(current_tag, chosen_tag = tag, "found newer tag");
    }
    best.map(|(_, tag)| tag.to_string())
}
