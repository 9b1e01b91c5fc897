//! Environment-driven configuration (spec.md §6). Loaded once at startup;
//! the core only ever sees the resolved [`RelayConfig`].

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::model::{labels, RegistryCredentials};
use crate::registry::auth::CredentialsStore;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub check_interval_seconds: u64,
    pub enable_label_key: String,
    pub cleanup_old_images: bool,
    pub engine_host: Option<String>,
    pub engine_timeout_seconds: u64,
    pub check_on_startup: bool,
    pub engine_config_path: Option<String>,
    pub rolling_update_enabled: bool,
    pub healthcheck_timeout_sec: u64,
    pub healthcheck_interval_sec: u64,
    /// Lazily loaded and memoized on first lookup, matching spec.md §9's
    /// "global state elimination" note: the source loads its engine
    /// credentials config once and memoizes it, rather than re-reading the
    /// file on every registry call.
    credentials_cache: Arc<OnceLock<CredentialsStore>>,
}

impl RelayConfig {
    /// Load from the process environment, substituting defaults for
    /// anything unset or unparseable (spec.md §7's "Configuration-derived"
    /// error policy: silently substitute default).
    pub fn from_env() -> Self {
        Self {
            check_interval_seconds: parse_u64("RELAY_CHECK_INTERVAL_SECONDS", 300),
            enable_label_key: parse_string("RELAY_ENABLE_LABEL_KEY", labels::ENABLE_DEFAULT),
            cleanup_old_images: parse_bool("RELAY_CLEANUP_OLD_IMAGES", false),
            engine_host: parse_optional_string("RELAY_ENGINE_HOST"),
            engine_timeout_seconds: parse_u64("RELAY_ENGINE_TIMEOUT_SECONDS", 60),
            check_on_startup: parse_bool("RELAY_CHECK_ON_STARTUP", true),
            engine_config_path: parse_optional_string("RELAY_ENGINE_CONFIG_PATH"),
            rolling_update_enabled: parse_bool("RELAY_ROLLING_UPDATE_ENABLED", true),
            healthcheck_timeout_sec: parse_u64("RELAY_HEALTHCHECK_TIMEOUT_SEC", 60),
            healthcheck_interval_sec: parse_u64("RELAY_HEALTHCHECK_INTERVAL_SEC", 5),
            credentials_cache: Arc::new(OnceLock::new()),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_seconds)
    }

    pub fn healthcheck_timeout(&self) -> Duration {
        Duration::from_secs(self.healthcheck_timeout_sec)
    }

    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval_sec)
    }

    /// The credentials store for this config's `engine_config_path` (or the
    /// auto-detected default location), loaded from disk on first use and
    /// memoized for the lifetime of this `RelayConfig`.
    fn credentials_store(&self) -> &CredentialsStore {
        self.credentials_cache
            .get_or_init(|| CredentialsStore::load(self.engine_config_path.as_deref().map(std::path::Path::new)))
    }

    /// Resolve credentials for `registry_host` from the memoized store.
    pub fn credentials_for(&self, registry_host: &str) -> RegistryCredentials {
        self.credentials_store().credentials_for(registry_host)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 300,
            enable_label_key: labels::ENABLE_DEFAULT.to_string(),
            cleanup_old_images: false,
            engine_host: None,
            engine_timeout_seconds: 60,
            check_on_startup: true,
            engine_config_path: None,
            rolling_update_enabled: true,
            healthcheck_timeout_sec: 60,
            healthcheck_interval_sec: 5,
            credentials_cache: Arc::new(OnceLock::new()),
        }
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(default)
}

fn parse_string(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn parse_optional_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.check_interval_seconds, 300);
        assert_eq!(config.enable_label_key, "relay.enable");
        assert!(!config.cleanup_old_images);
        assert!(config.check_on_startup);
        assert!(config.rolling_update_enabled);
        assert_eq!(config.healthcheck_timeout_sec, 60);
        assert_eq!(config.healthcheck_interval_sec, 5);
    }

    #[test]
    fn zero_or_negative_falls_back_to_default() {
        assert_eq!(parse_u64("RELAY_TEST_DOES_NOT_EXIST_XYZ", 300), 300);
    }
}
