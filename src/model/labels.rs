//! Label keys read off a container by the orchestrator and detector.
//!
//! `ENABLE` is fixed only as a *default*; the key actually consulted is
//! configurable (`RelayConfig::enable_label_key`, spec.md §6). `UPDATE` and
//! `HEALTHCHECK_TIMEOUT` are always these exact strings.

/// Default value of the configurable enable-label key.
pub const ENABLE_DEFAULT: &str = "relay.enable";

/// Per-container update strategy. Fixed key.
pub const UPDATE: &str = "relay.update";

/// Per-container healthcheck timeout override, in seconds. Fixed key.
pub const HEALTHCHECK_TIMEOUT: &str = "relay.healthcheck.timeout";
