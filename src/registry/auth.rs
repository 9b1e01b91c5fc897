//! Engine credentials source: reads the operator's container-engine
//! `config.json` and resolves credentials for a registry host (spec.md §6.4).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::prelude::*;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::RegistryCredentials;

const DOCKER_HUB_ALIASES: &[&str] = &[
    "docker.io",
    "index.docker.io",
    "registry-1.docker.io",
    "https://index.docker.io/v1/",
    "https://index.docker.io/v2/",
];

#[derive(Debug, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
}

#[derive(Debug, Deserialize, Default)]
struct DockerAuthEntry {
    #[serde(default)]
    auth: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    identitytoken: String,
    #[serde(default)]
    registrytoken: String,
}

/// Resolves registry credentials from a config file parsed once at startup.
#[derive(Debug)]
pub struct CredentialsStore {
    config: DockerConfig,
}

impl CredentialsStore {
    /// Load from an explicit path, or auto-detect: `$DOCKER_CONFIG/config.json`
    /// if set, else `~/.docker/config.json`. A missing or unparseable file
    /// yields an empty store (every lookup resolves to anonymous).
    pub fn load(explicit_path: Option<&Path>) -> Self {
        let path = explicit_path.map(PathBuf::from).or_else(default_config_path);

        let Some(path) = path else {
            debug!("no engine config path resolved, credentials lookup will be anonymous");
            return Self { config: DockerConfig { auths: HashMap::new() } };
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => Self { config },
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to parse engine config, treating as empty");
                    Self { config: DockerConfig { auths: HashMap::new() } }
                }
            },
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no engine config file found, credentials lookup will be anonymous");
                Self { config: DockerConfig { auths: HashMap::new() } }
            }
        }
    }

    /// Resolve credentials for `registry_host`. Always returns a value;
    /// `has_credentials()` is false when nothing matched.
    pub fn credentials_for(&self, registry_host: &str) -> RegistryCredentials {
        for candidate_key in candidate_keys(registry_host) {
            if let Some(entry) = self.config.auths.get(&candidate_key) {
                if let Some(creds) = decode_entry(entry, registry_host) {
                    return creds;
                }
            }
        }
        RegistryCredentials::anonymous(registry_host)
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
        return Some(PathBuf::from(dir).join("config.json"));
    }
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".docker").join("config.json"))
}

/// Registry keys to try, in the order spec.md §6.4 specifies: direct,
/// normalized, Docker Hub aliases, then `https://<host>[/v1/|/v2/]`.
fn candidate_keys(registry_host: &str) -> Vec<String> {
    let mut keys = vec![registry_host.to_string()];

    let normalized = normalize_key(registry_host);
    if normalized != registry_host {
        keys.push(normalized);
    }

    if registry_host == "docker.io" {
        keys.extend(DOCKER_HUB_ALIASES.iter().map(|s| s.to_string()));
    }

    keys.push(format!("https://{registry_host}"));
    keys.push(format!("https://{registry_host}/v1/"));
    keys.push(format!("https://{registry_host}/v2/"));

    keys
}

fn normalize_key(key: &str) -> String {
    let stripped = key.trim_start_matches("https://").trim_start_matches("http://");
    stripped.trim_end_matches("/v1/").trim_end_matches("/v2/").trim_end_matches('/').to_string()
}

/// Token fields take precedence over username/password; the base64 `auth`
/// field is decoded by splitting on the first `:`. `registrytoken` and
/// `identitytoken` are carried as a bearer token rather than folded into
/// `username`/`password`, since neither is a password the registry client
/// could present over HTTP Basic (spec.md §6.4, §4.2).
fn decode_entry(entry: &DockerAuthEntry, registry_host: &str) -> Option<RegistryCredentials> {
    if !entry.registrytoken.is_empty() {
        return Some(RegistryCredentials {
            registry_host: registry_host.to_string(),
            username: None,
            password: None,
            token: Some(entry.registrytoken.clone()),
        });
    }
    if !entry.identitytoken.is_empty() {
        return Some(RegistryCredentials {
            registry_host: registry_host.to_string(),
            username: None,
            password: None,
            token: Some(entry.identitytoken.clone()),
        });
    }
    if !entry.username.is_empty() && !entry.password.is_empty() {
        return Some(RegistryCredentials {
            registry_host: registry_host.to_string(),
            username: Some(entry.username.clone()),
            password: Some(entry.password.clone()),
            token: None,
        });
    }
    if !entry.auth.is_empty() {
        let decoded = BASE64_STANDARD.decode(entry.auth.as_bytes()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        return Some(RegistryCredentials {
            registry_host: registry_host.to_string(),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            token: None,
        });
    }
    None
}
