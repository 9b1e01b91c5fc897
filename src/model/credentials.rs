/// Credentials resolved for a single registry host (spec.md §4.2, §6.4).
///
/// Produced by [`crate::registry::auth`] from the local Docker `config.json`
/// and handed to the Registry Client for a given pull; absent entirely for
/// anonymous registries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistryCredentials {
    pub registry_host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// A pre-obtained bearer token (from `config.json`'s `registrytoken` or
    /// `identitytoken` fields, spec.md §6.4). Takes precedence over
    /// `username`/`password` wherever both are present.
    pub token: Option<String>,
}

impl RegistryCredentials {
    pub fn anonymous(registry_host: impl Into<String>) -> Self {
        Self { registry_host: registry_host.into(), username: None, password: None, token: None }
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}
