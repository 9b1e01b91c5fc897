//! Registry Client (spec.md §4.2): resolve the published tags for an image
//! reference's repository over the OCI distribution v2 protocol.

pub mod auth;
pub mod mock;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::{split_reference, RegistryCredentials};

const DOCKER_HUB_HOSTS: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];
const DOCKER_HUB_API_BASE: &str = "https://registry-1.docker.io";
const DOCKER_HUB_AUTH_URL: &str = "https://auth.docker.io/token";

/// A callable resolving a registry host to credentials (spec.md §6.4). Must
/// always return a value.
pub type CredentialsLookup<'a> = &'a dyn Fn(&str) -> RegistryCredentials;

/// Given an image reference, return the tags published for its repository.
/// Never raises: any network or authentication failure is represented by an
/// empty sequence, logged by the implementation.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn tags(&self, image_reference: &str, credentials: CredentialsLookup<'_>) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[allow(dead_code)]
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Option<String> {
        self.token.or(self.access_token)
    }
}

/// `(registry_host, repository)` split of an image reference's repository
/// portion (tag already stripped), per spec.md §4.2.
pub fn split_host_and_repository(image_reference: &str) -> (String, String) {
    let (repository, _tag) = split_reference(image_reference);
    let segments: Vec<&str> = repository.split('/').collect();

    match segments.len() {
        1 => ("docker.io".to_string(), format!("library/{}", segments[0])),
        2 => {
            let first = segments[0];
            if first.contains('.') || first.contains(':') {
                (first.to_string(), segments[1].to_string())
            } else {
                ("docker.io".to_string(), repository)
            }
        }
        _ => (segments[0].to_string(), segments[1..].join("/")),
    }
}

fn is_docker_hub(host: &str) -> bool {
    DOCKER_HUB_HOSTS.contains(&host)
}

/// `reqwest`-backed implementation of the OCI distribution v2 tags/list
/// request, including the Docker Hub and generic Bearer/Basic token flows.
pub struct HttpRegistryClient {
    http: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new(timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is always valid");
        Self { http }
    }

    async fn fetch_tags(&self, host: &str, repository: &str, creds: &RegistryCredentials) -> Option<Vec<String>> {
        let url = if is_docker_hub(host) {
            format!("{DOCKER_HUB_API_BASE}/v2/{repository}/tags/list")
        } else {
            format!("https://{host}/v2/{repository}/tags/list")
        };

        // A config.json entry carrying a pre-obtained `registrytoken` or
        // `identitytoken` is already usable as a bearer token against the
        // tags endpoint directly; it takes precedence over username/password
        // and over the normal challenge/token-exchange dance (spec.md §6.4).
        if let Some(token) = creds.token.as_deref() {
            return self.get_tags_with_bearer(&url, token).await;
        }

        if is_docker_hub(host) {
            let token = self.docker_hub_token(repository, creds).await?;
            return self.get_tags_with_bearer(&url, &token).await;
        }

        let response = self.http.get(&url).send().await.ok()?;

        if response.status().is_success() {
            return decode_tags_response(response).await;
        }

        if response.status().as_u16() != 401 {
            warn!(host, repository, status = %response.status(), "tags/list request failed");
            return None;
        }

        let challenge = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .map(parse_www_authenticate)?;

        match challenge {
            AuthChallenge::Bearer { realm, service, scope } => {
                let scope = scope.unwrap_or_else(|| format!("repository:{repository}:pull"));
                let token = self.bearer_token(&realm, service.as_deref(), &scope, creds).await?;
                self.get_tags_with_bearer(&url, &token).await
            }
            AuthChallenge::Basic => {
                if !creds.has_credentials() {
                    return None;
                }
                let response = self
                    .http
                    .get(&url)
                    .basic_auth(creds.username.as_deref().unwrap_or_default(), creds.password.as_deref())
                    .send()
                    .await
                    .ok()?;
                if !response.status().is_success() {
                    return None;
                }
                decode_tags_response(response).await
            }
            AuthChallenge::Unsupported => None,
        }
    }

    async fn docker_hub_token(&self, repository: &str, creds: &RegistryCredentials) -> Option<String> {
        let scope = format!("repository:{repository}:pull");
        self.bearer_token(DOCKER_HUB_AUTH_URL, Some("registry.docker.io"), &scope, creds).await
    }

    async fn bearer_token(&self, realm: &str, service: Option<&str>, scope: &str, creds: &RegistryCredentials) -> Option<String> {
        let mut query = vec![("scope", scope)];
        if let Some(service) = service {
            query.push(("service", service));
        }

        let mut request = self.http.get(realm).query(&query);
        if creds.has_credentials() {
            request = request.basic_auth(creds.username.as_deref().unwrap_or_default(), creds.password.as_deref());
        }

        let response = request.send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: TokenResponse = response.json().await.ok()?;
        body.into_token()
    }

    async fn get_tags_with_bearer(&self, url: &str, token: &str) -> Option<Vec<String>> {
        let response = self.http.get(url).bearer_auth(token).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        decode_tags_response(response).await
    }
}

async fn decode_tags_response(response: reqwest::Response) -> Option<Vec<String>> {
    let body: TagsResponse = response.json().await.ok()?;
    Some(body.tags.unwrap_or_default())
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn tags(&self, image_reference: &str, credentials: CredentialsLookup<'_>) -> Vec<String> {
        let (host, repository) = split_host_and_repository(image_reference);
        let creds = credentials(&host);

        match self.fetch_tags(&host, &repository, &creds).await {
            Some(tags) => tags,
            None => {
                debug!(image_reference, host, repository, "no tags resolved, returning empty list");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AuthChallenge {
    Bearer { realm: String, service: Option<String>, scope: Option<String> },
    Basic,
    Unsupported,
}

/// Parse a `WWW-Authenticate` header value. Accepts quoted and unquoted
/// `key=value` parameters separated by commas, case-insensitive key match.
fn parse_www_authenticate(header: &str) -> AuthChallenge {
    let mut parts = header.splitn(2, char::is_whitespace);
    let scheme = parts.next().unwrap_or_default();
    let params_str = parts.next().unwrap_or_default();
    let params = parse_challenge_params(params_str);

    match scheme.to_ascii_lowercase().as_str() {
        "bearer" => AuthChallenge::Bearer {
            realm: params.get("realm").cloned().unwrap_or_default(),
            service: params.get("service").cloned(),
            scope: params.get("scope").cloned(),
        },
        "basic" => AuthChallenge::Basic,
        _ => AuthChallenge::Unsupported,
    }
}

fn parse_challenge_params(s: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in s.split(',') {
        let pair = pair.trim();
        let Some((key, value)) = pair.split_once('=') else { continue };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().trim_matches('"').to_string();
        params.insert(key, value);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_with_no_slash_defaults_to_docker_hub_library() {
        assert_eq!(
            split_host_and_repository("nginx:1.25.0"),
            ("docker.io".to_string(), "library/nginx".to_string())
        );
    }

    #[test]
    fn split_with_one_slash_and_dotted_host() {
        assert_eq!(
            split_host_and_repository("gcr.io/project:tag"),
            ("gcr.io".to_string(), "project".to_string())
        );
    }

    #[test]
    fn split_with_one_slash_user_repo_on_docker_hub() {
        assert_eq!(
            split_host_and_repository("library/nginx:1.25.0"),
            ("docker.io".to_string(), "library/nginx".to_string())
        );
    }

    #[test]
    fn split_with_multiple_slashes() {
        assert_eq!(
            split_host_and_repository("ghcr.io/org/repo/image:v2"),
            ("ghcr.io".to_string(), "org/repo/image".to_string())
        );
    }

    #[test]
    fn split_with_port_in_host() {
        assert_eq!(
            split_host_and_repository("localhost:5000/image:tag"),
            ("localhost:5000".to_string(), "image".to_string())
        );
    }

    #[test]
    fn parses_bearer_challenge_with_quoted_params() {
        let challenge = parse_www_authenticate(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/nginx:pull""#,
        );
        assert_eq!(
            challenge,
            AuthChallenge::Bearer {
                realm: "https://auth.docker.io/token".to_string(),
                service: Some("registry.docker.io".to_string()),
                scope: Some("repository:library/nginx:pull".to_string()),
            }
        );
    }

    #[test]
    fn parses_bearer_challenge_missing_scope() {
        let challenge = parse_www_authenticate(r#"Bearer realm="https://example.com/token",service="example""#);
        assert_eq!(
            challenge,
            AuthChallenge::Bearer {
                realm: "https://example.com/token".to_string(),
                service: Some("example".to_string()),
                scope: None,
            }
        );
    }

    #[test]
    fn parses_basic_and_unsupported_schemes() {
        assert_eq!(parse_www_authenticate("Basic realm=\"registry\""), AuthChallenge::Basic);
        assert_eq!(parse_www_authenticate("Digest realm=\"registry\""), AuthChallenge::Unsupported);
    }
}
