//! A canned [`RegistryClient`] for this crate's own tests and for
//! integration tests, mirroring [`crate::engine::mock::MockEngineClient`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CredentialsLookup, RegistryClient};

#[derive(Default)]
pub struct MockRegistryClient {
    tags_by_image: Mutex<HashMap<String, Vec<String>>>,
}

impl MockRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(self, image_reference: &str, tags: Vec<&str>) -> Self {
        self.tags_by_image
            .lock()
            .unwrap()
            .insert(image_reference.to_string(), tags.into_iter().map(String::from).collect());
        self
    }
}

#[async_trait]
impl RegistryClient for MockRegistryClient {
    async fn tags(&self, image_reference: &str, _credentials: CredentialsLookup<'_>) -> Vec<String> {
        self.tags_by_image.lock().unwrap().get(image_reference).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_configured_tags_and_empty_for_unknown_image() {
        let anon = |_: &str| crate::model::RegistryCredentials::anonymous("unused");
        let registry = MockRegistryClient::new().with_tags("nginx:1.25.0", vec!["1.25.0", "1.26.0"]);

        assert_eq!(registry.tags("nginx:1.25.0", &anon).await, vec!["1.25.0".to_string(), "1.26.0".to_string()]);
        assert!(registry.tags("redis:7", &anon).await.is_empty());
    }
}
