use bump_core::registry::{RegistryClient, latest_stable_or_any};
use bump_core::{Credential, Result, Version};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct NpmPackageResponse {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub versions: HashMap<String, serde_json::Value>,
}

impl NpmPackageResponse {
    /// The `latest` dist-tag, unless it points at a pre-release, in which
    /// case the highest stable release
    pub fn latest_version(&self) -> Option<Version> {
        let tagged = self
            .dist_tags
            .get("latest")
            .and_then(|v| Version::from_str(v).ok());
        match tagged {
            Some(latest) if !latest.is_prerelease() => Some(latest),
            tagged => {
                let versions: Vec<Version> = self
                    .versions
                    .keys()
                    .filter_map(|v| Version::from_str(v).ok())
                    .collect();
                latest_stable_or_any(versions).or(tagged)
            }
        }
    }
}

/// Client for an npm-compatible registry
#[derive(Debug, Clone)]
pub struct NpmClient {
    client: RegistryClient,
    registry: String,
}

impl NpmClient {
    pub fn new(registry: &str, credentials: &[Credential]) -> Self {
        Self {
            client: RegistryClient::new(credentials),
            registry: registry.trim_end_matches('/').to_string(),
        }
    }

    /// Registry document URL. Scoped names keep their `@` but escape the
    /// slash: `@scope%2Fname`.
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.registry, name.replace('/', "%2F"))
    }

    /// Get package info from the registry, `None` if it isn't published
    pub async fn get_package(&self, name: &str) -> Result<Option<NpmPackageResponse>> {
        let url = self.package_url(name);
        debug!(package = name, "fetching npm package document");
        self.client.get_json(&url).await
    }

    pub async fn latest_version(&self, name: &str) -> Result<Option<Version>> {
        Ok(self
            .get_package(name)
            .await?
            .and_then(|package| package.latest_version()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn document(latest: &str, versions: &[&str]) -> serde_json::Value {
        let versions: serde_json::Map<String, serde_json::Value> =
            versions.iter().map(|v| ((*v).to_string(), json!({}))).collect();
        json!({
            "name": "etag",
            "dist-tags": { "latest": latest },
            "versions": versions,
        })
    }

    #[test]
    fn test_latest_prefers_tag() {
        let package: NpmPackageResponse =
            serde_json::from_value(document("1.6.0", &["1.0.0", "1.6.0", "1.7.0"])).unwrap();
        assert_eq!(package.latest_version(), Some(Version::new(1, 6, 0)));
    }

    #[test]
    fn test_prerelease_tag_falls_back_to_stable() {
        let package: NpmPackageResponse =
            serde_json::from_value(document("1.8.0-beta.1", &["1.0.0", "1.7.0", "1.8.0-beta.1"])).unwrap();
        assert_eq!(package.latest_version(), Some(Version::new(1, 7, 0)));
    }

    #[tokio::test]
    async fn test_scoped_package_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/@blep%2Fblep"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document("1.7.0", &["1.0.0", "1.7.0"])))
            .mount(&server)
            .await;

        let client = NpmClient::new(&server.uri(), &[]);
        assert_eq!(client.package_url("@blep/blep"), format!("{}/@blep%2Fblep", server.uri()));
        assert_eq!(client.latest_version("@blep/blep").await.unwrap(), Some(Version::new(1, 7, 0)));
        assert!(client.latest_version("missing").await.unwrap().is_none());
    }
}
