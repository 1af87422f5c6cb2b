use bump_core::registry::{RegistryClient, latest_stable_or_any};
use bump_core::{Credential, Result, Version};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

/// PyPI JSON API response structure
#[derive(Debug, Deserialize)]
pub struct PyPiResponse {
    pub info: PyPiInfo,
    #[serde(default)]
    pub releases: HashMap<String, Vec<PyPiRelease>>,
}

#[derive(Debug, Deserialize)]
pub struct PyPiInfo {
    pub name: String,
}

/// One uploaded distribution of a release
#[derive(Debug, Deserialize)]
pub struct PyPiRelease {
    #[serde(default)]
    pub yanked: Option<bool>,
}

impl PyPiResponse {
    /// Versions with at least one distribution that hasn't been yanked
    pub fn available_versions(&self) -> Vec<Version> {
        self.releases
            .iter()
            .filter(|(_, files)| !files.is_empty() && !files.iter().all(|r| r.yanked.unwrap_or(false)))
            .filter_map(|(version, _)| Version::from_str(version).ok())
            .collect()
    }

    pub fn latest_version(&self) -> Option<Version> {
        latest_stable_or_any(self.available_versions())
    }
}

/// Client for querying PyPI API
#[derive(Debug, Clone)]
pub struct PyPiClient {
    client: RegistryClient,
    base_url: String,
}

impl PyPiClient {
    /// `index` is the PyPI root, e.g. `https://pypi.org`
    pub fn new(index: &str, credentials: &[Credential]) -> Self {
        Self {
            client: RegistryClient::new(credentials),
            base_url: format!("{}/pypi", index.trim_end_matches('/')),
        }
    }

    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{name}/json", self.base_url)
    }

    /// Fetch package info from PyPI, `None` if the project doesn't exist
    pub async fn get_package(&self, name: &str) -> Result<Option<PyPiResponse>> {
        debug!(package = name, "fetching PyPI project document");
        self.client.get_json(&self.package_url(name)).await
    }

    pub async fn latest_version(&self, name: &str) -> Result<Option<Version>> {
        Ok(self
            .get_package(name)
            .await?
            .and_then(|package| package.latest_version()))
    }
}
