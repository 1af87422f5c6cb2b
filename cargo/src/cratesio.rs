use bump_core::registry::{RegistryClient, latest_stable_or_any};
use bump_core::{Credential, Result, Version};
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

/// crates.io API response for a single crate
#[derive(Debug, Deserialize)]
pub struct CrateResponse {
    #[serde(rename = "crate")]
    pub crate_info: CrateInfo,
    #[serde(default)]
    pub versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize)]
pub struct CrateInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CrateVersion {
    pub num: String,
    #[serde(default)]
    pub yanked: bool,
}

impl CrateResponse {
    pub fn available_versions(&self) -> Vec<Version> {
        self.versions
            .iter()
            .filter(|version| !version.yanked)
            .filter_map(|version| Version::from_str(&version.num).ok())
            .collect()
    }

    pub fn latest_version(&self) -> Option<Version> {
        latest_stable_or_any(self.available_versions())
    }
}

/// Client for querying crates.io API
#[derive(Debug, Clone)]
pub struct CratesIoClient {
    client: RegistryClient,
    base_url: String,
}

impl CratesIoClient {
    pub fn new(registry: &str, credentials: &[Credential]) -> Self {
        Self {
            client: RegistryClient::new(credentials),
            base_url: format!("{}/api/v1/crates", registry.trim_end_matches('/')),
        }
    }

    /// Fetch crate info, `None` if it isn't published
    pub async fn get_crate(&self, name: &str) -> Result<Option<CrateResponse>> {
        debug!(krate = name, "fetching crates.io document");
        self.client.get_json(&format!("{}/{name}", self.base_url)).await
    }

    pub async fn latest_version(&self, name: &str) -> Result<Option<Version>> {
        Ok(self.get_crate(name).await?.and_then(|krate| krate.latest_version()))
    }
}
