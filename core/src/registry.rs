use crate::credentials::{Credential, credential_for_host, sanitize_url, url_host};
use crate::error::{Result, UpdateError};
use crate::version::Version;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("bump/", env!("CARGO_PKG_VERSION"), " (https://github.com/folknor/bump)");

/// Thin JSON client shared by the package registries
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    credentials: Vec<Credential>,
}

impl RegistryClient {
    pub fn new(credentials: &[Credential]) -> Self {
        Self {
            client: reqwest::Client::builder()
                // crates.io and others refuse anonymous user agents
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            credentials: credentials.to_vec(),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET `url` and decode its JSON body.
    ///
    /// `Ok(None)` for 404. 401 and 403 become `PrivateSourceNotReachable`
    /// naming the host; other failures become `Registry` errors.
    pub async fn get_json<T>(&self, url: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.get_json_with(url, None).await
    }

    /// Like [`get_json`](Self::get_json) with an explicit bearer token
    pub async fn get_json_with<T>(&self, url: &str, bearer: Option<&str>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let host = url_host(url).unwrap_or_else(|| sanitize_url(url));
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        } else if let Some(credential) = credential_for_host(&self.credentials, &host) {
            request = request.basic_auth(
                credential.username.as_deref().unwrap_or_default(),
                Some(&credential.password),
            );
        }

        debug!(url = %sanitize_url(url), "registry request");
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(UpdateError::private_source_not_reachable(&host));
        }
        if !status.is_success() {
            return Err(UpdateError::Registry {
                registry: host,
                status: status.as_u16(),
            });
        }

        Ok(Some(response.json().await?))
    }
}

/// Highest version, preferring stable releases when any exist
pub fn latest_stable_or_any(mut versions: Vec<Version>) -> Option<Version> {
    versions.sort();
    let stable = versions.iter().rev().find(|v| !v.is_prerelease()).cloned();
    stable.or_else(|| versions.pop())
}
