use bump_core::credentials::{credential_for_host, sanitize_url, url_host};
use bump_core::registry::RegistryClient;
use bump_core::{Credential, Result, UpdateError};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;
use url::Url;

const MANIFEST_TYPES: &str = "application/vnd.docker.distribution.manifest.v2+json, \
    application/vnd.docker.distribution.manifest.list.v2+json, \
    application/vnd.oci.image.index.v1+json, \
    application/vnd.oci.image.manifest.v1+json";

const DIGEST_HEADER: &str = "docker-content-digest";

const HUB_SERVICE: &str = "registry.docker.io";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Docker registry v2 client.
///
/// Docker Hub is reached with an anonymous pull token from its auth
/// service. Other registries are addressed over https by host and get
/// basic auth when a credential for the host is configured.
#[derive(Debug, Clone)]
pub struct DockerRegistryClient {
    client: RegistryClient,
    hub: String,
    auth: String,
    credentials: Vec<Credential>,
}

impl DockerRegistryClient {
    pub fn new(hub: &str, auth: &str, credentials: &[Credential]) -> Self {
        Self {
            client: RegistryClient::new(credentials),
            hub: hub.trim_end_matches('/').to_string(),
            auth: auth.trim_end_matches('/').to_string(),
            credentials: credentials.to_vec(),
        }
    }

    /// Repository path: official Docker Hub images live under `library/`
    pub fn repository(image: &str, registry: Option<&str>) -> String {
        if registry.is_none() && !image.contains('/') {
            format!("library/{image}")
        } else {
            image.to_string()
        }
    }

    fn base_url(&self, registry: Option<&str>) -> String {
        registry.map_or_else(|| self.hub.clone(), |host| format!("https://{host}"))
    }

    /// Anonymous pull token for a Docker Hub repository
    async fn token(&self, registry: Option<&str>, repository: &str) -> Result<Option<String>> {
        if registry.is_some() {
            return Ok(None);
        }
        let scope = format!("repository:{repository}:pull");
        let params = [("service", HUB_SERVICE), ("scope", scope.as_str())];
        let url = Url::parse_with_params(&format!("{}/token", self.auth), params)
            .map_err(|e| UpdateError::not_evaluatable(format!("invalid docker auth url: {e}")))?;

        let response: Option<TokenResponse> = self.client.get_json(url.as_str()).await?;
        Ok(response.and_then(|r| r.token.or(r.access_token)))
    }

    /// Every tag of `image`. Empty when the repository doesn't exist.
    pub async fn tags(&self, image: &str, registry: Option<&str>) -> Result<Vec<String>> {
        let repository = Self::repository(image, registry);
        let token = self.token(registry, &repository).await?;
        let url = format!("{}/v2/{repository}/tags/list", self.base_url(registry));
        debug!(repository = %repository, "listing image tags");

        let list: Option<TagList> = self.client.get_json_with(&url, token.as_deref()).await?;
        Ok(list.and_then(|l| l.tags).unwrap_or_default())
    }

    /// Content digest of the manifest `tag` points at
    pub async fn digest(&self, image: &str, registry: Option<&str>, tag: &str) -> Result<Option<String>> {
        let repository = Self::repository(image, registry);
        let token = self.token(registry, &repository).await?;
        let url = format!("{}/v2/{repository}/manifests/{tag}", self.base_url(registry));
        let host = url_host(&url).unwrap_or_else(|| sanitize_url(&url));
        debug!(repository = %repository, tag, "fetching manifest digest");

        let mut request = self.client.http().head(&url).header(ACCEPT, MANIFEST_TYPES);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        } else if let Some(credential) = credential_for_host(&self.credentials, &host) {
            request = request.basic_auth(
                credential.username.as_deref().unwrap_or_default(),
                Some(&credential.password),
            );
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpdateError::private_source_not_reachable(&host));
        }
        if !status.is_success() {
            return Err(UpdateError::Registry {
                registry: host,
                status: status.as_u16(),
            });
        }

        Ok(response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string))
    }
}
