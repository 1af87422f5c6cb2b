use crate::registry::DockerRegistryClient;
use crate::tag::{VersionTag, latest_matching};
use async_trait::async_trait;
use bump_core::{
    Dependency, DependencySource, ImageSource, RequirementRecord, Result, StrategyContext, UpdateChecker, UpdateError,
    UpdateTarget,
};
use tokio::sync::OnceCell;
use tracing::info;

/// Finds the newest tag shaped like the one in use and, for digest pins,
/// the digest that tag currently points at
#[derive(Debug)]
pub struct DockerUpdateChecker {
    context: StrategyContext,
    registry: DockerRegistryClient,
    latest_tag: OnceCell<Option<VersionTag>>,
    latest_digest: OnceCell<Option<String>>,
}

impl DockerUpdateChecker {
    pub fn new(context: StrategyContext) -> Self {
        let registries = &context.config.registries;
        let registry = DockerRegistryClient::new(&registries.docker_hub, &registries.docker_auth, &context.credentials);
        Self {
            context,
            registry,
            latest_tag: OnceCell::new(),
            latest_digest: OnceCell::new(),
        }
    }

    fn image_source(&self) -> ImageSource {
        self.context
            .dependency
            .source()
            .and_then(DependencySource::image)
            .cloned()
            .unwrap_or_default()
    }

    /// Tag in use: the declared one, else the version the dependency was
    /// parsed at
    fn current_tag(&self) -> Option<String> {
        self.image_source()
            .tag
            .or_else(|| self.context.dependency.version.clone())
    }

    async fn fetch_latest_tag(&self) -> Result<Option<&VersionTag>> {
        let latest = self
            .latest_tag
            .get_or_try_init(|| async {
                let Some(current) = self.current_tag() else {
                    return Ok(None);
                };
                let source = self.image_source();
                let tags = self
                    .registry
                    .tags(&self.context.dependency.name, source.registry.as_deref())
                    .await?;
                let latest = latest_matching(&current, tags.iter().map(String::as_str));
                info!(
                    dependency = %self.context.dependency.name,
                    current = %current,
                    latest = ?latest.as_ref().map(|tag| tag.tag.as_str()),
                    "selected latest image tag"
                );
                Ok::<_, UpdateError>(latest)
            })
            .await?;
        Ok(latest.as_ref())
    }

    /// Digest of the tag being moved to, for images pinned by digest
    async fn fetch_latest_digest(&self) -> Result<Option<&str>> {
        let digest = self
            .latest_digest
            .get_or_try_init(|| async {
                let source = self.image_source();
                if source.digest.is_none() {
                    return Ok(None);
                }
                let tag = match self.fetch_latest_tag().await? {
                    Some(latest) => Some(latest.tag.clone()),
                    None => self.current_tag(),
                };
                let Some(tag) = tag else {
                    return Ok(None);
                };
                self.registry
                    .digest(&self.context.dependency.name, source.registry.as_deref(), &tag)
                    .await
            })
            .await?;
        Ok(digest.as_deref())
    }
}

#[async_trait]
impl UpdateChecker for DockerUpdateChecker {
    fn dependency(&self) -> &Dependency {
        &self.context.dependency
    }

    async fn latest_version(&self) -> Result<Option<UpdateTarget>> {
        Ok(self
            .fetch_latest_tag()
            .await?
            .map(|tag| UpdateTarget::Version(tag.version.clone())))
    }

    /// Images have no dependency graph to resolve
    async fn latest_resolvable_version(&self) -> Result<Option<UpdateTarget>> {
        self.latest_version().await
    }

    async fn updated_requirements(&self) -> Result<Vec<RequirementRecord>> {
        let latest_tag = self.fetch_latest_tag().await?.map(|tag| tag.tag.clone());
        let latest_digest = self.fetch_latest_digest().await?.map(ToString::to_string);

        Ok(self
            .context
            .dependency
            .requirements
            .iter()
            .map(|record| {
                let Some(image) = record.source.as_ref().and_then(DependencySource::image) else {
                    return record.clone();
                };
                let updated = ImageSource {
                    registry: image.registry.clone(),
                    tag: image.tag.as_ref().and(latest_tag.clone()).or_else(|| image.tag.clone()),
                    digest: image.digest.as_ref().and(latest_digest.clone()).or_else(|| image.digest.clone()),
                };
                RequirementRecord {
                    source: Some(DependencySource::Image(updated)),
                    ..record.clone()
                }
            })
            .collect())
    }

    /// A newer tag, or the same tag rebuilt under a new digest
    async fn can_update(&self) -> Result<bool> {
        let current = self.current_tag().as_deref().and_then(VersionTag::parse);
        let newer_tag = match (self.fetch_latest_tag().await?, current) {
            (Some(latest), Some(current)) => latest.version > current.version,
            _ => false,
        };
        let new_digest = match (self.fetch_latest_digest().await?, self.image_source().digest) {
            (Some(latest), Some(current)) => latest != current,
            _ => false,
        };
        Ok(newer_tag || new_digest)
    }
}
