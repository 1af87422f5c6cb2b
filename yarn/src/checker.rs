use crate::npm::NpmClient;
use crate::requirement::{is_registry_requirement, updated_requirement};
use async_trait::async_trait;
use bump_core::{
    Dependency, Requirement, RequirementRecord, Result, StrategyContext, UpdateChecker, UpdateTarget, Version,
};
use tokio::sync::OnceCell;
use tracing::info;

/// npm packages resolve to the registry's latest release: yarn installs
/// each requirement independently, so nothing else in the manifest can
/// hold a package back.
#[derive(Debug)]
pub struct YarnUpdateChecker {
    context: StrategyContext,
    npm: NpmClient,
    latest: OnceCell<Option<Version>>,
}

impl YarnUpdateChecker {
    pub fn new(context: StrategyContext) -> Self {
        let npm = NpmClient::new(&context.config.registries.npm, &context.credentials);
        Self {
            context,
            npm,
            latest: OnceCell::new(),
        }
    }

    async fn fetch_latest(&self) -> Result<Option<&Version>> {
        let latest = self
            .latest
            .get_or_try_init(|| async {
                let latest = self.npm.latest_version(&self.context.dependency.name).await?;
                info!(
                    dependency = %self.context.dependency.name,
                    latest = ?latest.as_ref().map(ToString::to_string),
                    "fetched latest npm version"
                );
                Ok::<_, bump_core::UpdateError>(latest)
            })
            .await?;
        Ok(latest.as_ref())
    }

    /// Dependencies declared through git, file or link specifiers aren't
    /// published versions
    fn registry_sourced(&self) -> bool {
        let dependency = &self.context.dependency;
        dependency.source().is_none_or(|source| !source.is_path() && source.git().is_none())
            && dependency
                .requirements
                .iter()
                .filter_map(RequirementRecord::constraint)
                .all(is_registry_requirement)
    }
}

#[async_trait]
impl UpdateChecker for YarnUpdateChecker {
    fn dependency(&self) -> &Dependency {
        &self.context.dependency
    }

    async fn latest_version(&self) -> Result<Option<UpdateTarget>> {
        Ok(self.fetch_latest().await?.cloned().map(UpdateTarget::Version))
    }

    async fn latest_resolvable_version(&self) -> Result<Option<UpdateTarget>> {
        if !self.registry_sourced() {
            return Ok(None);
        }
        self.latest_version().await
    }

    async fn updated_requirements(&self) -> Result<Vec<RequirementRecord>> {
        let requirements = &self.context.dependency.requirements;
        if !self.registry_sourced() {
            return Ok(requirements.clone());
        }
        let Some(latest) = self.fetch_latest().await? else {
            return Ok(requirements.clone());
        };

        Ok(requirements
            .iter()
            .map(|record| match record.constraint().and_then(|old| updated_requirement(old, latest)) {
                Some(new) => RequirementRecord {
                    requirement: Some(Requirement::Constraint(new)),
                    ..record.clone()
                },
                None => record.clone(),
            })
            .collect())
    }
}
