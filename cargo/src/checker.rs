use crate::cratesio::CratesIoClient;
use crate::lockfile::locked_version;
use crate::manifest::{CARGO_LOCK, CARGO_TOML, relaxed_manifest};
use crate::requirement::updated_requirement;
use crate::resolver::run_cargo_update;
use async_trait::async_trait;
use bump_core::{
    Dependency, RequirementRecord, Result, StrategyContext, UpdateChecker, UpdateError, UpdateTarget, Version,
};
use tokio::sync::OnceCell;
use tracing::info;

#[derive(Debug)]
pub struct CargoUpdateChecker {
    context: StrategyContext,
    crates_io: CratesIoClient,
    latest: OnceCell<Option<Version>>,
    latest_resolvable: OnceCell<Option<Version>>,
}

impl CargoUpdateChecker {
    pub fn new(context: StrategyContext) -> Self {
        let crates_io = CratesIoClient::new(&context.config.registries.crates_io, &context.credentials);
        Self {
            context,
            crates_io,
            latest: OnceCell::new(),
            latest_resolvable: OnceCell::new(),
        }
    }

    async fn fetch_latest(&self) -> Result<Option<&Version>> {
        let latest = self
            .latest
            .get_or_try_init(|| async {
                let latest = self.crates_io.latest_version(&self.context.dependency.name).await?;
                info!(
                    dependency = %self.context.dependency.name,
                    latest = ?latest.as_ref().map(ToString::to_string),
                    "fetched latest crates.io version"
                );
                Ok::<_, UpdateError>(latest)
            })
            .await?;
        Ok(latest.as_ref())
    }

    /// Only registry crates with a manifest and lockfile to resolve against
    fn resolvable(&self) -> bool {
        let dependency = &self.context.dependency;
        self.context.file(CARGO_TOML).is_some()
            && self.context.file(CARGO_LOCK).is_some()
            && dependency.source().is_none_or(|source| !source.is_path() && source.git().is_none())
    }

    /// `-p` spec for the crate, pinned to the locked version so it stays
    /// unambiguous when several versions are locked
    fn package_spec(&self) -> String {
        let dependency = &self.context.dependency;
        match dependency.parsed_version() {
            Some(version) => format!("{}@{version}", dependency.name),
            None => dependency.name.clone(),
        }
    }

    async fn fetch_latest_resolvable(&self) -> Result<Option<&Version>> {
        let resolvable = self
            .latest_resolvable
            .get_or_try_init(|| async {
                if !self.resolvable() {
                    return Ok(None);
                }
                let name = &self.context.dependency.name;
                let manifest = relaxed_manifest(&self.context.required_file(CARGO_TOML)?.content, name)?;
                let args = ["-p".to_string(), self.package_spec()];
                let lockfile = run_cargo_update(&self.context, &manifest, &args).await?;
                let resolved = locked_version(&lockfile, name)?;
                info!(
                    dependency = %name,
                    resolvable = ?resolved.as_ref().map(ToString::to_string),
                    "resolved with a relaxed requirement"
                );
                Ok::<_, UpdateError>(resolved)
            })
            .await?;
        Ok(resolvable.as_ref())
    }
}

#[async_trait]
impl UpdateChecker for CargoUpdateChecker {
    fn dependency(&self) -> &Dependency {
        &self.context.dependency
    }

    async fn latest_version(&self) -> Result<Option<UpdateTarget>> {
        Ok(self.fetch_latest().await?.cloned().map(UpdateTarget::Version))
    }

    async fn latest_resolvable_version(&self) -> Result<Option<UpdateTarget>> {
        Ok(self.fetch_latest_resolvable().await?.cloned().map(UpdateTarget::Version))
    }

    async fn updated_requirements(&self) -> Result<Vec<RequirementRecord>> {
        let requirements = &self.context.dependency.requirements;
        let Some(target) = self.fetch_latest_resolvable().await? else {
            return Ok(requirements.clone());
        };

        Ok(requirements
            .iter()
            .map(|record| match record.constraint().and_then(|old| updated_requirement(old, target)) {
                Some(requirement) => RequirementRecord {
                    requirement: Some(requirement),
                    ..record.clone()
                },
                None => record.clone(),
            })
            .collect())
    }
}
