use crate::manifest::{CARGO_LOCK, CARGO_TOML, update_manifest};
use crate::resolver::run_cargo_update;
use async_trait::async_trait;
use bump_core::strategy::changed_files;
use bump_core::{DependencyFile, FileUpdater, RequirementRecord, Result, StrategyContext, UpdateError};
use tracing::debug;

/// Rewrites Cargo.toml requirements in place, then moves the crate to its
/// new version in Cargo.lock with `cargo update --precise`
#[derive(Debug)]
pub struct CargoFileUpdater {
    context: StrategyContext,
}

impl CargoFileUpdater {
    pub fn new(context: StrategyContext) -> Result<Self> {
        context.required_file(CARGO_TOML)?;
        Ok(Self { context })
    }

    fn updated_manifest(&self, manifest: &DependencyFile) -> Result<String> {
        let dependency = &self.context.dependency;
        let Some(record) = dependency.requirement_for(&manifest.name) else {
            return Ok(manifest.content.clone());
        };
        if record.is_unfixable() {
            return Err(UpdateError::UnfixableRequirement {
                dependency: dependency.name.clone(),
                file: manifest.name.clone(),
            });
        }
        let Some(new) = record.constraint() else {
            return Ok(manifest.content.clone());
        };
        let previous = dependency
            .previous_requirement_for(&manifest.name)
            .and_then(RequirementRecord::constraint);
        if previous == Some(new) {
            return Ok(manifest.content.clone());
        }

        let updated = update_manifest(&manifest.content, &dependency.name, |old| {
            previous.is_none_or(|previous| previous == old).then(|| new.to_string())
        })?;
        Ok(updated.unwrap_or_else(|| manifest.content.clone()))
    }

    async fn updated_lockfile(&self, manifest: &DependencyFile, lockfile: &DependencyFile) -> Result<String> {
        let dependency = &self.context.dependency;
        let Some(version) = dependency.version.as_deref() else {
            return Ok(lockfile.content.clone());
        };
        let spec = match dependency.previous_version.as_deref() {
            Some(previous) => format!("{}@{previous}", dependency.name),
            None => dependency.name.clone(),
        };
        debug!(spec = %spec, version, "updating Cargo.lock");
        let args = ["-p".to_string(), spec, "--precise".to_string(), version.to_string()];
        run_cargo_update(&self.context, &manifest.content, &args).await
    }
}

#[async_trait]
impl FileUpdater for CargoFileUpdater {
    async fn updated_dependency_files(&self) -> Result<Vec<DependencyFile>> {
        let manifest = self.context.required_file(CARGO_TOML)?;
        let manifest = manifest.with_content(self.updated_manifest(manifest)?);

        let mut updated = vec![manifest];
        if let Some(lockfile) = self.context.file(CARGO_LOCK) {
            let content = self.updated_lockfile(&updated[0], lockfile).await?;
            updated.push(lockfile.with_content(content));
        }
        Ok(changed_files(&self.context.dependency_files, updated))
    }
}
