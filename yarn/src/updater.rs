use crate::errors::classify;
use crate::manifest::{PACKAGE_JSON, YARN_LOCK, update_package_json};
use async_trait::async_trait;
use bump_core::credentials::scrub;
use bump_core::sandbox::{SandboxSession, run_helper_process};
use bump_core::strategy::changed_files;
use bump_core::{DependencyFile, FileUpdater, Result, StrategyContext, UpdateError};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

pub const UPDATE_FUNCTION: &str = "update";

/// What the javascript helper hands back from `update`
#[derive(Debug, Deserialize)]
struct UpdatedLockfiles {
    #[serde(rename = "yarn.lock")]
    yarn_lock: String,
}

#[derive(Debug)]
pub struct YarnFileUpdater {
    context: StrategyContext,
}

impl YarnFileUpdater {
    pub fn new(context: StrategyContext) -> Result<Self> {
        for name in [PACKAGE_JSON, YARN_LOCK] {
            context.required_file(name)?;
        }
        Ok(Self { context })
    }

    fn updated_package_json(&self, package_json: &DependencyFile) -> Result<String> {
        let dependency = &self.context.dependency;
        let Some(record) = dependency.requirement_for(&package_json.name) else {
            return Ok(package_json.content.clone());
        };
        if record.is_unfixable() {
            return Err(UpdateError::UnfixableRequirement {
                dependency: dependency.name.clone(),
                file: package_json.name.clone(),
            });
        }
        let Some(new) = record.constraint() else {
            return Ok(package_json.content.clone());
        };

        let updated = update_package_json(&package_json.content, &dependency.name, |_| Some(new.to_string()))?;
        Ok(updated.unwrap_or_else(|| package_json.content.clone()))
    }

    async fn updated_yarn_lock(&self, package_json: &DependencyFile, yarn_lock: &DependencyFile) -> Result<String> {
        let context = &self.context;
        let Some(version) = context.dependency.version.as_deref() else {
            return Ok(yarn_lock.content.clone());
        };

        let session = SandboxSession::create(&context.config.sandbox)?;
        debug!(dir = %session.path().display(), "created sandbox session for yarn.lock update");
        session.write_files(&[package_json.clone(), yarn_lock.clone()]).await?;

        let command = session.helper(&context.config.helpers.javascript)?;
        let args = json!([session.path().to_string_lossy(), context.dependency.name, version]);
        let result = run_helper_process(command, UPDATE_FUNCTION, &args).await;
        session.close()?;

        let updated: UpdatedLockfiles = serde_json::from_value(result.map_err(|err| classify(err, &context.credentials))?)?;
        info!(dependency = %context.dependency.name, version, "regenerated yarn.lock");
        Ok(scrub(&updated.yarn_lock, &context.credentials))
    }
}

#[async_trait]
impl FileUpdater for YarnFileUpdater {
    async fn updated_dependency_files(&self) -> Result<Vec<DependencyFile>> {
        let package_json = self.context.required_file(PACKAGE_JSON)?;
        let yarn_lock = self.context.required_file(YARN_LOCK)?;

        let package_json = package_json.with_content(self.updated_package_json(package_json)?);
        let yarn_lock = yarn_lock.with_content(self.updated_yarn_lock(&package_json, yarn_lock).await?);

        Ok(changed_files(&self.context.dependency_files, vec![package_json, yarn_lock]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bump_core::{Config, Dependency, PackageManager};
    use std::sync::Arc;

    #[test]
    fn test_required_files() {
        let dependency = Dependency::new("etag", PackageManager::Yarn);
        let context = StrategyContext::new(
            dependency,
            vec![DependencyFile::new(PACKAGE_JSON, "{}")],
            Vec::new(),
            Arc::new(Config::default()),
        );
        assert!(matches!(
            YarnFileUpdater::new(context),
            Err(UpdateError::DependencyFileNotFound(ref name)) if name == YARN_LOCK
        ));
    }
}
