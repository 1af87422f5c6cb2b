use crate::dispatch::{file_updater, update_checker};
use bump_core::{
    Config, Credential, Dependency, DependencyFile, RequirementRecord, Result, StrategyContext, UpdateError,
    UpdateTarget,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What updating one dependency produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Already at the newest resolvable version
    UpToDate,
    /// The dependency in its new state, and the files whose content changed
    Updated {
        dependency: Dependency,
        files: Vec<DependencyFile>,
    },
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

/// Resolves a dependency's target version, then rewrites its files.
///
/// Each call builds fresh strategies, so sandbox sessions and lookups are
/// never shared between dependencies.
#[derive(Debug, Clone)]
pub struct UpdatePipeline {
    config: Arc<Config>,
}

impl UpdatePipeline {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn update(
        &self,
        dependency: Dependency,
        files: Vec<DependencyFile>,
        credentials: Vec<Credential>,
    ) -> Result<UpdateOutcome> {
        let context = StrategyContext::new(dependency, files, credentials, Arc::clone(&self.config));
        let checker = update_checker(context.clone());
        let name = context.dependency.name.clone();

        if !checker.can_update().await? {
            info!(dependency = %name, "already up to date");
            return Ok(UpdateOutcome::UpToDate);
        }
        let Some(target) = checker.latest_resolvable_version().await? else {
            return Ok(UpdateOutcome::UpToDate);
        };
        let requirements = checker.updated_requirements().await?;
        check_fixable(&name, &requirements)?;

        let StrategyContext {
            dependency,
            dependency_files,
            credentials,
            config,
        } = context;
        let updated = updated_dependency(dependency, &target, requirements);
        info!(
            dependency = %name,
            from = ?updated.previous_version,
            to = %target,
            "updating dependency files"
        );

        let context = StrategyContext::new(updated.clone(), dependency_files, credentials, config);
        let files = file_updater(context)?.updated_dependency_files().await?;
        if files.is_empty() {
            warn!(dependency = %name, "update changed no files");
            return Ok(UpdateOutcome::UpToDate);
        }
        debug!(
            dependency = %name,
            files = ?files.iter().map(|file| file.name.as_str()).collect::<Vec<_>>(),
            "dependency files updated"
        );
        Ok(UpdateOutcome::Updated {
            dependency: updated,
            files,
        })
    }

    /// Update independent dependencies concurrently against the same files.
    /// Results come back in input order, one per dependency.
    pub async fn update_all(
        &self,
        dependencies: Vec<Dependency>,
        files: &[DependencyFile],
        credentials: &[Credential],
    ) -> Vec<(String, Result<UpdateOutcome>)> {
        let updates: Vec<_> = dependencies
            .into_iter()
            .map(|dependency| async move {
                let name = dependency.name.clone();
                let result = self.update(dependency, files.to_vec(), credentials.to_vec()).await;
                if let Err(err) = &result {
                    warn!(dependency = %name, error = %err, "update failed");
                }
                (name, result)
            })
            .collect();

        futures::future::join_all(updates).await
    }
}

fn check_fixable(name: &str, requirements: &[RequirementRecord]) -> Result<()> {
    match requirements.iter().find(|record| record.is_unfixable()) {
        Some(record) => Err(UpdateError::UnfixableRequirement {
            dependency: name.to_string(),
            file: record.file.clone(),
        }),
        None => Ok(()),
    }
}

/// The dependency moved to `target`, remembering where it came from
fn updated_dependency(
    dependency: Dependency,
    target: &UpdateTarget,
    requirements: Vec<RequirementRecord>,
) -> Dependency {
    Dependency {
        version: Some(target.to_string()),
        previous_version: dependency.version,
        previous_requirements: dependency.requirements,
        requirements,
        ..dependency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bump_core::{PackageManager, Version};

    fn dependency() -> Dependency {
        Dependency::new("luigi", PackageManager::Pip)
            .with_version("2.0.0")
            .with_requirement(RequirementRecord::new("requirements.txt", Some("==2.0.0")))
    }

    #[test]
    fn test_updated_dependency_keeps_previous_state() {
        let requirements = vec![RequirementRecord::new("requirements.txt", Some("==2.6.0"))];
        let target = UpdateTarget::Version(Version::new(2, 6, 0));
        let updated = updated_dependency(dependency(), &target, requirements.clone());

        assert_eq!(updated.name, "luigi");
        assert_eq!(updated.version.as_deref(), Some("2.6.0"));
        assert_eq!(updated.previous_version.as_deref(), Some("2.0.0"));
        assert_eq!(updated.requirements, requirements);
        assert_eq!(updated.previous_requirements, dependency().requirements);
    }

    #[test]
    fn test_unfixable_record_is_reported() {
        let mut unfixable = RequirementRecord::new("setup.py", None);
        unfixable.requirement = Some(bump_core::Requirement::Unfixable);
        let requirements = vec![RequirementRecord::new("requirements.txt", Some("==2.6.0")), unfixable];

        match check_fixable("luigi", &requirements) {
            Err(UpdateError::UnfixableRequirement { dependency, file }) => {
                assert_eq!(dependency, "luigi");
                assert_eq!(file, "setup.py");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check_fixable("luigi", &requirements[..1]).is_ok());
    }
}
