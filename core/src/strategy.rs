//! The two per-ecosystem capabilities every package manager provides.

use crate::config::Config;
use crate::credentials::Credential;
use crate::error::{Result, UpdateError};
use crate::types::{Dependency, DependencyFile, RequirementRecord, UpdateTarget};
use async_trait::async_trait;
use std::sync::Arc;

/// Everything a strategy is constructed from
#[derive(Debug, Clone)]
pub struct StrategyContext {
    pub dependency: Dependency,
    pub dependency_files: Vec<DependencyFile>,
    pub credentials: Vec<Credential>,
    pub config: Arc<Config>,
}

impl StrategyContext {
    pub fn new(
        dependency: Dependency,
        dependency_files: Vec<DependencyFile>,
        credentials: Vec<Credential>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            dependency,
            dependency_files,
            credentials,
            config,
        }
    }

    pub fn file(&self, name: &str) -> Option<&DependencyFile> {
        crate::types::find_file(&self.dependency_files, name)
    }

    /// A file the strategy can't work without
    pub fn required_file(&self, name: &str) -> Result<&DependencyFile> {
        self.file(name)
            .ok_or_else(|| UpdateError::DependencyFileNotFound(name.to_string()))
    }
}

/// Finds the version a dependency should move to and the requirement
/// text that admits it.
///
/// Implementations memoize their registry and resolver lookups, so each
/// method may be called repeatedly.
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    fn dependency(&self) -> &Dependency;

    /// Newest version published, ignoring the repository's other
    /// constraints
    async fn latest_version(&self) -> Result<Option<UpdateTarget>>;

    /// Newest version the whole dependency set resolves with
    async fn latest_resolvable_version(&self) -> Result<Option<UpdateTarget>>;

    /// Requirement records rewritten to admit the new version
    async fn updated_requirements(&self) -> Result<Vec<RequirementRecord>>;

    /// Whether moving to the latest resolvable version changes anything
    async fn can_update(&self) -> Result<bool> {
        let Some(target) = self.latest_resolvable_version().await? else {
            return Ok(false);
        };
        let dependency = self.dependency();
        match (&target, dependency.parsed_version()) {
            (UpdateTarget::Commit(sha), _) => Ok(dependency.version.as_deref() != Some(sha.as_str())),
            (UpdateTarget::Version(latest), Some(current)) => Ok(*latest > current),
            (UpdateTarget::Version(_), None) => {
                let updated = self.updated_requirements().await?;
                Ok(updated != dependency.requirements)
            }
        }
    }
}

/// Produces the new content of the files an updated dependency touches.
#[async_trait]
pub trait FileUpdater: Send + Sync {
    /// Only files whose content changed
    async fn updated_dependency_files(&self) -> Result<Vec<DependencyFile>>;
}

/// Keep the files of `updated` that differ from their original
pub fn changed_files(original: &[DependencyFile], updated: Vec<DependencyFile>) -> Vec<DependencyFile> {
    updated
        .into_iter()
        .filter(|file| crate::types::find_file(original, &file.name).is_none_or(|o| o.content != file.content))
        .collect()
}
