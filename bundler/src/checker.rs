//! Latest and latest-resolvable versions of a gem, found by running
//! Bundler through the ruby helper.

use crate::errors::classify;
use crate::grammar::{LOCKFILE, is_gemspec};
use crate::prepare::{FilePreparer, helper_args, write_sandbox_files};
use async_trait::async_trait;
use bump_core::git::GitCommitChecker;
use bump_core::rewrite::{RequirementStyle, RequirementsUpdater};
use bump_core::sandbox::{SandboxSession, with_isolated_execution};
use bump_core::{
    Dependency, RequirementRecord, Result, StrategyContext, UpdateChecker, UpdateTarget, VersionResolution,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub const LATEST_VERSION_DETAILS: &str = "latest_version_details";
pub const LATEST_RESOLVABLE_VERSION_DETAILS: &str = "latest_resolvable_version_details";

type Details = Option<VersionResolution>;

#[derive(Debug)]
pub struct BundlerUpdateChecker {
    context: StrategyContext,
    latest_with_git: OnceCell<Details>,
    latest_without_git: OnceCell<Details>,
    resolvable_with_git: OnceCell<Details>,
    resolvable_without_git: OnceCell<Details>,
}

impl BundlerUpdateChecker {
    pub fn new(context: StrategyContext) -> Self {
        Self {
            context,
            latest_with_git: OnceCell::new(),
            latest_without_git: OnceCell::new(),
            resolvable_with_git: OnceCell::new(),
            resolvable_without_git: OnceCell::new(),
        }
    }

    fn git_checker(&self) -> GitCommitChecker<'_> {
        GitCommitChecker::new(
            &self.context.dependency,
            &self.context.credentials,
            self.context.config.helpers.git.clone(),
            self.context.config.sandbox.timeout(),
        )
    }

    async fn latest_version_details(&self, remove_git_source: bool) -> Result<Option<&VersionResolution>> {
        let cell = if remove_git_source {
            &self.latest_without_git
        } else {
            &self.latest_with_git
        };
        let details = cell
            .get_or_try_init(|| self.version_details(LATEST_VERSION_DETAILS, remove_git_source))
            .await?;
        Ok(details.as_ref())
    }

    async fn latest_resolvable_version_details(&self, remove_git_source: bool) -> Result<Option<&VersionResolution>> {
        let cell = if remove_git_source {
            &self.resolvable_without_git
        } else {
            &self.resolvable_with_git
        };
        let details = cell
            .get_or_try_init(|| self.version_details(LATEST_RESOLVABLE_VERSION_DETAILS, remove_git_source))
            .await?;
        Ok(details.as_ref())
    }

    /// One helper run against freshly prepared copies of the files
    async fn version_details(&self, function: &str, remove_git_source: bool) -> Result<Details> {
        let context = &self.context;
        let files = FilePreparer::new(&context.dependency, &context.dependency_files, remove_git_source)
            .prepared_dependency_files()?;

        let session = SandboxSession::create(&context.config.sandbox)?;
        debug!(dir = %session.path().display(), function, "created sandbox session");
        write_sandbox_files(&session, &files, &context.credentials).await?;

        let command = session.helper(&context.config.helpers.ruby)?;
        let args = helper_args(&context.dependency.name, &context.credentials);
        let result = with_isolated_execution::<Details>(command, function, &args).await;
        session.close()?;

        match result {
            Ok(details) => {
                info!(
                    dependency = %context.dependency.name,
                    function,
                    version = ?details.as_ref().map(|d| d.version.to_string()),
                    "resolved version details"
                );
                Ok(details)
            }
            Err(err) => Err(classify(err, &files, &context.credentials, &context.config).await),
        }
    }

    /// Path gems have no versions to choose between
    fn path_dependency(&self) -> bool {
        self.context
            .dependency
            .source()
            .is_some_and(bump_core::DependencySource::is_path)
    }

    /// Resolving against the manifest as written needs a lockfile
    fn resolvable(&self) -> bool {
        self.context.file(LOCKFILE).is_some() && !self.path_dependency()
    }

    /// A gem's own gemspec with nothing locked. Its ranges are widened to
    /// the latest release instead of resolved.
    fn unlocked_library(&self) -> bool {
        self.context.file(LOCKFILE).is_none()
            && !self.path_dependency()
            && self
                .context
                .dependency_files
                .iter()
                .any(|file| is_gemspec(&file.name) && !file.name.contains('/'))
    }

    async fn should_switch_source_from_git_to_rubygems(&self) -> Result<bool> {
        let git = self.git_checker();
        if !git.git_dependency() || !git.pinned() || !self.resolvable() {
            return Ok(false);
        }
        match self.latest_resolvable_version_details(false).await? {
            Some(details) => git.ref_in_release(&details.version).await,
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UpdateChecker for BundlerUpdateChecker {
    fn dependency(&self) -> &Dependency {
        &self.context.dependency
    }

    async fn latest_version(&self) -> Result<Option<UpdateTarget>> {
        let git = self.git_checker();
        if !git.git_dependency() {
            let details = self.latest_version_details(false).await?;
            return Ok(details.map(|d| UpdateTarget::Version(d.version.clone())));
        }

        if let Some(release) = self.latest_version_details(true).await?
            && git.ref_in_release(&release.version).await?
        {
            return Ok(Some(UpdateTarget::Version(release.version.clone())));
        }

        if git.pinned() {
            return Ok(self.context.dependency.version.clone().map(UpdateTarget::Commit));
        }

        let details = self.latest_version_details(false).await?;
        Ok(details
            .and_then(|d| d.commit_sha.clone())
            .map(UpdateTarget::Commit))
    }

    async fn latest_resolvable_version(&self) -> Result<Option<UpdateTarget>> {
        if self.unlocked_library() {
            debug!(dependency = %self.context.dependency.name, "no lockfile, targeting latest release");
            return self.latest_version().await;
        }
        if !self.resolvable() {
            return Ok(None);
        }

        let git = self.git_checker();
        if !git.git_dependency() {
            let details = self.latest_resolvable_version_details(false).await?;
            return Ok(details.map(|d| UpdateTarget::Version(d.version.clone())));
        }

        if !git.pinned() {
            let details = self.latest_resolvable_version_details(false).await?;
            return Ok(details
                .and_then(|d| d.commit_sha.clone())
                .map(UpdateTarget::Commit));
        }

        if let Some(release) = self.latest_resolvable_version_details(true).await?
            && git.ref_in_release(&release.version).await?
        {
            return Ok(Some(UpdateTarget::Version(release.version.clone())));
        }
        Ok(self.context.dependency.version.clone().map(UpdateTarget::Commit))
    }

    async fn updated_requirements(&self) -> Result<Vec<RequirementRecord>> {
        let dependency = &self.context.dependency;
        let latest = self.latest_version_details(false).await?.map(|d| d.version.clone());
        let resolvable = if self.resolvable() {
            self.latest_resolvable_version_details(false)
                .await?
                .map(|d| d.version.clone())
        } else {
            None
        };
        let existing = dependency.parsed_version();

        let updater = RequirementsUpdater {
            requirements: &dependency.requirements,
            existing_version: existing.as_ref(),
            latest_version: latest.as_ref(),
            latest_resolvable_version: resolvable.as_ref(),
        };
        let mut updated =
            updater.updated_requirements(|record| RequirementStyle::for_record(record, is_gemspec(&record.file)));

        if self.should_switch_source_from_git_to_rubygems().await? {
            info!(dependency = %dependency.name, "pinned commit is released, switching to rubygems");
            for record in &mut updated {
                if record.source.as_ref().is_some_and(|s| s.git().is_some()) {
                    record.source = None;
                }
            }
        }
        Ok(updated)
    }
}
