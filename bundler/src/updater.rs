//! New Gemfile, gemspec and Gemfile.lock content for an updated gem.

use crate::errors::classify;
use crate::grammar::{GEMFILE, LOCKFILE, RUBY_VERSION_FILE, grammar_for, is_gemspec, remove_git_source};
use crate::lockfile::{post_process_lockfile, sanitized_gemspec_content};
use crate::prepare::{helper_args, write_sandbox_files};
use async_trait::async_trait;
use bump_core::editor::{quote_character, quoted_requirement_list, update_declaration};
use bump_core::sandbox::{SandboxSession, with_isolated_execution};
use bump_core::strategy::changed_files;
use bump_core::types::find_file;
use bump_core::{Dependency, DependencyFile, FileUpdater, Result, StrategyContext, UpdateError};
use tracing::{debug, info};

pub const UPDATE_LOCKFILE: &str = "update_lockfile";

#[derive(Debug)]
pub struct BundlerFileUpdater {
    context: StrategyContext,
}

impl BundlerFileUpdater {
    pub fn new(context: StrategyContext) -> Result<Self> {
        check_required_files(&context.dependency_files)?;
        Ok(Self { context })
    }

    fn dependency(&self) -> &Dependency {
        &self.context.dependency
    }

    /// Manifest text with the dependency's declaration rewritten, or the
    /// original content when its requirement didn't change
    fn updated_manifest_content(&self, file: &DependencyFile) -> Result<String> {
        let dependency = self.dependency();
        let Some(record) = dependency.requirement_for(&file.name) else {
            return Ok(file.content.clone());
        };
        let previous = dependency.previous_requirement_for(&file.name);

        if record.is_unfixable() {
            return Err(UpdateError::UnfixableRequirement {
                dependency: dependency.name.clone(),
                file: file.name.clone(),
            });
        }

        let mut content = file.content.clone();
        if let Some(new) = record.constraint()
            && previous.and_then(|p| p.constraint()) != Some(new)
        {
            let grammar = grammar_for(&file.name)?;
            if let Some(updated) = update_declaration(&content, &dependency.name, grammar, |old| {
                Some(quoted_requirement_list(new, quote_character(old)))
            }) {
                content = updated;
            }
        }

        let had_git_source = previous.is_some_and(|p| p.source.as_ref().is_some_and(|s| s.git().is_some()));
        let has_git_source = record.source.as_ref().is_some_and(|s| s.git().is_some());
        if file.name == GEMFILE && had_git_source && !has_git_source {
            content = remove_git_source(&content, &dependency.name)?;
        }
        Ok(content)
    }

    /// Run the resolver on the updated manifest and return its lockfile
    async fn updated_lockfile_content(&self, gemfile: &DependencyFile, lockfile: &DependencyFile) -> Result<String> {
        let context = &self.context;
        let mut files = vec![gemfile.clone(), lockfile.clone()];
        if let Some(ruby_version) = context.file(RUBY_VERSION_FILE) {
            files.push(ruby_version.clone());
        }
        for file in context.dependency_files.iter().filter(|f| is_gemspec(&f.name)) {
            let updated = self.updated_manifest_content(file)?;
            files.push(file.with_content(sanitized_gemspec_content(
                &file.name,
                &updated,
                Some(&lockfile.content),
            )));
        }

        let session = SandboxSession::create(&context.config.sandbox)?;
        debug!(dir = %session.path().display(), "created sandbox session for lockfile update");
        write_sandbox_files(&session, &files, &context.credentials).await?;

        let command = session.helper(&context.config.helpers.ruby)?;
        let args = helper_args(&context.dependency.name, &context.credentials);
        let result = with_isolated_execution::<String>(command, UPDATE_LOCKFILE, &args).await;
        session.close()?;

        match result {
            Ok(regenerated) => {
                info!(dependency = %context.dependency.name, "regenerated lockfile");
                Ok(post_process_lockfile(&regenerated, &lockfile.content, &context.credentials))
            }
            Err(err) => Err(classify(err, &files, &context.credentials, &context.config).await),
        }
    }
}

#[async_trait]
impl FileUpdater for BundlerFileUpdater {
    async fn updated_dependency_files(&self) -> Result<Vec<DependencyFile>> {
        let files = &self.context.dependency_files;
        let mut updated = Vec::new();

        let gemfile = match find_file(files, GEMFILE) {
            Some(gemfile) => {
                let content = self.updated_manifest_content(gemfile)?;
                let gemfile = gemfile.with_content(content);
                updated.push(gemfile.clone());
                Some(gemfile)
            }
            None => None,
        };

        for gemspec in files.iter().filter(|f| is_gemspec(&f.name)) {
            updated.push(gemspec.with_content(self.updated_manifest_content(gemspec)?));
        }

        if let (Some(gemfile), Some(lockfile)) = (&gemfile, find_file(files, LOCKFILE)) {
            let content = self.updated_lockfile_content(gemfile, lockfile).await?;
            updated.push(lockfile.with_content(content));
        }

        Ok(changed_files(files, updated))
    }
}

/// A lockfile needs its Gemfile, and there has to be either a top-level
/// gemspec or a Gemfile and lockfile pair to update
fn check_required_files(files: &[DependencyFile]) -> Result<()> {
    let has = |name: &str| find_file(files, name).is_some();
    if has(LOCKFILE) && !has(GEMFILE) {
        return Err(UpdateError::DependencyFileNotFound(GEMFILE.to_string()));
    }
    let top_level_gemspec = files.iter().any(|f| is_gemspec(&f.name) && !f.name.contains('/'));
    if top_level_gemspec || (has(GEMFILE) && has(LOCKFILE)) {
        return Ok(());
    }
    let missing = if has(GEMFILE) { LOCKFILE } else { GEMFILE };
    Err(UpdateError::DependencyFileNotFound(missing.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bump_core::{Config, DependencySource, GitSource, PackageManager, RequirementRecord};
    use std::sync::Arc;

    const GEMFILE_CONTENT: &str = "source \"https://rubygems.org\"\n\ngem \"business\", \"~> 1.4.0\"\ngem 'i18n-business', '~> 1.4.0' # pinned\n";
    const GEMSPEC_CONTENT: &str = "Gem::Specification.new do |spec|\n  spec.add_dependency 'business', '~> 1.0'\n  spec.add_development_dependency \"rspec\", \"~> 3.0\"\nend\n";

    fn context(dependency: Dependency, files: Vec<DependencyFile>) -> StrategyContext {
        StrategyContext::new(dependency, files, Vec::new(), Arc::new(Config::default()))
    }

    fn updated(name: &str, file: &str, old: &str, new: &str) -> Dependency {
        let mut dependency = Dependency::new(name, PackageManager::Bundler)
            .with_version("1.5.0")
            .with_requirement(RequirementRecord::new(file, Some(new)));
        dependency.previous_version = Some("1.4.0".to_string());
        dependency.previous_requirements = vec![RequirementRecord::new(file, Some(old))];
        dependency
    }

    #[test]
    fn test_required_files() {
        let gemfile = DependencyFile::new(GEMFILE, GEMFILE_CONTENT);
        let lockfile = DependencyFile::new(LOCKFILE, "");
        let gemspec = DependencyFile::new("business.gemspec", GEMSPEC_CONTENT);

        assert!(check_required_files(&[gemfile.clone(), lockfile.clone()]).is_ok());
        assert!(check_required_files(std::slice::from_ref(&gemspec)).is_ok());
        assert!(matches!(
            check_required_files(std::slice::from_ref(&lockfile)),
            Err(UpdateError::DependencyFileNotFound(ref name)) if name == GEMFILE
        ));
        assert!(matches!(
            check_required_files(std::slice::from_ref(&gemfile)),
            Err(UpdateError::DependencyFileNotFound(ref name)) if name == LOCKFILE
        ));
        assert!(check_required_files(&[DependencyFile::new("vendor/x.gemspec", "")]).is_err());
    }

    #[test]
    fn test_gemfile_edit_leaves_other_gems_alone() {
        let gemfile = DependencyFile::new(GEMFILE, GEMFILE_CONTENT);
        let dependency = updated("business", GEMFILE, "~> 1.4.0", "~> 1.5.0");
        let updater = BundlerFileUpdater::new(context(dependency, vec![gemfile.clone(), DependencyFile::new(LOCKFILE, "")]))
            .unwrap();

        let content = updater.updated_manifest_content(&gemfile).unwrap();
        assert_eq!(
            content,
            "source \"https://rubygems.org\"\n\ngem \"business\", \"~> 1.5.0\"\ngem 'i18n-business', '~> 1.4.0' # pinned\n"
        );
    }

    #[test]
    fn test_conditional_redeclaration_is_kept() {
        let original = "gem \"business\", \"~> 1.4.0\"\n\nif ENV['LEGACY']\n  gem \"business\", \"~> 1.3.0\"\nend\n";
        let gemfile = DependencyFile::new(GEMFILE, original);
        let dependency = updated("business", GEMFILE, "~> 1.4.0", "~> 1.5.0");
        let updater = BundlerFileUpdater::new(context(dependency, vec![gemfile.clone(), DependencyFile::new(LOCKFILE, "")]))
            .unwrap();

        let content = updater.updated_manifest_content(&gemfile).unwrap();
        assert_eq!(content, original.replace("~> 1.4.0", "~> 1.5.0"));
        assert!(content.contains("  gem \"business\", \"~> 1.3.0\"\nend\n"));
    }

    #[test]
    fn test_gemspec_range_keeps_quotes() {
        let gemspec = DependencyFile::new("business.gemspec", GEMSPEC_CONTENT);
        let dependency = updated("business", "business.gemspec", "~> 1.0", ">= 1.0, < 3.0");
        let updater = BundlerFileUpdater::new(context(dependency, vec![gemspec.clone()])).unwrap();

        let content = updater.updated_manifest_content(&gemspec).unwrap();
        assert!(content.contains("spec.add_dependency 'business', '>= 1.0', '< 3.0'\n"));
        assert!(content.contains("\"rspec\", \"~> 3.0\""));
    }

    #[test]
    fn test_unchanged_requirement_is_left_alone() {
        let gemfile = DependencyFile::new(GEMFILE, GEMFILE_CONTENT);
        let dependency = updated("business", GEMFILE, "~> 1.4.0", "~> 1.4.0");
        let updater = BundlerFileUpdater::new(context(dependency, vec![gemfile.clone(), DependencyFile::new(LOCKFILE, "")]))
            .unwrap();
        assert_eq!(updater.updated_manifest_content(&gemfile).unwrap(), GEMFILE_CONTENT);
    }

    #[test]
    fn test_unfixable_requirement_is_an_error() {
        let gemfile = DependencyFile::new(GEMFILE, GEMFILE_CONTENT);
        let mut dependency = updated("business", GEMFILE, "~> 1.4.0", "~> 1.4.0");
        dependency.requirements[0].requirement = Some(bump_core::Requirement::Unfixable);
        let updater = BundlerFileUpdater::new(context(dependency, vec![gemfile.clone(), DependencyFile::new(LOCKFILE, "")]))
            .unwrap();
        assert!(matches!(
            updater.updated_manifest_content(&gemfile),
            Err(UpdateError::UnfixableRequirement { .. })
        ));
    }

    #[test]
    fn test_git_source_dropped_when_switched_to_rubygems() {
        let content = "gem \"business\", \"~> 1.4.0\", git: \"https://github.com/gocardless/business\", tag: \"v1.4.0\"\n";
        let gemfile = DependencyFile::new(GEMFILE, content);
        let git = DependencySource::Git(GitSource {
            url: "https://github.com/gocardless/business".to_string(),
            branch: None,
            reference: Some("v1.4.0".to_string()),
        });
        let mut dependency = updated("business", GEMFILE, "~> 1.4.0", "~> 1.4.0");
        dependency.previous_requirements[0].source = Some(git);
        let updater = BundlerFileUpdater::new(context(dependency, vec![gemfile.clone(), DependencyFile::new(LOCKFILE, "")]))
            .unwrap();
        assert_eq!(
            updater.updated_manifest_content(&gemfile).unwrap(),
            "gem \"business\", \"~> 1.4.0\"\n"
        );
    }
}
