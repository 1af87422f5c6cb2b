use crate::grammar::{GEMFILE, LOCKFILE, grammar_for, is_gemspec, remove_git_source};
use crate::lockfile::{replace_ssh_links_with_https, sanitized_gemspec_content};
use bump_core::credentials::Credential;
use bump_core::editor::{quote_character, quoted_requirement_list, update_declarations};
use bump_core::sandbox::SandboxSession;
use bump_core::types::find_file;
use bump_core::{Dependency, DependencyFile, Result};
use serde_json::{Value, json};

/// Requirement the target is loosened to before resolving
pub const UNLOCKED_REQUIREMENT: &str = ">= 0";

/// Copies of the dependency files with the target's own constraint
/// loosened, so the resolver is free to pick any version of it.
#[derive(Debug)]
pub struct FilePreparer<'a> {
    dependency: &'a Dependency,
    files: &'a [DependencyFile],
    remove_git_source: bool,
}

impl<'a> FilePreparer<'a> {
    pub fn new(dependency: &'a Dependency, files: &'a [DependencyFile], remove_git_source: bool) -> Self {
        Self {
            dependency,
            files,
            remove_git_source,
        }
    }

    pub fn prepared_dependency_files(&self) -> Result<Vec<DependencyFile>> {
        let lockfile = find_file(self.files, LOCKFILE).map(|file| file.content.as_str());
        self.files
            .iter()
            .map(|file| {
                if file.name == GEMFILE {
                    Ok(file.with_content(self.prepared_gemfile(&file.content)?))
                } else if is_gemspec(&file.name) {
                    let loosened = self.unlocked_requirement(&file.name, &file.content)?;
                    Ok(file.with_content(sanitized_gemspec_content(&file.name, &loosened, lockfile)))
                } else {
                    Ok(file.clone())
                }
            })
            .collect()
    }

    fn prepared_gemfile(&self, content: &str) -> Result<String> {
        let loosened = self.unlocked_requirement(GEMFILE, content)?;
        if self.remove_git_source {
            return remove_git_source(&loosened, &self.dependency.name);
        }
        Ok(loosened)
    }

    fn unlocked_requirement(&self, file_name: &str, content: &str) -> Result<String> {
        let grammar = grammar_for(file_name)?;
        Ok(
            update_declarations(content, &self.dependency.name, grammar, |old| {
                Some(quoted_requirement_list(UNLOCKED_REQUIREMENT, quote_character(old)))
            })
            .unwrap_or_else(|| content.to_string()),
        )
    }
}

/// Arguments every ruby helper function takes. Credentials only ever
/// travel on the helper's stdin.
pub fn helper_args(dependency_name: &str, credentials: &[Credential]) -> Value {
    let credentials: Vec<Value> = credentials
        .iter()
        .map(|credential| {
            json!({
                "host": credential.host,
                "username": credential.username,
                "password": credential.password,
            })
        })
        .collect();
    json!({
        "dependency_name": dependency_name,
        "gemfile_name": GEMFILE,
        "lockfile_name": LOCKFILE,
        "credentials": credentials,
    })
}

/// Write files into a sandbox the way the resolver expects to find them:
/// ssh GitHub remotes switched to token-bearing https
pub async fn write_sandbox_files(
    session: &SandboxSession,
    files: &[DependencyFile],
    credentials: &[Credential],
) -> Result<()> {
    for file in files {
        let content = if file.name == GEMFILE || file.name == LOCKFILE {
            replace_ssh_links_with_https(&file.content, credentials)
        } else {
            file.content.clone()
        };
        session.write_file(&file.name, &content).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bump_core::PackageManager;

    fn files() -> Vec<DependencyFile> {
        vec![
            DependencyFile::new(
                GEMFILE,
                "source 'https://rubygems.org'\n\ngem 'business', '~> 1.4.0', git: 'git@github.com:gocardless/business'\ngem 'statesman', '~> 1.2.0'\ngemspec\n",
            ),
            DependencyFile::new(LOCKFILE, "PATH\n  remote: .\n  specs:\n    example (0.9.3)\n"),
            DependencyFile::new(
                "example.gemspec",
                "require 'example/version'\nGem::Specification.new do |spec|\n  spec.version = Example::VERSION\n  spec.add_dependency \"business\", \"~> 1.0\"\nend\n",
            ),
            DependencyFile::new(".ruby-version", "2.4.1\n"),
        ]
    }

    #[test]
    fn test_loosens_target_only() {
        let dependency = Dependency::new("business", PackageManager::Bundler);
        let files = files();
        let prepared = FilePreparer::new(&dependency, &files, false)
            .prepared_dependency_files()
            .unwrap();

        let gemfile = find_file(&prepared, GEMFILE).unwrap();
        assert!(gemfile.content.contains("gem 'business', '>= 0', git: 'git@github.com:gocardless/business'"));
        assert!(gemfile.content.contains("gem 'statesman', '~> 1.2.0'"));

        let gemspec = find_file(&prepared, "example.gemspec").unwrap();
        assert!(gemspec.content.contains("spec.add_dependency \"business\", \">= 0\""));
        assert!(gemspec.content.contains("spec.version ='0.9.3'"));
        assert!(!gemspec.content.contains("require"));

        assert_eq!(find_file(&prepared, ".ruby-version").unwrap().content, "2.4.1\n");
    }

    #[test]
    fn test_removes_git_source() {
        let dependency = Dependency::new("business", PackageManager::Bundler);
        let files = files();
        let prepared = FilePreparer::new(&dependency, &files, true)
            .prepared_dependency_files()
            .unwrap();
        let gemfile = find_file(&prepared, GEMFILE).unwrap();
        assert!(gemfile.content.contains("gem 'business', '>= 0'\n"));
    }
}
