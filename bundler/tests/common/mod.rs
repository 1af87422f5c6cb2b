#![allow(dead_code)]

use bump_core::config::{Config, SandboxConfig};
use bump_core::{Credential, Dependency, DependencyFile, PackageManager, RequirementRecord, StrategyContext};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A scratch root plus a fake ruby helper that answers the helper protocol
/// from a shell script
pub struct FakeRubyHelper {
    pub dir: TempDir,
}

impl FakeRubyHelper {
    pub fn new(script: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(dir.path().join("scratch")).expect("Failed to create scratch root");
        let helper = Self { dir };
        fs::write(helper.script_path(), script.replace("{CALLS}", &helper.calls_path().to_string_lossy()))
            .expect("Failed to write helper script");
        helper
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.path().join("run.sh")
    }

    /// File the script appends the requested function name to
    pub fn calls_path(&self) -> PathBuf {
        self.dir.path().join("calls")
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.calls_path())
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.sandbox = SandboxConfig {
            scratch_root: self.scratch_root(),
            timeout_secs: 30,
        };
        config.helpers.ruby = vec!["sh".to_string(), self.script_path().to_string_lossy().into_owned()];
        config
    }

    pub fn context(&self, dependency: Dependency, files: Vec<DependencyFile>, credentials: Vec<Credential>) -> StrategyContext {
        StrategyContext::new(dependency, files, credentials, Arc::new(self.config()))
    }
}

pub fn scratch_is_empty(root: &Path) -> bool {
    fs::read_dir(root).map(|mut entries| entries.next().is_none()).unwrap_or(true)
}

/// Helper answering latest 1.8.0 / resolvable 1.5.0, and producing a
/// lockfile with business at 1.5.0 once the Gemfile asks for it
pub const RESOLVING_HELPER: &str = r#"#!/bin/sh
request=$(cat)
case "$request" in
  *'"function":"latest_version_details"'*)
    echo latest_version_details >> '{CALLS}'
    grep -q '>= 0' Gemfile || { echo '{"error":"requirement not loosened","error_class":"RuntimeError"}'; exit 1; }
    echo '{"result":{"version":"1.8.0","commit_sha":null}}'
    ;;
  *'"function":"latest_resolvable_version_details"'*)
    echo latest_resolvable_version_details >> '{CALLS}'
    echo '{"result":{"version":"1.5.0","commit_sha":null}}'
    ;;
  *'"function":"update_lockfile"'*)
    echo update_lockfile >> '{CALLS}'
    grep -q '~> 1.5.0' Gemfile || { echo '{"error":"Could not find gem business (~> 1.4.0)","error_class":"Bundler::VersionConflict"}'; exit 1; }
    echo 'Resolving dependencies...'
    printf '%s\n' '{"result":"GEM\n  remote: https://rubygems.org/\n  specs:\n    business (1.5.0)\n      holidays (~> 0.1)\n    holidays (0.1.2)\n    statesman (1.2.1)\n\nPLATFORMS\n  ruby\n\nDEPENDENCIES\n  business (~> 1.5.0)\n  statesman (~> 1.2.0)\n\nBUNDLED WITH\n   2.4.10\n"}'
    ;;
  *)
    echo '{"error":"unknown function","error_class":"NoMethodError"}'
    exit 1
    ;;
esac
"#;

/// Helper whose every call fails with the given resolver error class
pub fn failing_helper(error_class: &str, message: &str) -> String {
    format!(
        "#!/bin/sh\ncat > /dev/null\necho '{{\"error\":\"{message}\",\"error_class\":\"{error_class}\"}}'\necho '{message}' >&2\nexit 1\n"
    )
}

pub const GEMFILE: &str = r#"source "https://rubygems.org"

gem "business", "~> 1.4.0"
gem "statesman", "~> 1.2.0" # state machines
"#;

pub const GEMFILE_LOCK: &str = r#"GEM
  remote: https://rubygems.org/
  specs:
    business (1.4.0)
      holidays (~> 0.1)
    holidays (0.1.2)
    statesman (1.2.1)

PLATFORMS
  ruby

DEPENDENCIES
  business (~> 1.4.0)
  statesman (~> 1.2.0)

BUNDLED WITH
   1.16.1
"#;

pub fn files() -> Vec<DependencyFile> {
    vec![
        DependencyFile::new("Gemfile", GEMFILE),
        DependencyFile::new("Gemfile.lock", GEMFILE_LOCK),
    ]
}

pub fn business() -> Dependency {
    Dependency::new("business", PackageManager::Bundler)
        .with_version("1.4.0")
        .with_requirement(RequirementRecord::new("Gemfile", Some("~> 1.4.0")))
}
