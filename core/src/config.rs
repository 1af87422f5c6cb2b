//! Runtime configuration: sandbox placement, helper commands and registry
//! endpoints.
//!
//! Loaded from `$XDG_CONFIG_HOME/bump/config.toml` when present, then
//! overridden from the environment. Every field has a default so an empty
//! file (or no file at all) is a valid configuration.

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const SCRATCH_ROOT_ENV: &str = "BUMP_SCRATCH_ROOT";
pub const HELPER_TIMEOUT_ENV: &str = "BUMP_HELPER_TIMEOUT_SECS";
pub const HELPERS_PATH_ENV: &str = "BUMP_HELPERS_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sandbox: SandboxConfig,
    pub helpers: HelperConfig,
    pub registries: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Directory temporary sandboxes are created under
    pub scratch_root: PathBuf,
    /// Upper bound on any single child or helper process
    pub timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            scratch_root: PathBuf::from("tmp"),
            timeout_secs: 300,
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Command lines for the out-of-process helpers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Ruby helper speaking the JSON helper protocol
    pub ruby: Vec<String>,
    /// JavaScript helper speaking the JSON helper protocol
    pub javascript: Vec<String>,
    pub git: String,
    pub cargo: String,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self::with_helpers_path(Path::new("helpers"))
    }
}

impl HelperConfig {
    fn with_helpers_path(root: &Path) -> Self {
        let script = |parts: &[&str]| {
            parts
                .iter()
                .fold(root.to_path_buf(), |path, part| path.join(part))
                .to_string_lossy()
                .into_owned()
        };
        Self {
            ruby: vec!["ruby".to_string(), script(&["ruby", "bin", "run.rb"])],
            javascript: vec!["node".to_string(), script(&["javascript", "bin", "run.js"])],
            git: "git".to_string(),
            cargo: "cargo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub rubygems: String,
    pub npm: String,
    pub pypi: String,
    pub crates_io: String,
    pub docker_hub: String,
    pub docker_auth: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            rubygems: "https://rubygems.org".to_string(),
            npm: "https://registry.npmjs.org".to_string(),
            pypi: "https://pypi.org".to_string(),
            crates_io: "https://crates.io".to_string(),
            docker_hub: "https://registry-1.docker.io".to_string(),
            docker_auth: "https://auth.docker.io".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// User config file if one exists, defaults otherwise, with environment
    /// overrides applied either way
    pub fn discover() -> Result<Self> {
        Self::discover_in(dirs::config_dir().as_deref(), |key| std::env::var(key).ok())
    }

    /// `bump/config.toml` under `config_dir`, then overrides from `lookup`
    pub fn discover_in(config_dir: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = match config_dir.map(|dir| dir.join("bump").join("config.toml")) {
            Some(path) if path.is_file() => {
                debug!(path = %path.display(), "loading configuration");
                Self::load(&path)?
            }
            _ => Self::default(),
        };
        Ok(config.with_env_overrides(lookup))
    }

    /// Apply overrides from a variable lookup (normally the process
    /// environment)
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(SCRATCH_ROOT_ENV) {
            self.sandbox.scratch_root = PathBuf::from(root);
        }
        if let Some(secs) = lookup(HELPER_TIMEOUT_ENV).and_then(|s| s.trim().parse().ok()) {
            self.sandbox.timeout_secs = secs;
        }
        if let Some(path) = lookup(HELPERS_PATH_ENV) {
            let located = HelperConfig::with_helpers_path(Path::new(&path));
            self.helpers.ruby = located.ruby;
            self.helpers.javascript = located.javascript;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sandbox.scratch_root, PathBuf::from("tmp"));
        assert_eq!(config.sandbox.timeout(), Duration::from_secs(300));
        assert_eq!(config.helpers.git, "git");
        assert_eq!(config.registries.npm, "https://registry.npmjs.org");
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
[sandbox]
timeout_secs = 30

[registries]
npm = "http://localhost:4873"
"#,
        )
        .unwrap();
        assert_eq!(config.sandbox.timeout_secs, 30);
        assert_eq!(config.sandbox.scratch_root, PathBuf::from("tmp"));
        assert_eq!(config.registries.npm, "http://localhost:4873");
        assert_eq!(config.registries.pypi, "https://pypi.org");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (SCRATCH_ROOT_ENV, "/var/tmp/bump"),
            (HELPER_TIMEOUT_ENV, "12"),
            (HELPERS_PATH_ENV, "/opt/helpers"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().with_env_overrides(|key| env.get(key).map(ToString::to_string));
        assert_eq!(config.sandbox.scratch_root, PathBuf::from("/var/tmp/bump"));
        assert_eq!(config.sandbox.timeout_secs, 12);
        assert_eq!(config.helpers.ruby[1], "/opt/helpers/ruby/bin/run.rb");
    }

    #[test]
    fn test_discover_in() {
        let dir = tempfile::tempdir().unwrap();
        let no_env = |_: &str| None;

        let config = Config::discover_in(Some(dir.path()), no_env).unwrap();
        assert_eq!(config.sandbox.timeout_secs, 300);
        assert_eq!(Config::discover_in(None, no_env).unwrap().helpers.git, "git");

        std::fs::create_dir(dir.path().join("bump")).unwrap();
        std::fs::write(
            dir.path().join("bump").join("config.toml"),
            "[sandbox]\ntimeout_secs = 45\nscratch_root = \"/srv/scratch\"\n",
        )
        .unwrap();
        let config = Config::discover_in(Some(dir.path()), |key| {
            (key == SCRATCH_ROOT_ENV).then(|| "/var/tmp/bump".to_string())
        })
        .unwrap();
        assert_eq!(config.sandbox.timeout_secs, 45);
        assert_eq!(config.sandbox.scratch_root, PathBuf::from("/var/tmp/bump"));

        std::fs::write(dir.path().join("bump").join("config.toml"), "[sandbox\n").unwrap();
        assert!(Config::discover_in(Some(dir.path()), no_env).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml_str("[sandbox\n").is_err());
    }
}
