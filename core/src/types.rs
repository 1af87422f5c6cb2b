use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A manifest or lockfile as fetched from a repository.
///
/// `name` is the path relative to the repository root (`Gemfile`,
/// `backend/requirements.txt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyFile {
    pub name: String,
    pub content: String,
}

impl DependencyFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Copy of this file carrying new content
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            content: content.into(),
        }
    }

    /// Final path component
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Directory containing the file, `/` for the repository root
    pub fn directory(&self) -> String {
        match self.name.trim_start_matches('/').rsplit_once('/') {
            Some((dir, _)) => format!("/{dir}"),
            None => "/".to_string(),
        }
    }
}

/// Find a file by exact name
pub fn find_file<'a>(files: &'a [DependencyFile], name: &str) -> Option<&'a DependencyFile> {
    files.iter().find(|file| file.name == name)
}

/// Package managers with an update strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Bundler,
    Yarn,
    Pip,
    Docker,
    Cargo,
}

impl PackageManager {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageManager::Bundler => "bundler",
            PackageManager::Yarn => "yarn",
            PackageManager::Pip => "pip",
            PackageManager::Docker => "docker",
            PackageManager::Cargo => "cargo",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bundler" => Ok(PackageManager::Bundler),
            "yarn" => Ok(PackageManager::Yarn),
            "pip" => Ok(PackageManager::Pip),
            "docker" => Ok(PackageManager::Docker),
            "cargo" => Ok(PackageManager::Cargo),
            other => Err(format!("unknown package manager: {other}")),
        }
    }
}

/// A git checkout a dependency is sourced from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GitSource {
    pub url: String,
    pub branch: Option<String>,
    /// Tag or commit the manifest pins, if any
    pub reference: Option<String>,
}

/// Where a container image lives and how it is pinned
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageSource {
    /// Registry host, `None` for Docker Hub
    pub registry: Option<String>,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

/// Where a requirement resolves its package from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    Registry { url: String },
    Git(GitSource),
    Path { path: String },
    Image(ImageSource),
}

impl DependencySource {
    pub fn git(&self) -> Option<&GitSource> {
        match self {
            DependencySource::Git(git) => Some(git),
            _ => None,
        }
    }

    pub fn image(&self) -> Option<&ImageSource> {
        match self {
            DependencySource::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn is_path(&self) -> bool {
        matches!(self, DependencySource::Path { .. })
    }
}

/// A requirement as it appears in one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Constraint text, e.g. `~> 1.4.0` or `>= 1.0, < 2.0`
    Constraint(String),
    /// No rewrite of the old constraint admits the new version
    Unfixable,
}

impl Requirement {
    pub fn constraint(text: impl Into<String>) -> Self {
        Requirement::Constraint(text.into())
    }

    pub fn as_constraint(&self) -> Option<&str> {
        match self {
            Requirement::Constraint(text) => Some(text),
            Requirement::Unfixable => None,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Constraint(text) => f.write_str(text),
            Requirement::Unfixable => f.write_str(":unfixable"),
        }
    }
}

/// One place a dependency is declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementRecord {
    /// Name of the file declaring it
    pub file: String,
    /// `None` when the file declares the dependency without a constraint
    /// (a bare `gem "x"`, a Dockerfile `FROM`)
    pub requirement: Option<Requirement>,
    /// Dependency groups (`development`, `test`, ...)
    pub groups: Vec<String>,
    pub source: Option<DependencySource>,
}

impl RequirementRecord {
    pub fn new(file: impl Into<String>, requirement: Option<&str>) -> Self {
        Self {
            file: file.into(),
            requirement: requirement.map(Requirement::constraint),
            groups: Vec::new(),
            source: None,
        }
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_source(mut self, source: DependencySource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn constraint(&self) -> Option<&str> {
        self.requirement.as_ref().and_then(Requirement::as_constraint)
    }

    pub fn is_unfixable(&self) -> bool {
        matches!(self.requirement, Some(Requirement::Unfixable))
    }
}

/// A package, its current state and, once updated, its previous state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// Resolved version, or a commit SHA for git dependencies
    pub version: Option<String>,
    pub previous_version: Option<String>,
    pub requirements: Vec<RequirementRecord>,
    pub previous_requirements: Vec<RequirementRecord>,
    pub package_manager: PackageManager,
}

impl Dependency {
    pub fn new(name: impl Into<String>, package_manager: PackageManager) -> Self {
        Self {
            name: name.into(),
            version: None,
            previous_version: None,
            requirements: Vec::new(),
            previous_requirements: Vec::new(),
            package_manager,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_requirement(mut self, record: RequirementRecord) -> Self {
        self.requirements.push(record);
        self
    }

    /// Current version, if it parses as a version at all
    pub fn parsed_version(&self) -> Option<Version> {
        self.version.as_deref().and_then(parse_release)
    }

    pub fn previous_parsed_version(&self) -> Option<Version> {
        self.previous_version.as_deref().and_then(parse_release)
    }

    /// First explicit source declared by any requirement
    pub fn source(&self) -> Option<&DependencySource> {
        self.requirements.iter().find_map(|r| r.source.as_ref())
    }

    pub fn git_source(&self) -> Option<&GitSource> {
        self.source().and_then(DependencySource::git)
    }

    pub fn requirement_for(&self, file: &str) -> Option<&RequirementRecord> {
        self.requirements.iter().find(|r| r.file == file)
    }

    pub fn previous_requirement_for(&self, file: &str) -> Option<&RequirementRecord> {
        self.previous_requirements.iter().find(|r| r.file == file)
    }
}

/// Full 40 character hex object id
pub fn is_commit_sha(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_release(value: &str) -> Option<Version> {
    if is_commit_sha(value) {
        return None;
    }
    value.parse().ok()
}

/// What a helper reports for a resolution
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionResolution {
    pub version: Version,
    #[serde(default)]
    pub commit_sha: Option<String>,
}

/// The state a dependency should move to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    Version(Version),
    /// Tip of the tracked branch for git dependencies outside any release
    Commit(String),
}

impl UpdateTarget {
    pub fn version(&self) -> Option<&Version> {
        match self {
            UpdateTarget::Version(version) => Some(version),
            UpdateTarget::Commit(_) => None,
        }
    }
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateTarget::Version(version) => write!(f, "{version}"),
            UpdateTarget::Commit(sha) => f.write_str(sha),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_accessors() {
        let dependency = Dependency::new("business", PackageManager::Bundler)
            .with_version("1.4.0")
            .with_requirement(
                RequirementRecord::new("Gemfile", Some("~> 1.4.0")).with_source(
                    DependencySource::Git(GitSource {
                        url: "https://github.com/gocardless/business".to_string(),
                        branch: Some("master".to_string()),
                        reference: None,
                    }),
                ),
            );

        assert_eq!(dependency.parsed_version(), Some(Version::new(1, 4, 0)));
        assert!(dependency.git_source().is_some());
        assert_eq!(
            dependency.requirement_for("Gemfile").and_then(RequirementRecord::constraint),
            Some("~> 1.4.0")
        );
        assert!(dependency.requirement_for("Gemfile.lock").is_none());
    }

    #[test]
    fn test_git_sha_does_not_parse_as_version() {
        let dependency = Dependency::new("business", PackageManager::Bundler)
            .with_version("c5bf1bd47935504072ac0eba1006cf4d67af6a7a");
        assert!(dependency.parsed_version().is_none());

        let dependency = Dependency::new("business", PackageManager::Bundler)
            .with_version("0ba1bd47935504072ac0eba1006cf4d67af6a7ac");
        assert!(dependency.parsed_version().is_none());
    }

    #[test]
    fn test_file_paths() {
        let file = DependencyFile::new("backend/api/requirements.txt", "");
        assert_eq!(file.directory(), "/backend/api");
        assert_eq!(file.file_name(), "requirements.txt");
        assert_eq!(DependencyFile::new("Gemfile", "").directory(), "/");

        let updated = file.with_content("requests==2.0.0\n");
        assert_eq!(updated.name, file.name);
        assert!(file.content.is_empty());
    }

    #[test]
    fn test_package_manager_round_trip() {
        assert_eq!("yarn".parse::<PackageManager>(), Ok(PackageManager::Yarn));
        assert!("maven".parse::<PackageManager>().is_err());
    }

    #[test]
    fn test_resolution_from_helper_json() {
        let resolution: VersionResolution =
            serde_json::from_str(r#"{"version":"1.5.0","commit_sha":null}"#).unwrap();
        assert_eq!(resolution.version, Version::new(1, 5, 0));
        assert!(resolution.commit_sha.is_none());
    }
}
