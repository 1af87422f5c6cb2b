use crate::credentials::sanitize_url;
use crate::version::VersionError;
use thiserror::Error;

/// Failure kinds surfaced by every update strategy.
///
/// Messages never contain credentials: URLs are sanitized before they are
/// stored in a variant.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Dependency file could not be evaluated: {message}")]
    DependencyFileNotEvaluatable { message: String },

    #[error("Dependency file could not be resolved: {message}")]
    DependencyFileNotResolvable { message: String },

    #[error("The following git URLs could not be retrieved: {}", .urls.join(", "))]
    GitDependenciesNotReachable { urls: Vec<String> },

    #[error("The branch '{branch}' could not be retrieved for {dependency}")]
    GitDependencyBranchNotFound { dependency: String, branch: String },

    #[error(
        "The following path based dependencies could not be retrieved: {}",
        .dependencies.join(", ")
    )]
    PathDependenciesNotReachable { dependencies: Vec<String> },

    #[error(
        "The following source could not be reached as it requires authentication (and any provided details were invalid): {0}"
    )]
    PrivateSourceNotReachable(String),

    #[error("Child process failed ({error_class}): {message}")]
    ChildProcessFailed {
        error_class: String,
        message: String,
        stderr: String,
    },

    #[error("Helper subprocess failed: {message}")]
    HelperSubprocessFailed {
        message: String,
        stdout: String,
        stderr: String,
        status: Option<i32>,
    },

    #[error("Requirement on {dependency} in {file} can't be updated to permit the new version")]
    UnfixableRequirement { dependency: String, file: String },

    #[error("Dependency file not found: {0}")]
    DependencyFileNotFound(String),

    #[error("{registry} responded with status {status}")]
    Registry { registry: String, status: u16 },

    #[error("Invalid sandbox path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, UpdateError>;

impl UpdateError {
    pub fn not_evaluatable(message: impl Into<String>) -> Self {
        UpdateError::DependencyFileNotEvaluatable {
            message: message.into(),
        }
    }

    pub fn not_resolvable(message: impl Into<String>) -> Self {
        UpdateError::DependencyFileNotResolvable {
            message: message.into(),
        }
    }

    /// Unreachable git URLs, with any embedded credentials removed
    pub fn git_dependencies_not_reachable<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        UpdateError::GitDependenciesNotReachable {
            urls: urls.into_iter().map(|url| sanitize_url(url.as_ref())).collect(),
        }
    }

    pub fn private_source_not_reachable(source: &str) -> Self {
        UpdateError::PrivateSourceNotReachable(sanitize_url(source))
    }

    /// Resolution conflicts can clear up once upstream publishes more
    /// versions; everything else needs a change to the repository or its
    /// credentials.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UpdateError::DependencyFileNotResolvable { .. })
    }
}
