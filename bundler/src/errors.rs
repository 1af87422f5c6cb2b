//! Re-classifying resolver failures into the update error taxonomy.

use crate::grammar::{git_source_urls, path_sources};
use bump_core::config::Config;
use bump_core::credentials::{Credential, scrub};
use bump_core::git::remote_reachable;
use bump_core::{DependencyFile, UpdateError};
use futures::future::join_all;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

/// Bundler's message when a git dependency's ref can't be checked out
static GIT_REF: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"git reset --hard (?P<reference>[^\s`]*)` in directory (?P<path>[^\s]*)").ok()
});

static MISSING_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"The path `(?P<path>[^`]*)` does not exist").ok());

static SOURCE_URL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r#"https?://[^\s'"`]+"#).ok());

/// What the resolver's error class says went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolverFailure {
    NotEvaluatable,
    NotResolvable,
    Authentication,
    Git,
    Path,
}

fn resolver_failure(error_class: &str) -> Option<ResolverFailure> {
    let short = error_class.rsplit("::").next().unwrap_or(error_class);
    match short {
        "DSLError" | "GemfileError" | "GemspecError" | "GemfileEvalError" => Some(ResolverFailure::NotEvaluatable),
        "VersionConflict" | "GemNotFound" | "SolveFailure" => Some(ResolverFailure::NotResolvable),
        "AuthenticationRequiredError" | "BadAuthenticationError" => Some(ResolverFailure::Authentication),
        "GitError" | "GitCommandError" => Some(ResolverFailure::Git),
        "PathError" => Some(ResolverFailure::Path),
        _ => None,
    }
}

/// Turn a failed resolver run into a domain error.
///
/// Errors that aren't resolver failures come back unchanged. Resolver
/// failures of an unrecognized class keep their shape, with credentials
/// scrubbed from the text.
pub async fn classify(
    err: UpdateError,
    files: &[DependencyFile],
    credentials: &[Credential],
    config: &Config,
) -> UpdateError {
    let (error_class, message, stderr) = match err {
        UpdateError::ChildProcessFailed {
            error_class,
            message,
            stderr,
        } => (error_class, scrub(&message, credentials), scrub(&stderr, credentials)),
        other => return other,
    };

    let Some(failure) = resolver_failure(&error_class) else {
        warn!(error_class = %error_class, "unrecognized resolver failure");
        return UpdateError::ChildProcessFailed {
            error_class,
            message,
            stderr,
        };
    };
    info!(error_class = %error_class, ?failure, "classifying resolver failure");

    match failure {
        ResolverFailure::NotEvaluatable => UpdateError::not_evaluatable(message),
        ResolverFailure::NotResolvable => UpdateError::not_resolvable(message),
        ResolverFailure::Authentication => {
            let source = SOURCE_URL
                .as_ref()
                .and_then(|re| re.find(&message))
                .map_or_else(
                    || message.clone(),
                    |m| m.as_str().trim_end_matches(['.', ',']).to_string(),
                );
            UpdateError::private_source_not_reachable(&source)
        }
        ResolverFailure::Git => classify_git_failure(&message, files, credentials, config).await,
        ResolverFailure::Path => {
            let missing = MISSING_PATH
                .as_ref()
                .and_then(|re| re.captures(&message))
                .map(|caps| vec![path_basename(&caps["path"])]);
            UpdateError::PathDependenciesNotReachable {
                dependencies: missing.unwrap_or_else(|| {
                    path_sources(files)
                        .iter()
                        .map(|path| path_basename(path))
                        .collect()
                }),
            }
        }
    }
}

async fn classify_git_failure(
    message: &str,
    files: &[DependencyFile],
    credentials: &[Credential],
    config: &Config,
) -> UpdateError {
    let urls = git_source_urls(files);
    let timeout = config.sandbox.timeout();
    let checks = urls
        .iter()
        .map(|url| remote_reachable(&config.helpers.git, url, credentials, timeout));
    let reachable = join_all(checks).await;

    let unreachable: Vec<&String> = urls
        .iter()
        .zip(reachable)
        .filter_map(|(url, ok)| (!ok).then_some(url))
        .collect();
    if !unreachable.is_empty() {
        return UpdateError::git_dependencies_not_reachable(unreachable);
    }

    if let Some(caps) = GIT_REF.as_ref().and_then(|re| re.captures(message)) {
        return UpdateError::GitDependencyBranchNotFound {
            dependency: checkout_dependency_name(&caps["path"]),
            branch: caps["reference"].to_string(),
        };
    }

    UpdateError::not_resolvable(message)
}

/// `.../bundler/gems/business-4b5f8e1a2c3d` names the `business` checkout
fn checkout_dependency_name(path: &str) -> String {
    let base = path_basename(path);
    match base.rsplit_once('-') {
        Some((name, sha)) if sha.len() >= 7 && sha.bytes().all(|b| b.is_ascii_hexdigit()) => name.to_string(),
        _ => base,
    }
}

fn path_basename(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}
