use bump_core::credentials::scrub;
use bump_core::{Credential, UpdateError};
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

static GIT_SOURCE_UNREACHABLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:Unable to update|failed to (?:clone|fetch) into[^\n]*?|failed to load source for dependency[^\n]*\n[^\n]*?)\s*(?P<url>(?:https?|ssh|git)://[^\s`'#]+)").ok()
});

static REGISTRY_DENIED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:401|403)[^\n]*?(?P<url>https?://[^\s`']+)|failed to authenticate").ok());

const UNRESOLVABLE_MARKERS: [&str; 3] = [
    "failed to select a version for",
    "no matching package named",
    "candidate versions found which didn't match",
];

const UNEVALUATABLE_MARKERS: [&str; 3] = [
    "failed to parse manifest",
    "could not parse input as TOML",
    "failed to parse lock file",
];

/// Re-classify a failed `cargo` run from its stderr. Anything unrecognized
/// comes back as it was, with credentials scrubbed.
pub fn classify(err: UpdateError, credentials: &[Credential]) -> UpdateError {
    let (error_class, message, stderr) = match err {
        UpdateError::ChildProcessFailed {
            error_class,
            message,
            stderr,
        } => (error_class, scrub(&message, credentials), scrub(&stderr, credentials)),
        other => return other,
    };

    if UNRESOLVABLE_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        info!("cargo reported an unresolvable dependency set");
        return UpdateError::not_resolvable(stderr.trim());
    }

    if UNEVALUATABLE_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        return UpdateError::not_evaluatable(stderr.trim());
    }

    if let Some(caps) = GIT_SOURCE_UNREACHABLE.as_ref().and_then(|re| re.captures(&stderr))
        && let Some(url) = caps.name("url")
    {
        return UpdateError::git_dependencies_not_reachable([url.as_str()]);
    }

    if let Some(caps) = REGISTRY_DENIED.as_ref().and_then(|re| re.captures(&stderr)) {
        let source = caps.name("url").map_or("crates registry", |m| m.as_str());
        return UpdateError::private_source_not_reachable(source);
    }

    UpdateError::ChildProcessFailed {
        error_class,
        message,
        stderr,
    }
}
