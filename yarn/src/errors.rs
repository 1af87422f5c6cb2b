use bump_core::credentials::scrub;
use bump_core::{Credential, UpdateError};
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

/// yarn's report of a registry refusing a request
static REQUEST_FAILED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"Request failed "(?P<status>\d{3})[^"]*"(?:.*?(?P<url>https?://[^\s"]+))?"#).ok());

const UNRESOLVABLE_MARKERS: [&str; 3] = [
    "Couldn't find any versions for",
    "Couldn't find package",
    "No matching version found",
];

/// Re-classify a failed javascript helper run. Anything unrecognized comes
/// back as it was, with credentials scrubbed.
pub fn classify(err: UpdateError, credentials: &[Credential]) -> UpdateError {
    let (message, stdout, stderr, status) = match err {
        UpdateError::HelperSubprocessFailed {
            message,
            stdout,
            stderr,
            status,
        } => (
            scrub(&message, credentials),
            scrub(&stdout, credentials),
            scrub(&stderr, credentials),
            status,
        ),
        other => return other,
    };

    let text = format!("{message}\n{stderr}");
    if UNRESOLVABLE_MARKERS.iter().any(|marker| text.contains(marker)) {
        info!("helper reported an unresolvable dependency set");
        return UpdateError::not_resolvable(message);
    }

    if let Some(caps) = REQUEST_FAILED.as_ref().and_then(|re| re.captures(&text))
        && matches!(&caps["status"], "401" | "403")
    {
        let source = caps.name("url").map_or("registry", |m| m.as_str());
        return UpdateError::private_source_not_reachable(source);
    }

    UpdateError::HelperSubprocessFailed {
        message,
        stdout,
        stderr,
        status,
    }
}
