//! node-semver style requirement rewriting.
//!
//! A requirement keeps its operator (`^`, `~`, `>=`, bare) and the number
//! of segments its author wrote, `x`/`*` wildcards included. Pre-release
//! suffixes are dropped from the result.

use bump_core::Version;
use regex::Regex;
use std::sync::LazyLock;

static NPM_REQUIREMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?P<operator>\^|~|>=|<=|>|<|=)?(?P<space>\s*)v?(?P<version>[0-9xX*]+(?:\.[0-9xX*]+)*)(?P<rest>.*)$").ok()
});

/// Prefixes that name a source instead of a registry version
const NON_REGISTRY_PREFIXES: [&str; 7] = ["git", "file:", "link:", "workspace:", "github:", "http:", "https:"];

pub fn is_registry_requirement(requirement: &str) -> bool {
    let requirement = requirement.trim();
    !NON_REGISTRY_PREFIXES.iter().any(|prefix| requirement.starts_with(prefix)) && !requirement.contains("://")
}

fn is_wildcard(segment: &str) -> bool {
    matches!(segment, "x" | "X" | "*")
}

/// Rewrite `old` to admit `latest`.
///
/// Returns `None` for requirements this rewriter leaves alone: non-registry
/// sources, `||` unions, hyphen ranges and anything else it can't read.
pub fn updated_requirement(old: &str, latest: &Version) -> Option<String> {
    let trimmed = old.trim();
    if !is_registry_requirement(trimmed) {
        return None;
    }
    let caps = NPM_REQUIREMENT.as_ref()?.captures(trimmed)?;

    let rest = &caps["rest"];
    if !rest.is_empty() && !rest.starts_with(['-', '.', '+']) {
        return None;
    }

    let old_segments: Vec<&str> = caps["version"].split('.').collect();
    if old_segments.first().is_some_and(|first| is_wildcard(first)) {
        return None;
    }
    let new_segments = latest.release().truncated(old_segments.len()).segments;
    let version = old_segments
        .iter()
        .zip(new_segments.iter())
        .map(|(old, new)| {
            if is_wildcard(old) {
                (*old).to_string()
            } else {
                new.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".");

    // A strict upper bound can't admit the new version; widen it to a caret
    let operator = match caps.name("operator").map(|m| m.as_str()) {
        Some("<" | "<=") => "^",
        Some(operator) => operator,
        None => "",
    };
    Some(format!("{operator}{}{version}", &caps["space"]))
}
