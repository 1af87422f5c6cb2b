//! Cargo requirement rewriting.
//!
//! Single comparators keep their operator and precision (`1.0` stays two
//! segments, `~0.3.4` stays a tilde). Multi-comparator ranges are kept when
//! they already admit the new version and are unfixable otherwise.

use bump_core::requirement::{parse_requirement, satisfies_all};
use bump_core::{Requirement, Version};
use regex::Regex;
use std::sync::LazyLock;

static CARGO_REQUIREMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?P<operator>\^|~|>=|<=|>|<|=)?(?P<space>\s*)(?P<version>[0-9*]+(?:\.[0-9*]+)*)(?P<rest>[-+][0-9A-Za-z.+-]*)?$")
        .ok()
});

/// Rewrite `old` to admit `latest`. `None` when `old` should stay as it is.
pub fn updated_requirement(old: &str, latest: &Version) -> Option<Requirement> {
    let trimmed = old.trim();
    if trimmed.contains(',') {
        let constraints = parse_requirement(trimmed).ok()?;
        return (!satisfies_all(&constraints, latest)).then_some(Requirement::Unfixable);
    }

    let caps = CARGO_REQUIREMENT.as_ref()?.captures(trimmed)?;
    let old_segments: Vec<&str> = caps["version"].split('.').collect();
    if old_segments.first().is_some_and(|first| *first == "*") {
        return None;
    }

    let operator = match caps.name("operator").map(|m| m.as_str()) {
        // Lower bounds already admit anything newer
        Some(">" | ">=") => return None,
        // A strict upper bound can't admit the new version; widen it to a caret
        Some("<" | "<=") => "^",
        Some(operator) => operator,
        None => "",
    };

    let new_segments = latest.release().truncated(old_segments.len()).segments;
    let version = old_segments
        .iter()
        .zip(new_segments.iter())
        .map(|(old, new)| if *old == "*" { (*old).to_string() } else { new.to_string() })
        .collect::<Vec<_>>()
        .join(".");

    let updated = format!("{operator}{}{version}", &caps["space"]);
    (updated != trimmed).then_some(Requirement::Constraint(updated))
}
