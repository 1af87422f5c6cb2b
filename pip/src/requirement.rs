//! Precision-preserving pin updates.

use crate::grammar::REQUIREMENT;
use bump_core::Version;

/// Rewrite a single-comparison requirement so it admits `latest`.
///
/// Only the version text changes. The comparison and spacing the author
/// wrote are kept, and so is the number of release segments: `==2.0`
/// becomes `==2.6`, `~=2.0.0` becomes `~=2.6.0`. Wildcards stay in
/// place (`==2.*` becomes `==3.*`).
///
/// `None` when there's nothing sensible to rewrite: multi-comparison
/// lists, upper bounds and exclusions (`<`, `<=`, `>`, `!=`), and
/// requirements that already name `latest`.
pub fn updated_requirement(old: &str, latest: &Version) -> Option<String> {
    let re = REQUIREMENT.as_ref()?;
    let mut matches = re.captures_iter(old);
    let caps = matches.next()?;
    if matches.next().is_some() {
        return None;
    }

    let comparison = caps.name("comparison")?.as_str();
    if !matches!(comparison, "==" | "===" | ">=" | "~=") {
        return None;
    }

    let version = caps.name("version")?;
    let new_version = version_at_precision(version.as_str(), latest);
    if new_version == version.as_str() {
        return None;
    }

    let mut updated = old.to_string();
    updated.replace_range(version.range(), &new_version);
    Some(updated)
}

/// `latest` written with as many segments as `old`
fn version_at_precision(old: &str, latest: &Version) -> String {
    let parts: Vec<&str> = old.split('.').collect();
    if latest.is_prerelease() && parts.len() >= latest.precision() {
        return latest.to_string();
    }

    let release = latest.truncated(parts.len());
    parts
        .iter()
        .enumerate()
        .take(release.precision())
        .map(|(index, part)| {
            if *part == "*" {
                (*part).to_string()
            } else {
                release.segment(index).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
