//! Rewriting a requirement so that it admits a new version.
//!
//! How a constraint is rewritten depends on who declares it. Applications
//! pin to what they can resolve; libraries widen their ranges so
//! downstream users keep the freedom to resolve older versions; development
//! dependencies of a library behave like an application pin.

use crate::requirement::{Constraint, Operator, join_constraints, parse_requirement, satisfies_all};
use crate::types::{Requirement, RequirementRecord};
use crate::version::{Version, VersionError};
use regex::{Captures, Regex};
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::warn;

/// Operators a library constraint can't be relaxed from when the new
/// version falls outside them
pub const UNFIXABLE_OPERATORS: [Operator; 3] = [
    Operator::NotEqual,
    Operator::GreaterThan,
    Operator::GreaterThanOrEqual,
];

/// Upper bounds an application rewrite turns into `~>`
pub const APPLICATION_RELAXED_OPERATORS: [Operator; 2] =
    [Operator::LessThan, Operator::LessThanOrEqual];

/// Group name marking a development-only dependency
pub const DEVELOPMENT_GROUP: &str = "development";

static VERSION_TERM: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?P<op>===|==|!=|>=|<=|~>|~=|=|>|<|\^|~)?(?P<space>\s*)(?P<version>[0-9][0-9A-Za-z.\-_+]*)").ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementStyle {
    /// Gemfile-like manifests: pin to the latest resolvable version
    Application,
    /// Runtime dependency of a published package: widen ranges
    Library,
    /// Development dependency of a published package
    Development,
}

impl RequirementStyle {
    /// Style for a record, given whether its file belongs to a library
    pub fn for_record(record: &RequirementRecord, library_file: bool) -> Self {
        if !library_file {
            RequirementStyle::Application
        } else if record.groups.iter().any(|group| group == DEVELOPMENT_GROUP) {
            RequirementStyle::Development
        } else {
            RequirementStyle::Library
        }
    }
}

/// `new` written with as many release segments as `old`. Pre-release and
/// local parts are dropped.
pub fn at_same_precision(new: &Version, old: &Version) -> Version {
    new.truncated(old.precision())
}

/// New upper bound for a `<`/`<=` constraint that excludes `latest`.
///
/// The last non-zero segment of the old bound decides the granularity:
/// `< 1.4.0` with latest 1.5.0 becomes `< 1.6.0`, `< 2` becomes `< 3`.
pub fn bump_greatest(old: &Version, latest: &Version) -> Version {
    let index = old.segments.iter().rposition(|segment| *segment != 0).unwrap_or(0);
    let len = old.precision().max(index + 1);
    let segments: Vec<u64> = (0..len)
        .map(|i| match i.cmp(&index) {
            std::cmp::Ordering::Less => latest.segment(i),
            std::cmp::Ordering::Equal => latest.segment(i) + 1,
            std::cmp::Ordering::Greater => 0,
        })
        .collect();
    Version::from_segments(&segments)
}

/// Replace `~> old` with an explicit range that keeps `old` as the lower
/// bound and moves the ceiling past `latest`.
///
/// `~> 1.4.0` with latest 1.8.0 becomes `>= 1.4.0, < 1.9.0`.
pub fn twiddle_to_range(old: &Version, latest: &Version) -> [Constraint; 2] {
    let index = old.precision().saturating_sub(2);
    let mut ceiling: Vec<u64> = (0..=index).map(|i| latest.segment(i)).collect();
    if let Some(last) = ceiling.last_mut() {
        *last += 1;
    }
    ceiling.resize(old.precision().max(ceiling.len()), 0);

    [
        Constraint::new(Operator::GreaterThanOrEqual, old.release()),
        Constraint::new(Operator::LessThan, Version::from_segments(&ceiling)),
    ]
}

/// Collapse redundant bounds: the lowest upper bound and the highest lower
/// bound of each operator win. Output is sorted by version; an empty set
/// becomes `>= 0`.
pub fn binding_requirements(constraints: Vec<Constraint>) -> Vec<Constraint> {
    let mut binding: Vec<Constraint> = Vec::new();
    for constraint in constraints {
        let op = constraint.operator;
        if (op.is_upper_bound() || op.is_lower_bound())
            && let Some(existing) = binding.iter_mut().find(|b| b.operator == op)
        {
            let tighter = if op.is_upper_bound() {
                constraint.version < existing.version
            } else {
                constraint.version > existing.version
            };
            if tighter {
                *existing = constraint;
            }
            continue;
        }
        if !binding.contains(&constraint) {
            binding.push(constraint);
        }
    }

    binding.sort_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then_with(|| a.operator.as_str().cmp(b.operator.as_str()))
    });
    if binding.is_empty() {
        binding.push(Constraint::new(
            Operator::GreaterThanOrEqual,
            Version::from_segments(&[0]),
        ));
    }
    binding
}

/// Rewrite one requirement string.
///
/// Application style targets `latest_resolvable`; the library styles target
/// `latest`. With no target the requirement comes back unchanged.
pub fn update_requirement(
    old: &str,
    style: RequirementStyle,
    existing: Option<&Version>,
    latest: Option<&Version>,
    latest_resolvable: Option<&Version>,
) -> Result<Requirement, VersionError> {
    match style {
        RequirementStyle::Application => match latest_resolvable {
            Some(target) => application_requirement(old, existing, target),
            None => Ok(Requirement::constraint(old)),
        },
        RequirementStyle::Library | RequirementStyle::Development => match latest {
            Some(target) => library_requirement(old, target, style == RequirementStyle::Development),
            None => Ok(Requirement::constraint(old)),
        },
    }
}

fn application_requirement(
    old: &str,
    existing: Option<&Version>,
    target: &Version,
) -> Result<Requirement, VersionError> {
    let constraints = parse_requirement(old)?;
    if existing.is_none() && satisfies_all(&constraints, target) {
        return Ok(Requirement::constraint(old));
    }

    let Some(re) = VERSION_TERM.as_ref() else {
        return Ok(Requirement::constraint(old));
    };
    let updated = re.replace_all(old, |caps: &Captures| {
        let op = caps.name("op").map_or("", |m| m.as_str());
        let relaxed = APPLICATION_RELAXED_OPERATORS
            .iter()
            .any(|candidate| candidate.as_str() == op);
        let op = if relaxed { Operator::Pessimistic.as_str() } else { op };
        let space = caps.name("space").map_or("", |m| m.as_str());
        match Version::from_str(&caps["version"]) {
            Ok(previous) => format!("{op}{space}{}", at_same_precision(target, &previous)),
            Err(_) => caps[0].to_string(),
        }
    });
    Ok(Requirement::constraint(updated))
}

fn library_requirement(old: &str, latest: &Version, development: bool) -> Result<Requirement, VersionError> {
    let constraints = parse_requirement(old)?;
    if satisfies_all(&constraints, latest) {
        return Ok(Requirement::constraint(old));
    }

    let mut updated = Vec::new();
    for constraint in &constraints {
        if constraint.satisfied_by(latest) {
            updated.push(constraint.clone());
            continue;
        }

        let op = constraint.operator;
        if UNFIXABLE_OPERATORS.contains(&op) {
            return Ok(Requirement::Unfixable);
        }
        if op.is_upper_bound() {
            updated.push(Constraint::new(op, bump_greatest(&constraint.version, latest)));
        } else if op.is_exact() {
            if development {
                updated.push(Constraint::new(
                    Operator::Equal,
                    at_same_precision(latest, &constraint.version),
                ));
            } else {
                updated.push(Constraint::new(
                    Operator::GreaterThanOrEqual,
                    constraint.version.clone(),
                ));
            }
        } else if development {
            updated.push(Constraint::new(op, at_same_precision(latest, &constraint.version)));
        } else {
            updated.extend(twiddle_to_range(&constraint.version, latest));
        }
    }

    Ok(Requirement::constraint(join_constraints(&binding_requirements(updated))))
}

/// Rewrites every requirement record of a dependency.
#[derive(Debug, Clone, Copy)]
pub struct RequirementsUpdater<'a> {
    pub requirements: &'a [RequirementRecord],
    pub existing_version: Option<&'a Version>,
    pub latest_version: Option<&'a Version>,
    pub latest_resolvable_version: Option<&'a Version>,
}

impl RequirementsUpdater<'_> {
    /// Updated copies of the records. Records without a constraint, or whose
    /// constraint doesn't parse, are returned unchanged.
    pub fn updated_requirements<F>(&self, style_for: F) -> Vec<RequirementRecord>
    where
        F: Fn(&RequirementRecord) -> RequirementStyle,
    {
        self.requirements
            .iter()
            .map(|record| {
                let Some(old) = record.constraint() else {
                    return record.clone();
                };
                match update_requirement(
                    old,
                    style_for(record),
                    self.existing_version,
                    self.latest_version,
                    self.latest_resolvable_version,
                ) {
                    Ok(requirement) => RequirementRecord {
                        requirement: Some(requirement),
                        ..record.clone()
                    },
                    Err(err) => {
                        warn!(file = %record.file, requirement = old, error = %err, "leaving unparsable requirement unchanged");
                        record.clone()
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    fn application(old: &str, existing: Option<&str>, resolvable: Option<&str>) -> Requirement {
        let existing = existing.map(v);
        let resolvable = resolvable.map(v);
        update_requirement(
            old,
            RequirementStyle::Application,
            existing.as_ref(),
            Some(&v("1.8.0")),
            resolvable.as_ref(),
        )
        .unwrap()
    }

    fn library(old: &str, style: RequirementStyle, latest: &str) -> Requirement {
        update_requirement(old, style, Some(&v("1.4.0")), Some(&v(latest)), None).unwrap()
    }

    fn constraint(s: &str) -> Requirement {
        Requirement::constraint(s)
    }

    #[test]
    fn test_application_without_resolvable_version_is_unchanged() {
        assert_eq!(application("~> 1.4.0", Some("1.4.0"), None), constraint("~> 1.4.0"));
    }

    #[test]
    fn test_application_rewrites_at_same_precision() {
        let existing = Some("1.4.0");
        let resolvable = Some("1.5.0");
        assert_eq!(application("~> 1.4.0", existing, resolvable), constraint("~> 1.5.0"));
        assert_eq!(application("~> 1.5.0.beta", existing, resolvable), constraint("~> 1.5.0"));
        assert_eq!(application("~> 1.4", existing, resolvable), constraint("~> 1.5"));
        assert_eq!(application(">= 1.4.0", existing, resolvable), constraint(">= 1.5.0"));
        assert_eq!(application("< 1.4.0", existing, resolvable), constraint("~> 1.5.0"));
        assert_eq!(application("= 1.4.0", existing, resolvable), constraint("= 1.5.0"));
    }

    #[test]
    fn test_application_without_existing_version() {
        assert_eq!(application("~> 1.4", None, Some("1.5.0")), constraint("~> 1.4"));
        assert_eq!(application("~> 1.4.0", None, Some("1.5.0")), constraint("~> 1.5.0"));
    }

    #[test]
    fn test_library_rewrites() {
        let style = RequirementStyle::Library;
        assert_eq!(library("= 1.4.0", style, "1.5.0"), constraint(">= 1.4.0"));
        assert_eq!(library("1.4.0", style, "1.5.0"), constraint(">= 1.4.0"));
        assert_eq!(library("< 1.4.0", style, "1.5.0"), constraint("< 1.6.0"));
        assert_eq!(library("<= 1.4.0", style, "1.5.0"), constraint("<= 1.6.0"));
        assert_eq!(library("< 1.4.0.beta", style, "1.5.0"), constraint("< 1.6.0"));
    }

    #[test]
    fn test_library_twiddle_becomes_range() {
        let style = RequirementStyle::Library;
        assert_eq!(library("~> 1.4.0", style, "1.8.0"), constraint(">= 1.4.0, < 1.9.0"));
        assert_eq!(library("~> 1.4.0", style, "1.5.0"), constraint(">= 1.4.0, < 1.6.0"));
        assert_eq!(library("~> 1.0.1", style, "1.5.0"), constraint(">= 1.0.1, < 1.6.0"));
        assert_eq!(library("~> 0.1", style, "1.5.0"), constraint(">= 0.1, < 2.0"));
    }

    #[test]
    fn test_library_multiple_constraints() {
        let style = RequirementStyle::Library;
        assert_eq!(
            library("> 1.0.0, <= 1.4.0", style, "1.5.0"),
            constraint("> 1.0.0, <= 1.6.0")
        );
        assert_eq!(
            library("~> 0.5, >= 0.5.2", style, "1.5.0"),
            constraint(">= 0.5.2, < 2.0")
        );
        assert_eq!(library(">= 1.0, < 1.5", style, "1.8.0"), constraint(">= 1.0, < 1.9"));
    }

    #[test]
    fn test_library_satisfied_requirement_is_unchanged() {
        assert_eq!(
            library(">= 1.0, < 2.0", RequirementStyle::Library, "1.8.0"),
            constraint(">= 1.0, < 2.0")
        );
    }

    #[test]
    fn test_unfixable_operators() {
        for style in [RequirementStyle::Library, RequirementStyle::Development] {
            assert_eq!(library("!= 1.5.0", style, "1.5.0"), Requirement::Unfixable);
            assert_eq!(library(">= 1.6.0", style, "1.5.0"), Requirement::Unfixable);
            assert_eq!(library("> 1.6.0", style, "1.5.0"), Requirement::Unfixable);
        }
    }

    #[test]
    fn test_development_rewrites() {
        let style = RequirementStyle::Development;
        assert_eq!(library("= 1.4.0", style, "1.5.0"), constraint("= 1.5.0"));
        assert_eq!(library("1.4.0", style, "1.5.0"), constraint("= 1.5.0"));
        assert_eq!(library("< 1.4.0", style, "1.5.0"), constraint("< 1.6.0"));
        assert_eq!(library("~> 1.4.0", style, "1.5.0"), constraint("~> 1.5.0"));
        assert_eq!(library("~> 0.1", style, "1.5.0"), constraint("~> 1.5"));
        assert_eq!(
            library("> 1.0.0, <= 1.4.0", style, "1.5.0"),
            constraint("> 1.0.0, <= 1.6.0")
        );
    }

    #[test]
    fn test_bump_greatest() {
        assert_eq!(bump_greatest(&v("1.4.0"), &v("1.5.0")).to_string(), "1.6.0");
        assert_eq!(bump_greatest(&v("2"), &v("2.3.1")).to_string(), "3");
        assert_eq!(bump_greatest(&v("0.0"), &v("1.5.0")).to_string(), "2.0");
    }

    #[test]
    fn test_binding_requirements_defaults_to_any() {
        assert_eq!(join_constraints(&binding_requirements(Vec::new())), ">= 0");
    }

    #[test]
    fn test_requirements_updater_over_records() {
        let records = vec![
            RequirementRecord::new("Gemfile", Some("~> 1.4.0")),
            RequirementRecord::new("example.gemspec", Some(">= 1.0, < 1.5")),
            RequirementRecord::new("example.gemspec", Some("= 1.4.0")).with_groups(&["development"]),
            RequirementRecord::new("Gemfile", None),
        ];
        let existing = v("1.4.0");
        let latest = v("1.8.0");
        let resolvable = v("1.5.0");
        let updater = RequirementsUpdater {
            requirements: &records,
            existing_version: Some(&existing),
            latest_version: Some(&latest),
            latest_resolvable_version: Some(&resolvable),
        };

        let updated = updater.updated_requirements(|record| {
            RequirementStyle::for_record(record, record.file.ends_with(".gemspec"))
        });
        let constraints: Vec<Option<&str>> = updated.iter().map(RequirementRecord::constraint).collect();
        assert_eq!(
            constraints,
            vec![Some("~> 1.5.0"), Some(">= 1.0, < 1.9"), Some("= 1.8.0"), None]
        );
    }
}
