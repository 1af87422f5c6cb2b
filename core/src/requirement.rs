//! Shared constraint grammar: `op version` terms joined by commas.
//!
//! Every ecosystem handled here writes requirements as a comma separated
//! list of `operator version` terms. The operator set is the union of the
//! RubyGems, PEP 440, npm and Cargo spellings.

use crate::version::{Version, VersionError};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equal,
    /// `==`
    DoubleEqual,
    /// `===`
    ArbitraryEqual,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `~>`
    Pessimistic,
    /// `~=`
    Compatible,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// No operator at all (`1.2.3`)
    Bare,
}

/// Operator spellings, longest first so prefixes don't shadow each other
const OPERATORS: [(&str, Operator); 12] = [
    ("===", Operator::ArbitraryEqual),
    ("==", Operator::DoubleEqual),
    ("!=", Operator::NotEqual),
    (">=", Operator::GreaterThanOrEqual),
    ("<=", Operator::LessThanOrEqual),
    ("~>", Operator::Pessimistic),
    ("~=", Operator::Compatible),
    ("=", Operator::Equal),
    (">", Operator::GreaterThan),
    ("<", Operator::LessThan),
    ("^", Operator::Caret),
    ("~", Operator::Tilde),
];

impl Operator {
    pub fn as_str(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op)| *op == self)
            .map_or("", |(text, _)| *text)
    }

    /// Split a leading operator off `input`
    pub fn split_prefix(input: &str) -> (Self, &str) {
        let input = input.trim_start();
        for (text, op) in &OPERATORS {
            if let Some(rest) = input.strip_prefix(text) {
                return (*op, rest.trim_start());
            }
        }
        (Operator::Bare, input)
    }

    pub fn is_upper_bound(self) -> bool {
        matches!(self, Operator::LessThan | Operator::LessThanOrEqual)
    }

    pub fn is_lower_bound(self) -> bool {
        matches!(self, Operator::GreaterThan | Operator::GreaterThanOrEqual)
    }

    pub fn is_exact(self) -> bool {
        matches!(
            self,
            Operator::Equal | Operator::DoubleEqual | Operator::ArbitraryEqual | Operator::Bare
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `operator version` term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub operator: Operator,
    pub version: Version,
}

impl Constraint {
    pub fn new(operator: Operator, version: Version) -> Self {
        Self { operator, version }
    }

    /// Check whether `version` satisfies this term
    pub fn satisfied_by(&self, version: &Version) -> bool {
        let target = &self.version;
        match self.operator {
            Operator::Equal | Operator::DoubleEqual | Operator::Bare => version == target,
            Operator::ArbitraryEqual => version.original == target.original,
            Operator::NotEqual => version != target,
            Operator::GreaterThan => version > target,
            Operator::GreaterThanOrEqual => version >= target,
            Operator::LessThan => version < target,
            Operator::LessThanOrEqual => version <= target,
            Operator::Pessimistic | Operator::Compatible => {
                version >= target && version.release() < pessimistic_ceiling(target)
            }
            Operator::Caret => version >= target && version.release() < caret_ceiling(target),
            Operator::Tilde => {
                let ceiling = if target.precision() >= 2 {
                    Version::from_segments(&[target.major(), target.minor() + 1])
                } else {
                    Version::from_segments(&[target.major() + 1])
                };
                version >= target && version.release() < ceiling
            }
        }
    }
}

/// Exclusive upper bound of `~> v` / `~= v`: drop the last segment, then
/// increment the new last one
fn pessimistic_ceiling(version: &Version) -> Version {
    let mut segments = version.segments.clone();
    if segments.len() > 1 {
        segments.pop();
    }
    if let Some(last) = segments.last_mut() {
        *last += 1;
    }
    Version::from_segments(&segments)
}

/// Exclusive upper bound of `^v`: increment the first non-zero segment
fn caret_ceiling(version: &Version) -> Version {
    let segments = &version.segments;
    let index = segments
        .iter()
        .position(|segment| *segment != 0)
        .unwrap_or(segments.len().saturating_sub(1));
    let mut ceiling: Vec<u64> = segments[..=index].to_vec();
    ceiling[index] += 1;
    Version::from_segments(&ceiling)
}

impl FromStr for Constraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (operator, rest) = Operator::split_prefix(s.trim());
        let version = Version::from_str(rest)
            .map_err(|_| VersionError::InvalidRequirement(s.trim().to_string()))?;
        Ok(Self { operator, version })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Bare => write!(f, "{}", self.version),
            op => write!(f, "{op} {}", self.version),
        }
    }
}

/// Parse a comma separated requirement string. An empty string is the
/// empty constraint set, which every version satisfies.
pub fn parse_requirement(requirement: &str) -> Result<Vec<Constraint>, VersionError> {
    requirement
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(Constraint::from_str)
        .collect()
}

pub fn satisfies_all(constraints: &[Constraint], version: &Version) -> bool {
    constraints.iter().all(|constraint| constraint.satisfied_by(version))
}

/// Render the constraint set the way RubyGems would: `>= 1.0, < 2.0`
pub fn join_constraints(constraints: &[Constraint]) -> String {
    constraints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
