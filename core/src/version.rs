use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version string: {0}")]
    InvalidVersion(String),
    #[error("Invalid version requirement: {0}")]
    InvalidRequirement(String),
}

/// A parsed version with any number of numeric release segments.
///
/// Ecosystems disagree on how many segments a version has (`17.10`,
/// `1.5.0`, `1.1.0.1`), so the segments are kept exactly as written.
/// Comparison pads the shorter side with zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Numeric release segments in the order written
    pub segments: Vec<u64>,
    /// Pre-release marker (`beta`, `rc1`, `a1`, ...)
    pub pre_release: Option<String>,
    /// Local version segment (Python) or build metadata (npm, Cargo)
    pub local: Option<String>,
    /// Original string representation
    pub original: String,
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self::from_segments(&[major, minor, patch])
    }

    /// Build a release version from raw segments
    pub fn from_segments(segments: &[u64]) -> Self {
        Self {
            segments: segments.to_vec(),
            pre_release: None,
            local: None,
            original: join_segments(segments),
        }
    }

    /// Check if this is a pre-release version
    pub fn is_prerelease(&self) -> bool {
        self.pre_release.is_some()
    }

    /// Number of numeric components as the author wrote them
    pub fn precision(&self) -> usize {
        self.segments.len()
    }

    /// Segment at `index`, treating missing trailing segments as zero
    pub fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }

    pub fn major(&self) -> u64 {
        self.segment(0)
    }

    pub fn minor(&self) -> u64 {
        self.segment(1)
    }

    pub fn patch(&self) -> u64 {
        self.segment(2)
    }

    /// The release part of this version, without pre-release or local parts
    pub fn release(&self) -> Version {
        Self::from_segments(&self.segments)
    }

    /// Leading `precision` release segments. Never pads: a shorter version
    /// stays shorter.
    pub fn truncated(&self, precision: usize) -> Version {
        let count = precision.min(self.segments.len()).max(1);
        Self::from_segments(&self.segments[..count.min(self.segments.len())])
    }
}

pub(crate) fn join_segments(segments: &[u64]) -> String {
    segments
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || VersionError::InvalidVersion(s.to_string());

        if s.contains('*') {
            return Err(invalid());
        }

        // Handle local version separator (+)
        let (version_part, local) = match s.split_once('+') {
            Some((version, local)) => (version, Some(local.to_string())),
            None => (s, None),
        };

        let mut segments = Vec::new();
        let mut pre_release = None;
        let mut rest = version_part;

        loop {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                if !rest.is_empty() {
                    pre_release = Some(rest.to_string());
                }
                break;
            }

            segments.push(rest[..digits].parse::<u64>().map_err(|_| invalid())?);

            let after = &rest[digits..];
            if after.is_empty() {
                break;
            }

            match after.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                Some(next) if !next.is_empty() => {
                    // 1.5.0.beta
                    pre_release = Some(next.to_string());
                    break;
                }
                Some(_) => return Err(invalid()),
                None => {
                    // 1.2.3-rc1, 1.0a1, 2.0rc2
                    let marker = after.trim_start_matches(['-', '_']);
                    if marker.is_empty() {
                        return Err(invalid());
                    }
                    pre_release = Some(marker.to_string());
                    break;
                }
            }
        }

        if segments.is_empty() {
            return Err(invalid());
        }

        Ok(Version {
            segments,
            pre_release,
            local,
            original: s.to_string(),
        })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Version::from_str(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.original
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for index in 0..len {
            match self.segment(index).cmp(&other.segment(index)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        // Pre-release versions are less than release versions
        match (&self.pre_release, &other.pre_release) {
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
            (None, None) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}
