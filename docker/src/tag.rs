//! Version-shaped image tags.

use bump_core::Version;
use regex::Regex;
use std::sync::LazyLock;

static VERSION_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>v?)(?P<version>\d+(?:\.\d+)*)(?P<suffix>[-_.+]?[A-Za-z][\w.-]*|-\d[\w.-]*)?$").ok()
});

/// The parts of a tag two comparable tags must agree on: `v` prefix,
/// number of release segments and suffix. `3.6.3-slim` and `3.7.1-slim`
/// share a shape, `3.6.3` and `3.7` don't, nor do `17.10` and `18.04-rc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagShape {
    pub prefix: String,
    pub precision: usize,
    pub suffix: String,
}

/// A tag that reads as a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    pub tag: String,
    pub shape: TagShape,
    pub version: Version,
}

impl VersionTag {
    pub fn parse(tag: &str) -> Option<Self> {
        let caps = VERSION_TAG.as_ref()?.captures(tag)?;
        let segments = caps["version"]
            .split('.')
            .map(str::parse)
            .collect::<Result<Vec<u64>, _>>()
            .ok()?;

        let shape = TagShape {
            prefix: caps["prefix"].to_string(),
            precision: segments.len(),
            suffix: caps.name("suffix").map(|m| m.as_str().to_string()).unwrap_or_default(),
        };
        // Written the way the tag is, so the version prints as the tag
        let version = Version {
            original: tag.to_string(),
            ..Version::from_segments(&segments)
        };
        Some(Self {
            tag: tag.to_string(),
            shape,
            version,
        })
    }
}

/// Newest of `tags` shaped like `current`. `None` when `current` isn't
/// version-shaped (`latest`, `bionic`).
pub fn latest_matching<'a, I>(current: &str, tags: I) -> Option<VersionTag>
where
    I: IntoIterator<Item = &'a str>,
{
    let current = VersionTag::parse(current)?;
    tags.into_iter()
        .filter_map(VersionTag::parse)
        .filter(|candidate| candidate.shape == current.shape)
        .max_by(|a, b| a.version.cmp(&b.version))
}
