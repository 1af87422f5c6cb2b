//! Dockerfile `FROM` lines: `FROM [--platform=..] [registry/]image[:tag][@digest] [AS stage]`

use bump_core::ImageSource;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

pub const DOCKERFILE: &str = "Dockerfile";

static FROM_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*FROM[ \t]+(?:--platform=\S+[ \t]+)?(?:(?P<registry>[\w-]+(?:\.[\w-]+)+(?::\d+)?|[\w-]+:\d+|localhost)/)?(?P<image>[a-z0-9][\w.-]*(?:/[\w.-]+)*)(?::(?P<tag>[\w][\w.-]*))?(?:@(?P<digest>sha256:[0-9a-fA-F]+))?(?:[ \t]+AS[ \t]+\S+)?[ \t]*\r?$",
    )
    .ok()
});

/// One image reference in a Dockerfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromLine {
    pub registry: Option<String>,
    pub image: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
    tag_span: Option<Range<usize>>,
    digest_span: Option<Range<usize>>,
}

impl FromLine {
    pub fn source(&self) -> ImageSource {
        ImageSource {
            registry: self.registry.clone(),
            tag: self.tag.clone(),
            digest: self.digest.clone(),
        }
    }
}

/// Every `FROM` line in `content`
pub fn from_lines(content: &str) -> Vec<FromLine> {
    let Some(re) = FROM_LINE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|caps| {
            let image = caps.name("image")?;
            let tag = caps.name("tag");
            let digest = caps.name("digest");
            Some(FromLine {
                registry: caps.name("registry").map(|m| m.as_str().to_string()),
                image: image.as_str().to_string(),
                tag: tag.map(|m| m.as_str().to_string()),
                digest: digest.map(|m| m.as_str().to_string()),
                tag_span: tag.map(|m| m.range()),
                digest_span: digest.map(|m| m.range()),
            })
        })
        .collect()
}

/// Move every `FROM` of `image` pinned at `previous` to `updated`. Only
/// the tag and digest text change. `None` when no line was pinned at
/// `previous`.
pub fn update_dockerfile(content: &str, image: &str, previous: &ImageSource, updated: &ImageSource) -> Option<String> {
    let mut replacements: Vec<(Range<usize>, &str)> = Vec::new();
    for line in from_lines(content) {
        if line.image != image || line.registry != previous.registry {
            continue;
        }
        if line.tag != previous.tag || line.digest != previous.digest {
            continue;
        }
        if let (Some(span), Some(tag)) = (line.tag_span, updated.tag.as_deref()) {
            replacements.push((span, tag));
        }
        if let (Some(span), Some(digest)) = (line.digest_span, updated.digest.as_deref()) {
            replacements.push((span, digest));
        }
    }

    // Back to front so earlier spans stay valid
    replacements.sort_by_key(|(span, _)| std::cmp::Reverse(span.start));
    let mut result = content.to_string();
    for (span, text) in replacements {
        result.replace_range(span, text);
    }
    (result != content).then_some(result)
}
