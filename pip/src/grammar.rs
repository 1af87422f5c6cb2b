//! requirements.txt line grammar.
//!
//! A requirement line is a project name, optional extras, an optional
//! comma separated comparison list, an optional environment marker and an
//! optional trailing comment:
//!
//! ```text
//! luigi[toml, s3] == 2.0.0, != 2.0.1 ; python_version >= "3.6"  # pinned
//! ```

use bump_core::editor::DeclarationGrammar;
use regex::Regex;
use std::sync::LazyLock;

pub const REQUIREMENTS_TXT: &str = "requirements.txt";

const NAME: &str = r"[A-Za-z0-9][A-Za-z0-9\-_.]*";
const COMPARISON: &str = r"===|==|>=|<=|<|>|~=|!=";
const VERSION: &str = r"[A-Za-z0-9\-_.*+!]+";

/// One comparison, e.g. `>= 2.0`
pub static REQUIREMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(r"(?P<comparison>{COMPARISON})[ \t]*(?P<version>{VERSION})")).ok()
});

static REQUIREMENT_LINE: LazyLock<Option<RequirementLineGrammar>> = LazyLock::new(|| {
    let requirement = format!(r"(?:{COMPARISON})[ \t]*{VERSION}");
    let pattern = format!(
        r"(?m)^[ \t]*(?P<name>{NAME})[ \t]*(?:\[[ \t]*(?P<extras>{NAME}(?:[ \t]*,[ \t]*{NAME})*)[ \t]*\])?[ \t]*(?P<requirements>{requirement}(?:[ \t]*,[ \t]*{requirement})*)?(?P<marker>[ \t]*;[^#\n]*)?(?:[ \t]*#+[ \t]*(?P<comment>[^\n]*))?[ \t]*\r?$"
    );
    Regex::new(&pattern).ok().map(|pattern| RequirementLineGrammar { pattern })
});

/// Requirement line grammar with PEP 503 name matching: case, `-`, `_`
/// and `.` are not significant
#[derive(Debug, Clone)]
pub struct RequirementLineGrammar {
    pattern: Regex,
}

impl RequirementLineGrammar {
    pub fn get() -> Option<&'static Self> {
        REQUIREMENT_LINE.as_ref()
    }
}

impl DeclarationGrammar for RequirementLineGrammar {
    fn pattern(&self) -> &Regex {
        &self.pattern
    }

    fn name_matches(&self, declared: &str, dependency: &str) -> bool {
        normalize_name(declared) == normalize_name(dependency)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace(['_', '.'], "-")
}

/// `(comparison, version)` pairs of a comparison list
pub fn comparisons(requirements: &str) -> Vec<(&str, &str)> {
    let Some(re) = REQUIREMENT.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(requirements)
        .filter_map(|caps| {
            let comparison = caps.name("comparison")?.as_str();
            let version = caps.name("version")?.as_str();
            Some((comparison, version))
        })
        .collect()
}
