//! Surgical package.json edits.

use bump_core::editor::{RegexGrammar, update_declaration};
use bump_core::{Result, UpdateError};
use regex::Regex;
use std::sync::LazyLock;

pub const PACKAGE_JSON: &str = "package.json";
pub const YARN_LOCK: &str = "yarn.lock";

static SECTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#""(?P<section>dependencies|devDependencies|peerDependencies|optionalDependencies)"\s*:\s*\{(?P<body>[^{}]*)\}"#,
    )
    .ok()
});

/// `"name": "requirement"` inside a section body
static ENTRY: LazyLock<Option<RegexGrammar>> = LazyLock::new(|| {
    Regex::new(r#""(?P<name>[^"]+)"\s*:\s*"(?P<requirements>[^"]*)""#)
        .ok()
        .map(RegexGrammar::new)
});

fn grammar_error() -> UpdateError {
    UpdateError::not_evaluatable("invalid package.json grammar")
}

/// Rewrite the requirement of `name` in every dependency section, computing
/// each new requirement from the old one. `None` when nothing changed.
pub fn update_package_json<F>(content: &str, name: &str, mut rewrite: F) -> Result<Option<String>>
where
    F: FnMut(&str) -> Option<String>,
{
    let section = SECTION.as_ref().ok_or_else(grammar_error)?;
    let entry = ENTRY.as_ref().ok_or_else(grammar_error)?;

    let bodies: Vec<_> = section
        .captures_iter(content)
        .filter_map(|caps| caps.name("body").map(|m| m.range()))
        .collect();

    let mut updated = content.to_string();
    for body in bodies.iter().rev() {
        if let Some(new_body) = update_declaration(&content[body.clone()], name, entry, &mut rewrite) {
            updated.replace_range(body.clone(), &new_body);
        }
    }
    Ok((updated != content).then_some(updated))
}
