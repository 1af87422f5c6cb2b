//! Span-based manifest editing.
//!
//! Manifests are edited in place: the declaration of the target dependency
//! is located with an ecosystem grammar and only the requirement text
//! inside it is replaced. Everything else in the file, down to whitespace
//! and comments, is left byte-for-byte intact.

use regex::Regex;
use std::ops::Range;

/// Ecosystem-specific shape of a dependency declaration.
///
/// The pattern must capture the declared package in a group called `name`
/// and may capture the requirement text in a group called `requirements`.
pub trait DeclarationGrammar {
    fn pattern(&self) -> &Regex;

    /// Whether a declared name refers to the dependency being updated
    fn name_matches(&self, declared: &str, dependency: &str) -> bool {
        declared == dependency
    }
}

/// Grammar defined by a single regex with exact name matching
#[derive(Debug, Clone)]
pub struct RegexGrammar {
    pattern: Regex,
}

impl RegexGrammar {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl DeclarationGrammar for RegexGrammar {
    fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

/// Location of one declaration in a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub span: Range<usize>,
    pub name_span: Range<usize>,
    pub requirement_span: Option<Range<usize>>,
}

impl Declaration {
    pub fn text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.span.clone()]
    }

    pub fn requirement<'a>(&self, content: &'a str) -> Option<&'a str> {
        self.requirement_span.clone().map(|span| &content[span])
    }
}

/// Every declaration of `name` in `content`
pub fn locate_declarations<G>(content: &str, name: &str, grammar: &G) -> Vec<Declaration>
where
    G: DeclarationGrammar + ?Sized,
{
    grammar
        .pattern()
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let declared = caps.name("name")?;
            if !grammar.name_matches(declared.as_str(), name) {
                return None;
            }
            Some(Declaration {
                span: whole.range(),
                name_span: declared.range(),
                requirement_span: caps
                    .name("requirements")
                    .filter(|m| !m.as_str().trim().is_empty())
                    .map(|m| m.range()),
            })
        })
        .collect()
}

/// First declaration of `name`, if any
pub fn locate_declaration<G>(content: &str, name: &str, grammar: &G) -> Option<Declaration>
where
    G: DeclarationGrammar + ?Sized,
{
    locate_declarations(content, name, grammar).into_iter().next()
}

/// Replace a declaration's requirement text. A declaration without a
/// requirement leaves the content unchanged.
pub fn replace_requirement(content: &str, declaration: &Declaration, requirement: &str) -> String {
    match &declaration.requirement_span {
        Some(span) => {
            let mut updated = String::with_capacity(content.len() + requirement.len());
            updated.push_str(&content[..span.start]);
            updated.push_str(requirement);
            updated.push_str(&content[span.end..]);
            updated
        }
        None => content.to_string(),
    }
}

/// Rewrite the first declaration of `name`, computing the new requirement
/// text from the old one. Later declarations (say, inside a conditional
/// block) are left as written. `None` when nothing changed.
pub fn update_declaration<G, F>(content: &str, name: &str, grammar: &G, rewrite: F) -> Option<String>
where
    G: DeclarationGrammar + ?Sized,
    F: FnOnce(&str) -> Option<String>,
{
    let declaration = locate_declaration(content, name, grammar)?;
    let new = rewrite(declaration.requirement(content)?)?;
    let updated = replace_requirement(content, &declaration, &new);
    (updated != content).then_some(updated)
}

/// Rewrite every declaration of `name`, computing the new requirement text
/// from the old one. Returns `None` when nothing changed.
pub fn update_declarations<G, F>(content: &str, name: &str, grammar: &G, mut rewrite: F) -> Option<String>
where
    G: DeclarationGrammar + ?Sized,
    F: FnMut(&str) -> Option<String>,
{
    let declarations = locate_declarations(content, name, grammar);
    let mut updated = content.to_string();

    // Back to front so earlier spans stay valid
    for declaration in declarations.iter().rev() {
        let Some(old) = declaration.requirement(content) else {
            continue;
        };
        if let Some(new) = rewrite(old) {
            updated = replace_requirement(&updated, declaration, &new);
        }
    }

    (updated != content).then_some(updated)
}

/// Quote character an existing requirement list uses: single if the
/// original contains one, double otherwise
pub fn quote_character(original: &str) -> char {
    if original.contains('\'') { '\'' } else { '"' }
}

/// `>= 1.0, < 2.0` as `">= 1.0", "< 2.0"` (or single quoted)
pub fn quoted_requirement_list(requirement: &str, quote: char) -> String {
    requirement
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| format!("{quote}{part}{quote}"))
        .collect::<Vec<_>>()
        .join(", ")
}
