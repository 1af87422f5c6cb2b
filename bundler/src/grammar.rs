//! Gemfile and gemspec declaration grammars.

use bump_core::editor::{RegexGrammar, locate_declarations};
use bump_core::{DependencyFile, Result, UpdateError};
use regex::Regex;
use std::sync::LazyLock;

pub const GEMFILE: &str = "Gemfile";
pub const LOCKFILE: &str = "Gemfile.lock";
pub const RUBY_VERSION_FILE: &str = ".ruby-version";

/// `gem "name", "req", "req", options...`
static GEM_CALL: LazyLock<Option<RegexGrammar>> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*gem[ \t(]+["'](?P<name>[^"']+)["'](?:[ \t]*,[ \t]*(?P<requirements>["'][^"']*["'](?:[ \t]*,[ \t]*["'][^"']*["'])*))?(?P<options>[^\n#]*)"#,
    )
    .ok()
    .map(RegexGrammar::new)
});

/// `spec.add_dependency "name", "req", ...` and its runtime/development forms
static GEMSPEC_DEPENDENCY: LazyLock<Option<RegexGrammar>> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*\w*\.add(?:_development|_runtime)?_dependency(?:[ \t]*|\()[ \t]*['"](?P<name>[^'"]*?)['"](?:[ \t]*,[ \t]*(?P<requirements>["'][^"']*["'](?:[ \t]*,[ \t]*["'][^"']*["'])*))?"#,
    )
    .ok()
    .map(RegexGrammar::new)
});

/// git source options of a gem call
static GIT_OPTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"[ \t]*,[ \t]*(?::(?:git|github|branch|ref|tag)[ \t]*=>|(?:git|github|branch|ref|tag):)[ \t]*["'][^"']*["']"#).ok()
});

static GEMFILE_GIT_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?:git:|:git[ \t]*=>)[ \t]*["'](?P<url>[^"']+)["']|(?:github:|:github[ \t]*=>)[ \t]*["'](?P<repo>[^"']+)["']"#).ok()
});

static GEMFILE_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?:path:|:path[ \t]*=>)[ \t]*["'](?P<path>[^"']+)["']"#).ok());

fn compiled<T>(grammar: Option<&'static T>, what: &str) -> Result<&'static T> {
    grammar.ok_or_else(|| UpdateError::not_evaluatable(format!("invalid {what} grammar")))
}

pub fn gemfile_grammar() -> Result<&'static RegexGrammar> {
    compiled(GEM_CALL.as_ref(), "Gemfile")
}

pub fn gemspec_grammar() -> Result<&'static RegexGrammar> {
    compiled(GEMSPEC_DEPENDENCY.as_ref(), "gemspec")
}

pub fn is_gemspec(name: &str) -> bool {
    name.ends_with(".gemspec")
}

/// Grammar for a file by name
pub fn grammar_for(file_name: &str) -> Result<&'static RegexGrammar> {
    if is_gemspec(file_name) {
        gemspec_grammar()
    } else {
        gemfile_grammar()
    }
}

/// Strip git source options from every `gem` call for `name`
pub fn remove_git_source(content: &str, name: &str) -> Result<String> {
    let grammar = gemfile_grammar()?;
    let option = compiled(GIT_OPTION.as_ref(), "git option")?;
    let mut updated = content.to_string();
    for declaration in locate_declarations(content, name, grammar).iter().rev() {
        let original = declaration.text(content);
        let stripped = option.replace_all(original, "");
        updated.replace_range(declaration.span.clone(), &stripped);
    }
    Ok(updated)
}

/// Git remotes named by a Gemfile (`git:` and `github:` options) or a
/// lockfile (`remote:` lines of `GIT` sections)
pub fn git_source_urls(files: &[DependencyFile]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for file in files {
        if file.name == LOCKFILE {
            urls.extend(lockfile_section_remotes(&file.content, "GIT"));
        } else if file.name == GEMFILE
            && let Some(re) = GEMFILE_GIT_URL.as_ref()
        {
            for caps in re.captures_iter(&file.content) {
                if let Some(url) = caps.name("url") {
                    urls.push(url.as_str().to_string());
                } else if let Some(repo) = caps.name("repo") {
                    urls.push(format!("https://github.com/{}.git", repo.as_str()));
                }
            }
        }
    }
    urls.sort();
    urls.dedup();
    urls
}

/// Local paths named by a Gemfile `path:` option or a lockfile `PATH`
/// section
pub fn path_sources(files: &[DependencyFile]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for file in files {
        if file.name == LOCKFILE {
            paths.extend(lockfile_section_remotes(&file.content, "PATH"));
        } else if file.name == GEMFILE
            && let Some(re) = GEMFILE_PATH.as_ref()
        {
            paths.extend(re.captures_iter(&file.content).map(|caps| caps["path"].to_string()));
        }
    }
    paths.sort();
    paths.dedup();
    paths
}

fn lockfile_section_remotes(content: &str, section: &str) -> Vec<String> {
    let mut remotes = Vec::new();
    let mut in_section = false;
    for line in content.lines() {
        if !line.starts_with(' ') {
            in_section = line.trim() == section;
            continue;
        }
        if in_section && let Some(remote) = line.trim().strip_prefix("remote:") {
            remotes.push(remote.trim().to_string());
        }
    }
    remotes
}
