//! Format-preserving Cargo.toml edits.

use bump_core::{Result, UpdateError};
use toml_edit::{DocumentMut, Formatted, Item, TableLike, Value};

pub const CARGO_TOML: &str = "Cargo.toml";
pub const CARGO_LOCK: &str = "Cargo.lock";

const DEPENDENCY_TABLES: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

fn parse(content: &str) -> Result<DocumentMut> {
    content
        .parse::<DocumentMut>()
        .map_err(|e| UpdateError::not_evaluatable(format!("Cargo.toml is not valid TOML: {e}")))
}

/// Visit every dependency table: the top-level ones, `[workspace.dependencies]`
/// and the per-target ones
fn for_each_dependency_table<F>(doc: &mut DocumentMut, mut f: F)
where
    F: FnMut(&mut dyn TableLike),
{
    for section in DEPENDENCY_TABLES {
        if let Some(table) = doc.get_mut(section).and_then(Item::as_table_like_mut) {
            f(table);
        }
    }

    if let Some(table) = doc
        .get_mut("workspace")
        .and_then(|workspace| workspace.get_mut("dependencies"))
        .and_then(Item::as_table_like_mut)
    {
        f(table);
    }

    if let Some(targets) = doc.get_mut("target").and_then(Item::as_table_like_mut) {
        for (_, target) in targets.iter_mut() {
            for section in DEPENDENCY_TABLES {
                if let Some(table) = target.get_mut(section).and_then(Item::as_table_like_mut) {
                    f(table);
                }
            }
        }
    }
}

/// Crate an entry refers to: the key, unless renamed with `package`
fn declared_name<'a>(key: &'a str, item: &'a Item) -> &'a str {
    item.get("package").and_then(Item::as_str).unwrap_or(key)
}

/// The version string of a dependency entry, in any of its three forms
fn version_value(item: &mut Item) -> Option<&mut Formatted<String>> {
    match item {
        // serde = "1.0"
        Item::Value(Value::String(s)) => Some(s),
        // serde = { version = "1.0", ... }
        Item::Value(Value::InlineTable(table)) => match table.get_mut("version") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        // [dependencies.serde] version = "1.0"
        Item::Table(table) => match table.get_mut("version") {
            Some(Item::Value(Value::String(s))) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Rewrite the requirement of every entry for crate `name`, computing each
/// new requirement from the old one. Comments and formatting around the
/// value are kept. `None` when nothing changed.
pub fn update_manifest<F>(content: &str, name: &str, mut rewrite: F) -> Result<Option<String>>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut doc = parse(content)?;
    let mut changed = false;

    for_each_dependency_table(&mut doc, |table| {
        for (key, item) in table.iter_mut() {
            if declared_name(key.get(), item) != name {
                continue;
            }
            let Some(value) = version_value(item) else {
                continue;
            };
            let old = value.value().clone();
            if let Some(new) = rewrite(&old).filter(|new| *new != old) {
                let decor = value.decor().clone();
                let mut replacement = Formatted::new(new);
                *replacement.decor_mut() = decor;
                *value = replacement;
                changed = true;
            }
        }
    });

    Ok(changed.then(|| doc.to_string()))
}

/// Manifest with every requirement on `name` replaced by `*`, so the
/// resolver is free to pick any version
pub fn relaxed_manifest(content: &str, name: &str) -> Result<String> {
    Ok(update_manifest(content, name, |_| Some("*".to_string()))?.unwrap_or_else(|| content.to_string()))
}

/// `(crate, path)` for every path dependency
pub fn path_dependencies(content: &str) -> Result<Vec<(String, String)>> {
    let mut doc = parse(content)?;
    let mut paths = Vec::new();
    for_each_dependency_table(&mut doc, |table| {
        for (key, item) in table.iter_mut() {
            if let Some(path) = item.get("path").and_then(Item::as_str) {
                paths.push((declared_name(key.get(), item).to_string(), path.to_string()));
            }
        }
    });
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"[package]
name = "example"
version = "0.1.0"

[dependencies]
serde = { version = "1.0.100", features = ["derive"] } # serialization
tokio = "1.0"
json = { package = "serde_json", version = "1.0" }
local = { path = "crates/local" }

[dev-dependencies.serde]
version = "1.0.100"

[target.'cfg(unix)'.dependencies]
serde = "1.0"
"#;

    #[test]
    fn test_update_every_form() {
        let updated = update_manifest(MANIFEST, "serde", |_| Some("1.0.200".to_string()))
            .unwrap()
            .unwrap();
        assert!(updated.contains(r#"serde = { version = "1.0.200", features = ["derive"] } # serialization"#));
        assert!(updated.contains("[dev-dependencies.serde]\nversion = \"1.0.200\"\n"));
        assert!(updated.contains("[target.'cfg(unix)'.dependencies]\nserde = \"1.0.200\"\n"));
        assert!(updated.contains("tokio = \"1.0\"\n"));
    }

    #[test]
    fn test_renamed_dependency() {
        let updated = update_manifest(MANIFEST, "serde_json", |_| Some("1.0.120".to_string()))
            .unwrap()
            .unwrap();
        assert!(updated.contains(r#"json = { package = "serde_json", version = "1.0.120" }"#));
        assert!(update_manifest(MANIFEST, "json", |_| Some("2.0".to_string())).unwrap().is_none());
    }

    #[test]
    fn test_unchanged_requirement() {
        assert!(update_manifest(MANIFEST, "tokio", |old| Some(old.to_string())).unwrap().is_none());
    }

    #[test]
    fn test_relaxed_manifest() {
        let relaxed = relaxed_manifest(MANIFEST, "tokio").unwrap();
        assert!(relaxed.contains("tokio = \"*\"\n"));
    }

    #[test]
    fn test_path_dependencies() {
        assert_eq!(
            path_dependencies(MANIFEST).unwrap(),
            vec![("local".to_string(), "crates/local".to_string())]
        );
    }

    #[test]
    fn test_invalid_manifest() {
        assert!(matches!(
            update_manifest("[dependencies\n", "serde", |_| None),
            Err(UpdateError::DependencyFileNotEvaluatable { .. })
        ));
    }
}
