use bump_core::{Result, Version};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct Lockfile {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
}

/// Highest version of `name` in a Cargo.lock. A crate can be locked at
/// several versions when different dependents need incompatible ones.
pub fn locked_version(lockfile: &str, name: &str) -> Result<Option<Version>> {
    let lockfile: Lockfile = toml::from_str(lockfile)?;
    Ok(lockfile
        .package
        .iter()
        .filter(|package| package.name == name)
        .filter_map(|package| Version::from_str(&package.version).ok())
        .max())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKFILE: &str = r#"# This file is automatically @generated by Cargo.
version = 4

[[package]]
name = "example"
version = "0.1.0"
dependencies = ["serde 1.0.200", "serde 0.9.15"]

[[package]]
name = "serde"
version = "0.9.15"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "serde"
version = "1.0.200"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;

    #[test]
    fn test_highest_locked_version() {
        assert_eq!(
            locked_version(LOCKFILE, "serde").unwrap(),
            Some(Version::new(1, 0, 200))
        );
        assert_eq!(locked_version(LOCKFILE, "tokio").unwrap(), None);
    }

    #[test]
    fn test_invalid_lockfile() {
        assert!(locked_version("[[package]\n", "serde").is_err());
    }
}
