//! Runs `cargo update` inside a sandbox and hands back the lockfile it
//! wrote.

use crate::errors::classify;
use crate::manifest::{CARGO_LOCK, CARGO_TOML, path_dependencies};
use bump_core::credentials::{authenticated_url, scrub};
use bump_core::sandbox::{IsolatedCommand, SandboxSession, run_isolated};
use bump_core::{DependencyFile, Result, StrategyContext, UpdateError};
use tracing::{debug, info};

/// Empty crate root so cargo accepts the manifest
const STUB_LIB: &str = "src/lib.rs";

/// `{dir}/{name}` with `./` segments dropped
fn join(dir: &str, name: &str) -> String {
    dir.split('/')
        .chain(name.split('/'))
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Fail early on path dependencies whose manifests weren't provided
fn check_path_dependencies(context: &StrategyContext, manifest: &str) -> Result<()> {
    let missing: Vec<String> = path_dependencies(manifest)?
        .into_iter()
        .filter(|(_, path)| context.file(&join(path, CARGO_TOML)).is_none())
        .map(|(name, _)| name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(UpdateError::PathDependenciesNotReachable { dependencies: missing })
    }
}

/// Copies of the dependency files, with `manifest` standing in for the
/// root Cargo.toml and a stub crate root for every manifest that has none
fn sandbox_files(context: &StrategyContext, manifest: &str) -> Vec<DependencyFile> {
    let mut files: Vec<DependencyFile> = context
        .dependency_files
        .iter()
        .map(|file| {
            if file.name == CARGO_TOML {
                file.with_content(manifest)
            } else {
                file.clone()
            }
        })
        .collect();

    let stubs: Vec<DependencyFile> = files
        .iter()
        .filter(|file| file.file_name() == CARGO_TOML)
        .map(|file| join(file.directory().trim_start_matches('/'), STUB_LIB))
        .filter(|stub| !files.iter().any(|file| file.name == *stub))
        .map(|stub| DependencyFile::new(stub, ""))
        .collect();
    files.extend(stubs);
    files
}

/// Route https git fetches for credentialed hosts through token-bearing
/// URLs. Set on the child only.
fn with_git_credentials(mut command: IsolatedCommand, context: &StrategyContext) -> IsolatedCommand {
    let mut count = 0;
    for credential in &context.credentials {
        let base = format!("https://{}/", credential.host);
        let authenticated = authenticated_url(&base, &context.credentials);
        if authenticated == base {
            continue;
        }
        command = command
            .env(format!("GIT_CONFIG_KEY_{count}"), format!("url.{authenticated}.insteadOf"))
            .env(format!("GIT_CONFIG_VALUE_{count}"), base);
        count += 1;
    }
    command
        .env("GIT_CONFIG_COUNT", count.to_string())
        .env("CARGO_NET_GIT_FETCH_WITH_CLI", "true")
        .env("CARGO_TERM_COLOR", "never")
}

/// Run `cargo update <args>` against `manifest` and the other dependency
/// files, returning the resulting Cargo.lock with credentials scrubbed
pub async fn run_cargo_update(context: &StrategyContext, manifest: &str, args: &[String]) -> Result<String> {
    check_path_dependencies(context, manifest)?;

    let session = SandboxSession::create(&context.config.sandbox)?;
    debug!(dir = %session.path().display(), "created sandbox session for cargo update");

    let result = async {
        session.write_files(&sandbox_files(context, manifest)).await?;
        let command = session
            .command(context.config.helpers.cargo.clone())
            .arg("update")
            .args(args);
        let command = with_git_credentials(command, context);
        run_isolated(&command)
            .await
            .map_err(|err| classify(err, &context.credentials))?;
        session.read_file(CARGO_LOCK).await
    }
    .await;
    session.close()?;

    let lockfile = result?;
    info!(dependency = %context.dependency.name, "cargo update finished");
    Ok(scrub(&lockfile, &context.credentials))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bump_core::{Config, Dependency, PackageManager};
    use std::sync::Arc;

    fn context(files: Vec<DependencyFile>) -> StrategyContext {
        StrategyContext::new(
            Dependency::new("serde", PackageManager::Cargo),
            files,
            Vec::new(),
            Arc::new(Config::default()),
        )
    }

    #[test]
    fn test_stub_crate_roots() {
        let context = context(vec![
            DependencyFile::new("Cargo.toml", "[package]\nname = \"app\"\n"),
            DependencyFile::new("crates/local/Cargo.toml", "[package]\nname = \"local\"\n"),
            DependencyFile::new("crates/local/src/lib.rs", "pub fn f() {}\n"),
        ]);
        let files = sandbox_files(&context, "relaxed");
        let names: Vec<&str> = files.iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, vec!["Cargo.toml", "crates/local/Cargo.toml", "crates/local/src/lib.rs", "src/lib.rs"]);
        assert_eq!(files[0].content, "relaxed");
    }

    #[test]
    fn test_missing_path_dependency() {
        let manifest = "[package]\nname = \"app\"\n\n[dependencies]\nlocal = { path = \"./crates/local\" }\nother = { path = \"crates/other\" }\n";
        let context = context(vec![
            DependencyFile::new("Cargo.toml", manifest),
            DependencyFile::new("crates/local/Cargo.toml", "[package]\nname = \"local\"\n"),
        ]);
        match check_path_dependencies(&context, manifest) {
            Err(UpdateError::PathDependenciesNotReachable { dependencies }) => {
                assert_eq!(dependencies, vec!["other".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
