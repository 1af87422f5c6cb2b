use bump_core::config::Config;
use bump_core::{
    Dependency, DependencyFile, FileUpdater, PackageManager, RequirementRecord, StrategyContext, UpdateChecker,
    UpdateError,
};
use bump_pip::{PipFileUpdater, PipUpdateChecker};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REQUIREMENTS: &str = "\
# Scheduling
luigi==2.0.0
flask[async] >= 2.0  # web
psycopg2-binary
";

async fn pypi() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pypi/luigi/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "info": { "name": "luigi" },
            "releases": {
                "2.0.0": [{ "yanked": false }],
                "2.6.0": [{ "yanked": false }],
                "2.7.0": [{ "yanked": true }],
            },
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pypi/private-pkg/json"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    server
}

fn context(server: &MockServer, dependency: Dependency) -> StrategyContext {
    let mut config = Config::default();
    config.registries.pypi = server.uri();
    StrategyContext::new(
        dependency,
        vec![DependencyFile::new("requirements.txt", REQUIREMENTS)],
        Vec::new(),
        Arc::new(config),
    )
}

fn luigi(version: &str, requirement: &str) -> Dependency {
    Dependency::new("luigi", PackageManager::Pip)
        .with_version(version)
        .with_requirement(RequirementRecord::new("requirements.txt", Some(requirement)))
}

#[tokio::test]
async fn test_luigi_update_end_to_end() -> anyhow::Result<()> {
    let server = pypi().await;
    let checker = PipUpdateChecker::new(context(&server, luigi("2.0.0", "==2.0.0")));
    assert!(checker.can_update().await?);

    let mut updated = luigi("2.6.0", "==2.0.0");
    updated.previous_version = Some("2.0.0".to_string());
    updated.previous_requirements = std::mem::replace(&mut updated.requirements, checker.updated_requirements().await?);

    let files = PipFileUpdater::new(context(&server, updated))?
        .updated_dependency_files()
        .await?;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].content, REQUIREMENTS.replace("luigi==2.0.0", "luigi==2.6.0"));
    Ok(())
}

#[tokio::test]
async fn test_private_index_is_reported() -> anyhow::Result<()> {
    let server = pypi().await;
    let dependency = Dependency::new("private-pkg", PackageManager::Pip)
        .with_version("1.0.0")
        .with_requirement(RequirementRecord::new("requirements.txt", Some("==1.0.0")));
    let checker = PipUpdateChecker::new(context(&server, dependency));
    assert!(matches!(
        checker.latest_version().await,
        Err(UpdateError::PrivateSourceNotReachable(_))
    ));
    Ok(())
}
