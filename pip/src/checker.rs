use crate::pypi::PyPiClient;
use crate::requirement::updated_requirement;
use async_trait::async_trait;
use bump_core::{
    Dependency, Requirement, RequirementRecord, Result, StrategyContext, UpdateChecker, UpdateError, UpdateTarget,
    Version,
};
use tokio::sync::OnceCell;
use tracing::info;

#[derive(Debug)]
pub struct PipUpdateChecker {
    context: StrategyContext,
    pypi: PyPiClient,
    latest: OnceCell<Option<Version>>,
}

impl PipUpdateChecker {
    pub fn new(context: StrategyContext) -> Self {
        let pypi = PyPiClient::new(&context.config.registries.pypi, &context.credentials);
        Self {
            context,
            pypi,
            latest: OnceCell::new(),
        }
    }

    async fn fetch_latest(&self) -> Result<Option<&Version>> {
        let latest = self
            .latest
            .get_or_try_init(|| async {
                let latest = self.pypi.latest_version(&self.context.dependency.name).await?;
                info!(
                    dependency = %self.context.dependency.name,
                    latest = ?latest.as_ref().map(ToString::to_string),
                    "fetched latest PyPI version"
                );
                Ok::<_, UpdateError>(latest)
            })
            .await?;
        Ok(latest.as_ref())
    }
}

#[async_trait]
impl UpdateChecker for PipUpdateChecker {
    fn dependency(&self) -> &Dependency {
        &self.context.dependency
    }

    async fn latest_version(&self) -> Result<Option<UpdateTarget>> {
        Ok(self.fetch_latest().await?.cloned().map(UpdateTarget::Version))
    }

    /// Nothing pins transitive versions, so the latest release is always
    /// installable
    async fn latest_resolvable_version(&self) -> Result<Option<UpdateTarget>> {
        self.latest_version().await
    }

    async fn updated_requirements(&self) -> Result<Vec<RequirementRecord>> {
        let requirements = &self.context.dependency.requirements;
        let Some(latest) = self.fetch_latest().await? else {
            return Ok(requirements.clone());
        };

        Ok(requirements
            .iter()
            .map(|record| match record.constraint().and_then(|old| updated_requirement(old, latest)) {
                Some(new) => RequirementRecord {
                    requirement: Some(Requirement::Constraint(new)),
                    ..record.clone()
                },
                None => record.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bump_core::{Config, PackageManager};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn registry() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/luigi/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "info": { "name": "luigi" },
                "releases": { "2.0.0": [{}], "2.6.0": [{}] },
            })))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn checker(server: &MockServer, version: &str, requirement: &str) -> PipUpdateChecker {
        let mut config = Config::default();
        config.registries.pypi = server.uri();
        let dependency = Dependency::new("luigi", PackageManager::Pip)
            .with_version(version)
            .with_requirement(RequirementRecord::new("requirements.txt", Some(requirement)));
        PipUpdateChecker::new(StrategyContext::new(dependency, Vec::new(), Vec::new(), Arc::new(config)))
    }

    #[tokio::test]
    async fn test_outdated_pin() {
        let server = registry().await;
        let checker = checker(&server, "2.0.0", "==2.0.0");
        assert!(checker.can_update().await.unwrap());
        assert_eq!(
            checker.latest_resolvable_version().await.unwrap(),
            Some(UpdateTarget::Version(Version::new(2, 6, 0)))
        );
        assert_eq!(checker.updated_requirements().await.unwrap()[0].constraint(), Some("==2.6.0"));
    }

    #[tokio::test]
    async fn test_up_to_date_pin() {
        let server = registry().await;
        let checker = checker(&server, "2.6.0", "==2.6.0");
        assert!(!checker.can_update().await.unwrap());
        assert_eq!(checker.updated_requirements().await.unwrap()[0].constraint(), Some("==2.6.0"));
    }
}
