use crate::dockerfile::{DOCKERFILE, update_dockerfile};
use async_trait::async_trait;
use bump_core::strategy::changed_files;
use bump_core::{DependencyFile, DependencySource, FileUpdater, ImageSource, Result, StrategyContext};
use tracing::debug;

/// Moves `FROM` lines to the tag and digest the updated requirements name
#[derive(Debug)]
pub struct DockerFileUpdater {
    context: StrategyContext,
}

impl DockerFileUpdater {
    pub fn new(context: StrategyContext) -> Result<Self> {
        context.required_file(DOCKERFILE)?;
        Ok(Self { context })
    }

    /// Image pin before the update. Falls back to the previous version as
    /// the tag when no previous requirement was recorded.
    fn previous_source(&self, file: &str, updated: &ImageSource) -> ImageSource {
        let dependency = &self.context.dependency;
        if let Some(previous) = dependency
            .previous_requirement_for(file)
            .and_then(|record| record.source.as_ref())
            .and_then(DependencySource::image)
        {
            return previous.clone();
        }
        ImageSource {
            registry: updated.registry.clone(),
            tag: updated.tag.as_ref().and(dependency.previous_version.clone()),
            digest: None,
        }
    }

    fn updated_dockerfile(&self, file: &DependencyFile) -> String {
        let dependency = &self.context.dependency;
        let Some(updated) = dependency
            .requirement_for(&file.name)
            .and_then(|record| record.source.as_ref())
            .and_then(DependencySource::image)
        else {
            return file.content.clone();
        };
        let previous = self.previous_source(&file.name, updated);

        match update_dockerfile(&file.content, &dependency.name, &previous, updated) {
            Some(content) => content,
            None => {
                debug!(dependency = %dependency.name, file = %file.name, "no FROM line pinned at the previous reference");
                file.content.clone()
            }
        }
    }
}

#[async_trait]
impl FileUpdater for DockerFileUpdater {
    async fn updated_dependency_files(&self) -> Result<Vec<DependencyFile>> {
        let updated = self
            .context
            .dependency_files
            .iter()
            .filter(|file| self.context.dependency.requirement_for(&file.name).is_some())
            .map(|file| file.with_content(self.updated_dockerfile(file)))
            .collect();
        Ok(changed_files(&self.context.dependency_files, updated))
    }
}
