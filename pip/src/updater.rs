use crate::grammar::{REQUIREMENTS_TXT, RequirementLineGrammar};
use async_trait::async_trait;
use bump_core::editor::{locate_declaration, replace_requirement};
use bump_core::strategy::changed_files;
use bump_core::{DependencyFile, FileUpdater, RequirementRecord, Result, StrategyContext, UpdateError};
use tracing::debug;

/// Rewrites the pin of the first declaration of the dependency in each
/// requirements file it's declared in
#[derive(Debug)]
pub struct PipFileUpdater {
    context: StrategyContext,
}

impl PipFileUpdater {
    pub fn new(context: StrategyContext) -> Result<Self> {
        context.required_file(REQUIREMENTS_TXT)?;
        Ok(Self { context })
    }

    fn updated_requirements_file(&self, file: &DependencyFile) -> Result<String> {
        let dependency = &self.context.dependency;
        let Some(record) = dependency.requirement_for(&file.name) else {
            return Ok(file.content.clone());
        };
        if record.is_unfixable() {
            return Err(UpdateError::UnfixableRequirement {
                dependency: dependency.name.clone(),
                file: file.name.clone(),
            });
        }
        let Some(new) = record.constraint() else {
            return Ok(file.content.clone());
        };
        let previous = dependency.previous_requirement_for(&file.name).and_then(RequirementRecord::constraint);
        if previous == Some(new) {
            return Ok(file.content.clone());
        }

        let grammar = RequirementLineGrammar::get()
            .ok_or_else(|| UpdateError::not_evaluatable("invalid requirements.txt grammar"))?;
        let Some(declaration) = locate_declaration(&file.content, &dependency.name, grammar) else {
            debug!(dependency = %dependency.name, file = %file.name, "no declaration to update");
            return Ok(file.content.clone());
        };
        Ok(replace_requirement(&file.content, &declaration, new))
    }
}

#[async_trait]
impl FileUpdater for PipFileUpdater {
    async fn updated_dependency_files(&self) -> Result<Vec<DependencyFile>> {
        let updated = self
            .context
            .dependency_files
            .iter()
            .filter(|file| self.context.dependency.requirement_for(&file.name).is_some())
            .map(|file| Ok(file.with_content(self.updated_requirements_file(file)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(changed_files(&self.context.dependency_files, updated))
    }
}
