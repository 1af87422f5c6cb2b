//! Sandboxed execution: scratch directories, isolated child processes and
//! the helper protocol.

mod helper;
mod isolated;
mod process;
mod temp_dir;

pub use helper::run_helper_process;
pub use isolated::{
    EXIT_ERROR_CLASS, SPAWN_ERROR_CLASS, TIMEOUT_ERROR_CLASS, run_isolated, with_isolated_execution,
};
pub use process::{IsolatedCommand, ProcessOutput};
pub use temp_dir::{TEMP_DIR_PREFIX, create_temporary_directory, with_temporary_directory};

use crate::config::SandboxConfig;
use crate::error::{Result, UpdateError};
use crate::types::DependencyFile;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// A scratch directory holding copies of dependency files, plus the
/// settings every command run inside it shares.
///
/// Dropping the session removes the directory.
#[derive(Debug)]
pub struct SandboxSession {
    dir: TempDir,
    timeout: Duration,
}

impl SandboxSession {
    pub fn create(config: &SandboxConfig) -> Result<Self> {
        Ok(Self {
            dir: create_temporary_directory(&config.scratch_root)?,
            timeout: config.timeout(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a repository-relative file name, refusing names that
    /// would escape the sandbox
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(UpdateError::InvalidPath(name.to_string()));
        }
        Ok(self.dir.path().join(relative))
    }

    pub async fn write_file(&self, name: &str, content: &str) -> Result<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    pub async fn write_files(&self, files: &[DependencyFile]) -> Result<()> {
        for file in files {
            self.write_file(&file.name, &file.content).await?;
        }
        Ok(())
    }

    pub async fn read_file(&self, name: &str) -> Result<String> {
        let path = self.resolve(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(UpdateError::DependencyFileNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// A command that runs inside the sandbox under the session time limit
    pub fn command(&self, program: impl Into<String>) -> IsolatedCommand {
        IsolatedCommand::new(program)
            .current_dir(self.dir.path())
            .timeout(self.timeout)
    }

    /// A helper command from a configured argv
    pub fn helper(&self, argv: &[String]) -> Result<IsolatedCommand> {
        let command = IsolatedCommand::from_argv(argv).ok_or_else(|| UpdateError::HelperSubprocessFailed {
            message: "helper command is empty".to_string(),
            stdout: String::new(),
            stderr: String::new(),
            status: None,
        })?;
        Ok(command.current_dir(self.dir.path()).timeout(self.timeout))
    }

    pub fn close(self) -> Result<()> {
        Ok(self.dir.close()?)
    }
}
