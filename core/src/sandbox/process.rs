use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// A child process to run with its own environment, working directory and
/// time limit.
///
/// Environment changes apply to the child only; the parent's environment is
/// never touched.
#[derive(Debug, Clone)]
pub struct IsolatedCommand {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    env_remove: Vec<String>,
    current_dir: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

/// Captured result of a finished child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl IsolatedCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            env_remove: Vec::new(),
            current_dir: None,
            stdin: None,
            timeout: None,
        }
    }

    /// Build from an argv list such as `["ruby", "helpers/run.rb"]`
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Program and arguments, for logs
    pub fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion. `Ok(None)` means the time limit elapsed and the
    /// child was killed.
    pub(crate) async fn execute(&self) -> std::io::Result<Option<ProcessOutput>> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for key in &self.env_remove {
            command.env_remove(key);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        debug!(command = %self.describe(), "spawning child process");
        let mut child = command.spawn()?;

        let stdin = child.stdin.take();
        let input = self.stdin.clone().unwrap_or_default();
        let write_input = async move {
            if let Some(mut stdin) = stdin {
                // A child that exits without reading closes the pipe early
                if let Err(err) = stdin.write_all(&input).await {
                    debug!(error = %err, "child closed stdin before reading input");
                }
            }
        };
        let run = async move {
            let ((), output) = tokio::join!(write_input, child.wait_with_output());
            output
        };

        let output = match self.timeout {
            Some(limit) => {
                if let Ok(output) = tokio::time::timeout(limit, run).await {
                    output?
                } else {
                    warn!(
                        command = %self.describe(),
                        timeout_secs = limit.as_secs(),
                        "child process timed out and was killed"
                    );
                    return Ok(None);
                }
            }
            None => run.await?,
        };

        Ok(Some(ProcessOutput {
            status: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }))
    }
}
