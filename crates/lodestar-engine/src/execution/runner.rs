use super::error::ExecutionError;
use crate::config::schema::ExecutionConfig;
use async_trait::async_trait;
use lodestar_common::ProcessOutput;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Placeholder replaced with the script path in runner arguments.
pub const SCRIPT_PLACEHOLDER: &str = "{script}";

/// Runs a test script out of process.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &Path) -> Result<ProcessOutput, ExecutionError>;
}

/// Runs an external command such as `npx playwright test <script>`.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            timeout: Duration::from_millis(600_000),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            cwd: config.cwd.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments with the script placeholder substituted. The script is
    /// appended when no argument mentions the placeholder.
    pub fn render_args(&self, script: &Path) -> Vec<String> {
        let script = script.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(SCRIPT_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(SCRIPT_PLACEHOLDER, &script)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(script.into_owned());
        }
        args
    }
}

#[async_trait]
impl ScriptRunner for CommandRunner {
    async fn run(&self, script: &Path) -> Result<ProcessOutput, ExecutionError> {
        let args = self.render_args(script);
        debug!("Running {} {}", self.program, args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let child = command
            .spawn()
            .map_err(|e| ExecutionError::Runner(format!("failed to start {}: {}", self.program, e)))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
            }),
            Ok(Err(e)) => Err(ExecutionError::Runner(format!(
                "failed to collect output of {}: {}",
                self.program, e
            ))),
            Err(_) => {
                warn!("Test run exceeded {:?}, killed", self.timeout);
                Ok(ProcessOutput {
                    stdout: String::new(),
                    stderr: format!("Test run timed out after {:?}", self.timeout),
                    exit_code: None,
                })
            }
        }
    }
}
