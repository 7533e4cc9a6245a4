//! Command execution utilities for cluster tool queries.

use std::fmt;
use std::future::Future;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Exit status a shell reports when the command does not exist.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Error type for command execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{command} not found")]
    NotFound { command: String },
    #[error("Failed to execute {command}: {error}")]
    Execution { command: String, error: String },
    #[error("Command {command} failed: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("Command {command} timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

impl CommandError {
    /// Whether the tool is missing from the host, as opposed to failing when run.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// An external command line: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run `script` through a bash login shell.
    ///
    /// `module` is a shell function installed by the site profile, so it only
    /// resolves inside a login shell.
    pub fn login_shell(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-lc").arg(script)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// The shell could not find the command (or shell function).
    pub fn command_missing(&self) -> bool {
        self.status == Some(EXIT_COMMAND_NOT_FOUND)
    }
}

/// Capability to run external commands.
///
/// Collectors only talk to the host through this trait so they can be
/// exercised against captured fixture text.
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion, killing it if `timeout` elapses first.
    fn execute(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> impl Future<Output = Result<CommandOutput, CommandError>> + Send;
}

/// Runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl CommandRunner for TokioRunner {
    async fn execute(
        &self,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| spawn_error(spec, e))?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::Timeout {
                command: spec.to_string(),
                timeout,
            })?
            .map_err(|e| CommandError::Execution {
                command: spec.to_string(),
                error: e.to_string(),
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn spawn_error(spec: &CommandSpec, e: io::Error) -> CommandError {
    if e.kind() == io::ErrorKind::NotFound {
        CommandError::NotFound {
            command: spec.program.clone(),
        }
    } else {
        CommandError::Execution {
            command: spec.to_string(),
            error: e.to_string(),
        }
    }
}

/// Execute a command under a hard deadline.
///
/// The deadline is enforced here as well as inside the runner, so a runner
/// that never resolves still gives up after `timeout`.
pub async fn run_bounded<R: CommandRunner>(
    runner: &R,
    spec: &CommandSpec,
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    match tokio::time::timeout(timeout, runner.execute(spec, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(CommandError::Timeout {
            command: spec.to_string(),
            timeout,
        }),
    }
}

/// Run a collector command, separating "tool unavailable" from failure.
///
/// - `Ok(None)`: the tool does not exist on this host
/// - `Ok(Some(stdout))`: the tool ran and printed something, even if it
///   exited non-zero
/// - `Err(_)`: timeout, or a non-zero exit with nothing usable on stdout
pub async fn run_collector<R: CommandRunner>(
    runner: &R,
    spec: &CommandSpec,
    timeout: Duration,
) -> Result<Option<String>, CommandError> {
    let output = match run_bounded(runner, spec, timeout).await {
        Ok(output) => output,
        Err(e) if e.is_unavailable() => return Ok(None),
        Err(e) => return Err(e),
    };

    if output.command_missing() {
        return Ok(None);
    }
    if output.success() || !output.stdout.trim().is_empty() {
        return Ok(Some(output.stdout));
    }

    Err(CommandError::Failed {
        command: spec.to_string(),
        status: output.status,
        stderr: output.stderr.trim().to_string(),
    })
}
