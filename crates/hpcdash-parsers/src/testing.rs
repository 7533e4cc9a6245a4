//! Scripted command runner for tests.
//!
//! Replies are keyed by the exact [`CommandSpec`]; anything unscripted behaves
//! like a missing binary.

use crate::command::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Canned behaviour for one command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Exit 0 with the given stdout
    Stdout(String),
    /// Exit with a non-zero status and stderr
    Exit { status: i32, stderr: String },
    /// Binary not installed
    Missing,
    /// Never finishes
    Hang,
}

impl Reply {
    pub fn stdout(s: impl Into<String>) -> Self {
        Self::Stdout(s.into())
    }

    pub fn exit(status: i32, stderr: impl Into<String>) -> Self {
        Self::Exit {
            status,
            stderr: stderr.into(),
        }
    }
}

/// A [`CommandRunner`] that answers from a script and records every call.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    replies: HashMap<CommandSpec, Reply>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, spec: CommandSpec, reply: Reply) -> Self {
        self.replies.insert(spec, reply);
        self
    }

    /// Commands executed so far, in call order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn execute(
        &self,
        spec: &CommandSpec,
        _timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        let reply = self.replies.get(spec).cloned().unwrap_or(Reply::Missing);
        match reply {
            Reply::Stdout(stdout) => Ok(CommandOutput {
                status: Some(0),
                stdout,
                stderr: String::new(),
            }),
            Reply::Exit { status, stderr } => Ok(CommandOutput {
                status: Some(status),
                stdout: String::new(),
                stderr,
            }),
            Reply::Missing => Err(CommandError::NotFound {
                command: spec.program.clone(),
            }),
            Reply::Hang => std::future::pending().await,
        }
    }
}
