//! Shared parsing utilities for cluster tool output.
//!
//! This crate provides the command runner and the common text helpers used by
//! the module, Slurm and quota collectors.

pub mod command;
pub mod size;
pub mod time;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use command::{
    CommandError, CommandOutput, CommandRunner, CommandSpec, EXIT_COMMAND_NOT_FOUND, TokioRunner,
    run_bounded, run_collector,
};
pub use size::parse_size_bytes;
pub use time::{format_time_limit, parse_time_limit};

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("valid ANSI escape pattern")
});

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("valid env var pattern")
});

/// Remove ANSI escape sequences (Lmod colours its output on some sites).
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(s, "")
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Expand `$VAR` and `${VAR}` references using `lookup`.
///
/// Unknown variables expand to the empty string, like the shell.
pub fn expand_vars<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VAR
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_default()
        })
        .into_owned()
}

/// Expand `$VAR` references from the process environment.
pub fn expand_env(s: &str) -> String {
    expand_vars(s, |name| std::env::var(name).ok())
}
