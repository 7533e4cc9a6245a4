//! Query partition state via `sinfo -s`.

use crate::types::Partition;
use hpcdash_parsers::{CommandError, CommandRunner, CommandSpec, run_collector};
use hpcdash_store::PartitionCatalog;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinfoError {
    #[error("Failed to execute sinfo: {0}")]
    ExecutionError(#[from] CommandError),
}

pub const SINFO_TIMEOUT: Duration = Duration::from_secs(30);

/// sinfo -s output format:
/// PARTITION AVAIL TIMELIMIT NODES(A/I/O/T) NODELIST
static SINFO_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+)\s+(\S+)\s+(\S+)\s+(\d+)/(\d+)/(\d+)/(\d+)(?:\s+(.*))?$")
        .expect("valid sinfo line pattern")
});

pub fn sinfo_command() -> CommandSpec {
    CommandSpec::new("sinfo").arg("-s")
}

/// Capture `sinfo -s` verbatim.
///
/// Hosts without Slurm yield an empty capture.
pub async fn collect_sinfo<R: CommandRunner>(runner: &R) -> Result<String, SinfoError> {
    match run_collector(runner, &sinfo_command(), SINFO_TIMEOUT).await? {
        Some(raw) => Ok(raw),
        None => {
            tracing::warn!("sinfo not available, writing empty partition capture");
            Ok(String::new())
        }
    }
}

/// Parse a single line of sinfo -s output.
pub fn parse_sinfo_line(line: &str) -> Option<Partition> {
    let caps = SINFO_LINE.captures(line.trim())?;
    let count = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

    Some(Partition::new(
        &caps[1],
        &caps[2],
        &caps[3],
        (count(4)?, count(5)?, count(6)?, count(7)?),
        caps.get(8).map(|m| m.as_str().trim()).unwrap_or_default(),
    ))
}

/// Parse a full sinfo -s capture.
///
/// The header row is skipped, as is any line that does not tokenize.
/// Each partition takes its category from `catalog`. Partitions come back
/// sorted by availability (descending), then name.
pub fn parse_sinfo(raw: &str, catalog: &PartitionCatalog) -> Vec<Partition> {
    let mut partitions = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("PARTITION") {
            continue;
        }
        match parse_sinfo_line(line) {
            Some(mut partition) => {
                partition.categorize(catalog);
                partitions.push(partition);
            }
            None => tracing::debug!(line, "Skipping unparseable sinfo line"),
        }
    }

    partitions.sort_by(|a, b| {
        b.availability_pct
            .total_cmp(&a.availability_pct)
            .then_with(|| a.name.cmp(&b.name))
    });
    partitions
}
