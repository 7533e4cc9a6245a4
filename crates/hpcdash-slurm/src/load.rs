//! Cluster load report (the site's `slurm-load` style summary tool).
//!
//! The tool prints `Key: value` lines:
//!
//! ```text
//! Allocated nodes: 120
//! Idle nodes: 30
//! Total CPU cores: 4800
//! Running/Pending jobs: 350/42
//! % of used cores: 81.2%
//! ```

use crate::types::ClusterLoad;
use hpcdash_parsers::{CommandRunner, CommandSpec, run_collector};
use std::time::Duration;

/// Written instead of a report when the load tool is unavailable.
pub const LOAD_NOT_FOUND: &str = "not found";

pub const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub fn load_command(program: &str) -> CommandSpec {
    CommandSpec::new(program)
}

/// Capture the load report.
///
/// Never fails: a missing or broken tool produces the [`LOAD_NOT_FOUND`]
/// marker so the partition collection can go ahead.
pub async fn collect_load<R: CommandRunner>(runner: &R, program: &str) -> String {
    match run_collector(runner, &load_command(program), LOAD_TIMEOUT).await {
        Ok(Some(raw)) if !raw.trim().is_empty() => raw,
        Ok(_) => {
            tracing::info!(program, "Cluster load tool not available");
            LOAD_NOT_FOUND.to_string()
        }
        Err(e) => {
            tracing::warn!(program, error = %e, "Cluster load tool failed");
            LOAD_NOT_FOUND.to_string()
        }
    }
}

fn parse_count(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

fn parse_pct(value: &str) -> Option<f64> {
    value.trim().trim_end_matches('%').trim().parse().ok()
}

/// Parse a load report. Returns `None` for the not-found marker or when no
/// known field was present.
pub fn parse_load(raw: &str) -> Option<ClusterLoad> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(LOAD_NOT_FOUND) {
        return None;
    }

    let mut load = ClusterLoad::default();
    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();

        match key.as_str() {
            "allocated nodes" => load.allocated_nodes = parse_count(value),
            "idle nodes" => load.idle_nodes = parse_count(value),
            "total cpu cores" => load.total_cores = parse_count(value),
            "allocated cores" => load.allocated_cores = parse_count(value),
            "idle cores" => load.idle_cores = parse_count(value),
            "running/pending jobs" => {
                if let Some((running, pending)) = value.split_once('/') {
                    load.running_jobs = parse_count(running);
                    load.pending_jobs = parse_count(pending);
                }
            }
            k if k.contains("% of used cores") => load.cores_pct = parse_pct(value),
            k if k.contains("% of used nodes") => load.nodes_pct = parse_pct(value),
            _ => {}
        }
    }

    (!load.is_empty()).then_some(load)
}
