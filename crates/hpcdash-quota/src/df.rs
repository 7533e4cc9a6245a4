//! Collect and parse labelled `df -hP` captures.
//!
//! The capture stores each mount's df output under a header line:
//!
//! ```text
//! [HOME] /home/alice
//! Filesystem      Size  Used Avail Use% Mounted on
//! nfs:/home       5.0T  3.1T  1.9T  62% /home
//! ```

use crate::types::{MountPoint, QuotaRecord};
use hpcdash_parsers::{CommandError, CommandRunner, CommandSpec, parse_size_bytes, run_collector};
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("df failed for every mount ({attempted} tried): {last}")]
    AllMountsFailed {
        attempted: usize,
        last: CommandError,
    },
}

pub const DF_TIMEOUT: Duration = Duration::from_secs(30);

pub fn df_command(path: &str) -> CommandSpec {
    CommandSpec::new("df").args(["-hP", path])
}

/// Run df for every mount that exists on this host.
///
/// Missing paths are skipped. A mount whose df call fails is logged and left
/// out; only when every attempted mount fails is an error returned.
pub async fn collect_quota<R: CommandRunner>(
    runner: &R,
    mounts: &[MountPoint],
) -> Result<String, QuotaError> {
    let mut capture = String::new();
    let mut attempted = 0;
    let mut failed = 0;
    let mut last_error = None;

    for mount in mounts.iter().map(MountPoint::expanded) {
        if !mount.path.exists() {
            tracing::debug!(label = %mount.label, path = %mount.path, "Skipping missing mount");
            continue;
        }
        attempted += 1;

        match run_collector(runner, &df_command(mount.path.as_str()), DF_TIMEOUT).await {
            Ok(Some(raw)) => {
                let _ = writeln!(capture, "[{}] {}", mount.label, mount.path);
                capture.push_str(&raw);
                if !raw.ends_with('\n') {
                    capture.push('\n');
                }
            }
            Ok(None) => {
                tracing::warn!(label = %mount.label, "df not available");
            }
            Err(e) => {
                tracing::warn!(label = %mount.label, path = %mount.path, error = %e, "df failed");
                failed += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(last) if failed == attempted => Err(QuotaError::AllMountsFailed { attempted, last }),
        _ => Ok(capture),
    }
}

fn parse_header(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('[')?;
    let (label, path) = rest.split_once(']')?;
    Some((label.trim(), path.trim()))
}

fn parse_percent(field: &str) -> Option<u8> {
    field.trim_end_matches('%').parse().ok()
}

/// Parse a labelled df capture into one record per mount.
///
/// The `Filesystem` header row and any rows outside a `[LABEL]` section are
/// ignored. Mount points containing spaces are kept whole.
pub fn parse_quota(raw: &str) -> Vec<QuotaRecord> {
    let mut records = Vec::new();
    let mut section: Option<(&str, &str)> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = parse_header(line) {
            section = Some(header);
            continue;
        }
        if line.starts_with("Filesystem") {
            continue;
        }
        let Some((label, path)) = section else {
            continue;
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            tracing::debug!(line, "Skipping short df row");
            continue;
        }

        records.push(QuotaRecord {
            label: label.to_string(),
            path: path.to_string(),
            filesystem: fields[0].to_string(),
            size: fields[1].to_string(),
            used: fields[2].to_string(),
            available: fields[3].to_string(),
            use_percent: parse_percent(fields[4]),
            mount_point: fields[5..].join(" "),
            size_bytes: parse_size_bytes(fields[1]),
            used_bytes: parse_size_bytes(fields[2]),
            available_bytes: parse_size_bytes(fields[3]),
        });
        // df -P prints one row per queried path.
        section = None;
    }

    records
}
