//! Quota record and mount point types.

use camino::Utf8PathBuf;
use hpcdash_parsers::expand_env;
use serde::{Deserialize, Serialize};

/// A labelled path whose filesystem usage is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    /// Display label ("HOME", "SCRATCH")
    pub label: String,
    /// Path to query; may contain `$VAR` references until expanded
    pub path: Utf8PathBuf,
}

impl MountPoint {
    pub fn new(label: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Resolve `$HOME`, `$USER` and friends in the path.
    pub fn expanded(&self) -> Self {
        Self {
            label: self.label.clone(),
            path: expand_env(self.path.as_str()).into(),
        }
    }
}

/// Home and scratch, unexpanded.
pub fn default_mounts() -> Vec<MountPoint> {
    vec![
        MountPoint::new("HOME", "$HOME"),
        MountPoint::new("SCRATCH", "/gpfs/scratch/$USER"),
    ]
}

/// Filesystem usage for one mount point, as `df -hP` reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub label: String,

    /// Path that was queried
    pub path: String,

    pub filesystem: String,

    /// Sizes as printed ("5.0T", "132G")
    pub size: String,
    pub used: String,
    pub available: String,

    /// Use% column, `None` when df printed "-"
    pub use_percent: Option<u8>,

    /// Where the filesystem is mounted
    pub mount_point: String,

    pub size_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
    pub available_bytes: Option<u64>,
}
