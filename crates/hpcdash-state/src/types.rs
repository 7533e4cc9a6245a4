//! Dashboard configuration, section status and refresh errors.

use chrono::{DateTime, Utc};
use hpcdash_modules::{DescribeOptions, ModulesError};
use hpcdash_quota::{MountPoint, QuotaError, default_mounts};
use hpcdash_slurm::SinfoError;
use hpcdash_store::{Artifact, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Independently refreshed parts of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Modules,
    /// `sinfo -s` plus the cluster load report
    Partitions,
    Quota,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Modules, Section::Partitions, Section::Quota];

    /// Artifact whose age decides whether the section is stale.
    pub fn artifact(&self) -> Artifact {
        match self {
            Self::Modules => Artifact::Modules,
            Self::Partitions => Artifact::Partitions,
            Self::Quota => Artifact::DiskQuota,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modules => "modules",
            Self::Partitions => "partitions",
            Self::Quota => "quota",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Only run collectors whose artifact is older than its max age
    #[default]
    IfStale,
    /// Run every collector
    Force,
}

/// How old an artifact may get before its collector runs again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxAges {
    pub modules: Duration,
    pub partitions: Duration,
    pub quota: Duration,
}

impl Default for MaxAges {
    fn default() -> Self {
        Self {
            modules: Duration::from_secs(3600),
            partitions: Duration::from_secs(300),
            quota: Duration::from_secs(300),
        }
    }
}

impl MaxAges {
    pub fn for_section(&self, section: Section) -> Duration {
        match section {
            Section::Modules => self.modules,
            Section::Partitions => self.partitions,
            Section::Quota => self.quota,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub describe: DescribeOptions,
    /// Cluster load tool, run without arguments
    pub load_command: String,
    pub mounts: Vec<MountPoint>,
    pub max_ages: MaxAges,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            describe: DescribeOptions::default(),
            load_command: "slurm-load".to_string(),
            mounts: default_mounts(),
            max_ages: MaxAges::default(),
        }
    }
}

/// Outcome of the most recent refresh attempt for a section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionStatus {
    /// When the collector last succeeded in this process
    pub refreshed_at: Option<DateTime<Utc>>,

    /// Modification time of the artifact the records were parsed from
    pub artifact_modified: Option<DateTime<Utc>>,

    /// Records are left over from an earlier refresh
    pub stale: bool,

    pub last_error: Option<String>,
}

/// Why a single section could not be refreshed.
#[derive(Error, Debug)]
pub enum SectionError {
    #[error(transparent)]
    Modules(#[from] ModulesError),

    #[error(transparent)]
    Sinfo(#[from] SinfoError),

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One or more sections failed; the others were refreshed.
#[derive(Error, Debug)]
#[error("refresh failed for {}", section_names(.failures))]
pub struct RefreshError {
    pub failures: Vec<(Section, SectionError)>,
}

impl RefreshError {
    pub fn sections(&self) -> impl Iterator<Item = Section> + '_ {
        self.failures.iter().map(|(section, _)| *section)
    }
}

fn section_names(failures: &[(Section, SectionError)]) -> String {
    failures
        .iter()
        .map(|(section, e)| format!("{section} ({e})"))
        .collect::<Vec<_>>()
        .join(", ")
}
