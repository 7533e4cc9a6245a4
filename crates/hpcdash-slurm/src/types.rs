//! SLURM partition and load types.

use hpcdash_parsers::{format_time_limit, parse_time_limit};
use hpcdash_store::{DEFAULT_PARTITION_CATEGORY, PartitionCatalog};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One row of `sinfo -s`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Partition name, without the default marker
    pub name: String,

    /// Whether sinfo flagged this as the default partition (`name*`)
    pub is_default: bool,

    /// Availability ("up", "down", "drain", "inact")
    pub avail: String,

    /// Time limit as printed by sinfo ("infinite", "2-00:00:00")
    pub timelimit: String,

    /// Allocated nodes
    pub alloc: u32,

    /// Idle nodes
    pub idle: u32,

    /// Nodes in any other state (down, drained, ...)
    pub other: u32,

    /// Total nodes
    pub total: u32,

    /// Compressed node list ("node[01-08]")
    pub nodelist: String,

    /// Idle share of total nodes, percent with one decimal
    pub availability_pct: f64,

    /// Site category from the partition catalog ("Other" when unlisted)
    pub category: String,
}

impl Partition {
    pub fn new(
        name: &str,
        avail: &str,
        timelimit: &str,
        (alloc, idle, other, total): (u32, u32, u32, u32),
        nodelist: &str,
    ) -> Self {
        let (name, is_default) = match name.strip_suffix('*') {
            Some(stripped) => (stripped, true),
            None => (name, false),
        };
        let availability_pct = if total > 0 {
            (f64::from(idle) / f64::from(total) * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            name: name.to_string(),
            is_default,
            avail: avail.to_string(),
            timelimit: timelimit.to_string(),
            alloc,
            idle,
            other,
            total,
            nodelist: nodelist.to_string(),
            availability_pct,
            category: DEFAULT_PARTITION_CATEGORY.to_string(),
        }
    }

    /// Take the category the catalog assigns to this partition.
    pub fn categorize(&mut self, catalog: &PartitionCatalog) {
        self.category = catalog.category_for(&self.name).to_string();
    }

    pub fn is_up(&self) -> bool {
        self.avail.eq_ignore_ascii_case("up")
    }

    /// Time limit as a duration, `None` when unlimited.
    pub fn time_limit(&self) -> Option<Duration> {
        parse_time_limit(&self.timelimit)
    }

    /// Time limit for display ("2 days, 12 hours").
    pub fn time_limit_display(&self) -> String {
        format_time_limit(&self.timelimit)
    }
}

/// Cluster-wide node totals across partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub partitions: usize,
    pub total_nodes: u64,
    pub idle_nodes: u64,
    pub allocated_nodes: u64,
}

impl PartitionSummary {
    /// Sum node counts. Nodes shared by several partitions are counted once
    /// per partition, as sinfo reports them.
    pub fn from_partitions(partitions: &[Partition]) -> Self {
        Self {
            partitions: partitions.len(),
            total_nodes: partitions.iter().map(|p| u64::from(p.total)).sum(),
            idle_nodes: partitions.iter().map(|p| u64::from(p.idle)).sum(),
            allocated_nodes: partitions.iter().map(|p| u64::from(p.alloc)).sum(),
        }
    }
}

/// Cluster load report. Fields the tool did not print stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterLoad {
    pub allocated_nodes: Option<u64>,
    pub idle_nodes: Option<u64>,
    pub total_cores: Option<u64>,
    pub allocated_cores: Option<u64>,
    pub idle_cores: Option<u64>,
    pub running_jobs: Option<u64>,
    pub pending_jobs: Option<u64>,
    pub cores_pct: Option<f64>,
    pub nodes_pct: Option<f64>,
}

impl ClusterLoad {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
