//! SLURM integration for hpcdash.
//!
//! Capture partition state via `sinfo -s` and the cluster load report, and
//! join partitions with the site's partition catalog.

pub mod load;
pub mod reference;
pub mod sinfo;
pub mod types;

pub use load::{LOAD_NOT_FOUND, collect_load, load_command, parse_load};
pub use reference::{PartitionReference, partition_reference};
pub use sinfo::{SinfoError, collect_sinfo, parse_sinfo, parse_sinfo_line};
pub use types::{ClusterLoad, Partition, PartitionSummary};
