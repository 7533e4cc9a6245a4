//! Disk quota reporting for hpcdash.
//!
//! Run `df -hP` for each labelled mount point that exists on this host.

pub mod df;
pub mod types;

pub use df::{QuotaError, collect_quota, df_command, parse_quota};
pub use types::{MountPoint, QuotaRecord, default_mounts};
