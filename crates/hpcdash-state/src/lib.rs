//! Dashboard state for hpcdash.
//!
//! Runs the collectors, writes raw artifacts through the store and keeps the
//! last good parsed records for each section.

pub mod dashboard;
pub mod types;

pub use dashboard::Dashboard;
pub use types::{
    DashboardConfig, MaxAges, RefreshError, RefreshMode, Section, SectionError, SectionStatus,
};
