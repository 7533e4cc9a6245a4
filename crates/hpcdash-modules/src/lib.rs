//! Environment module integration for hpcdash.
//!
//! Collect the module listing via `module -t spider` and per-family
//! descriptions via `module spider <family>`.

pub mod describe;
pub mod listing;
pub mod spider;
pub mod types;

pub use describe::{DescribeOptions, collect_descriptions, describe_family};
pub use listing::{build_families, collect_listing, family_of, parse_listing};
pub use spider::{extract_description, family_description, fold_family_name, parse_descriptions};
pub use types::{ModuleFamily, ModulesError, by_category};
