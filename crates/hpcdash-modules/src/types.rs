//! Module family types.

use hpcdash_parsers::CommandError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModulesError {
    #[error("Failed to list modules: {0}")]
    Listing(#[from] CommandError),
}

/// A named group of versioned modules (e.g. `GCC` with `GCC/11.2.0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFamily {
    /// Family name, unique within a listing
    pub name: String,

    /// Curated category, `Uncategorized` when none was assigned
    pub category: String,

    /// One-line description, empty when the module system has none
    pub description: String,

    /// Full module names, sorted
    pub versions: Vec<String>,
}

/// Group families by category, keeping the order of `families`.
///
/// `families` is expected to be sorted by category already (as
/// [`crate::build_families`] returns them).
pub fn by_category(families: &[ModuleFamily]) -> Vec<(&str, Vec<&ModuleFamily>)> {
    let mut groups: Vec<(&str, Vec<&ModuleFamily>)> = Vec::new();
    for family in families {
        match groups.last_mut() {
            Some((category, members)) if *category == family.category => members.push(family),
            _ => groups.push((family.category.as_str(), vec![family])),
        }
    }
    groups
}
