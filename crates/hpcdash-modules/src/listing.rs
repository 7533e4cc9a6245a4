//! Parse the `module -t spider` listing into families.

use crate::types::{ModuleFamily, ModulesError};
use hpcdash_parsers::{CommandRunner, CommandSpec, run_collector, strip_ansi};
use hpcdash_store::{DEFAULT_CATEGORY, ModuleCatalog};
use std::collections::BTreeMap;
use std::time::Duration;

/// Spidering a large module tree is slow.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(120);

/// Lmod writes spider output to stderr.
pub fn listing_command() -> CommandSpec {
    CommandSpec::login_shell("module -t spider 2>&1")
}

/// Run `module -t spider` and return its raw output.
///
/// A host without a module system yields an empty listing.
pub async fn collect_listing<R: CommandRunner>(runner: &R) -> Result<String, ModulesError> {
    match run_collector(runner, &listing_command(), LISTING_TIMEOUT).await? {
        Some(raw) => Ok(raw),
        None => {
            tracing::warn!("module command not available, writing empty listing");
            Ok(String::new())
        }
    }
}

/// Family a listed module belongs to.
///
/// - `rc/3DSlicer/5.2.2` → `rc/3DSlicer` (all but the last segment)
/// - `Armadillo/11.4.3` → `Armadillo`
/// - `rc-base`, `Armadillo/` → themselves (without the trailing slash)
pub fn family_of(module: &str) -> &str {
    let module = module.strip_suffix('/').unwrap_or(module);
    let segments = module.split('/').count();
    match segments {
        1 => module,
        2 => module.split('/').next().unwrap_or(module),
        _ => module.rsplit_once('/').map(|(parent, _)| parent).unwrap_or(module),
    }
}

/// Group a raw listing into `family → versions`.
///
/// Lines ending in `/` declare a family with no versions of its own. Blank
/// lines and anything that is not a bare module name (Lmod banners and
/// warnings contain spaces) are skipped.
pub fn parse_listing(raw: &str) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for line in raw.lines() {
        let line = strip_ansi(line);
        let line = line.trim();
        if line.is_empty() || line.contains(char::is_whitespace) || line.ends_with(':') {
            continue;
        }

        let family = family_of(line).to_string();
        let versions = grouped.entry(family).or_default();
        if !line.ends_with('/') && line.contains('/') && !versions.iter().any(|v| v == line) {
            versions.push(line.to_string());
        }
    }

    for versions in grouped.values_mut() {
        versions.sort();
    }
    grouped
}

/// Join a parsed listing with the catalog.
///
/// Families come back ordered by category (alphabetical, `Uncategorized`
/// last) and then by name.
pub fn build_families(
    listing: &BTreeMap<String, Vec<String>>,
    catalog: &ModuleCatalog,
) -> Vec<ModuleFamily> {
    let mut families: Vec<ModuleFamily> = listing
        .iter()
        .map(|(name, versions)| ModuleFamily {
            name: name.clone(),
            category: catalog.category_for(name).to_string(),
            description: catalog.description_for(name).to_string(),
            versions: versions.clone(),
        })
        .collect();

    families.sort_by(|a, b| {
        let key = |f: &ModuleFamily| (f.category == DEFAULT_CATEGORY, f.category.clone());
        key(a).cmp(&key(b)).then_with(|| a.name.cmp(&b.name))
    });
    families
}
