//! Partition reference table: catalogued partitions grouped by category.

use crate::types::Partition;
use hpcdash_store::PartitionCatalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One catalogued partition as shown in the reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReference {
    pub name: String,
    /// Total nodes reported by sinfo
    pub nodes: u32,
    pub nodes_per_researcher: Option<String>,
    pub priority_tier: Option<String>,
}

/// Group the partitions that appear in both sinfo and the catalog by
/// category, each group sorted by name.
///
/// Catalogued partitions sinfo did not report are left out. An empty catalog
/// gives an empty table.
pub fn partition_reference(
    partitions: &[Partition],
    catalog: &PartitionCatalog,
) -> BTreeMap<String, Vec<PartitionReference>> {
    let mut groups: BTreeMap<String, Vec<PartitionReference>> = BTreeMap::new();

    for partition in partitions {
        let Some(info) = catalog.get(&partition.name) else {
            continue;
        };
        groups
            .entry(catalog.category_for(&partition.name).to_string())
            .or_default()
            .push(PartitionReference {
                name: partition.name.clone(),
                nodes: partition.total,
                nodes_per_researcher: info.nodes_per_researcher.clone(),
                priority_tier: info.priority_tier.clone(),
            });
    }

    for group in groups.values_mut() {
        group.sort_by(|a, b| a.name.cmp(&b.name));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinfo::parse_sinfo;

    const SINFO: &str = "\
PARTITION   AVAIL  TIMELIMIT   NODES(A/I/O/T)  NODELIST
short          up    2:00:00       10/20/0/30  c[001-030]
normal*        up   infinite          5/3/0/8  node[01-08]
long           up 7-00:00:00          2/2/0/4  c[031-034]
pascalnodes    up 2-00:00:00          1/1/0/2  p[01-02]
scratch-io     up   infinite          0/1/0/1  io01
";

    const CATALOG: &str = r#"{
        "short": {"category": "CPU", "nodes_per_researcher": 10, "priority_tier": 1},
        "normal": {"category": "CPU", "nodes_per_researcher": "4", "priority_tier": "2"},
        "long": {"category": "CPU", "nodes_per_researcher": 2},
        "pascalnodes": {"category": "GPU", "nodes_per_researcher": "1 (2 with approval)"},
        "retired": {"category": "CPU"},
        "scratch-io": {}
    }"#;

    fn catalog() -> PartitionCatalog {
        serde_json::from_str(CATALOG).unwrap()
    }

    #[test]
    fn test_groups_by_category_sorted_by_name() {
        let catalog = catalog();
        let partitions = parse_sinfo(SINFO, &catalog);
        let reference = partition_reference(&partitions, &catalog);

        assert_eq!(
            reference.keys().collect::<Vec<_>>(),
            vec!["CPU", "GPU", "Other"]
        );
        let cpu: Vec<&str> = reference["CPU"].iter().map(|r| r.name.as_str()).collect();
        assert_eq!(cpu, vec!["long", "normal", "short"]);

        let short = &reference["CPU"][2];
        assert_eq!(short.nodes, 30);
        assert_eq!(short.nodes_per_researcher.as_deref(), Some("10"));
        assert_eq!(short.priority_tier.as_deref(), Some("1"));
        assert_eq!(reference["CPU"][0].priority_tier, None);

        assert_eq!(
            reference["GPU"][0].nodes_per_researcher.as_deref(),
            Some("1 (2 with approval)")
        );
        assert_eq!(reference["Other"][0].name, "scratch-io");
    }

    #[test]
    fn test_empty_catalog_gives_empty_reference() {
        let catalog = PartitionCatalog::default();
        let partitions = parse_sinfo(SINFO, &catalog);
        assert!(partitions.iter().all(|p| p.category == "Other"));
        assert!(partition_reference(&partitions, &catalog).is_empty());
    }
}
