use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category assigned to families nobody has curated yet.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Category for partitions missing from the partition catalog.
pub const DEFAULT_PARTITION_CATEGORY: &str = "Other";

/// Raw text artifacts written by the collectors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// `module -t spider` listing
    Modules,
    /// `sinfo -s` summary
    Partitions,
    /// Cluster load tool report
    SlurmLoad,
    /// Labelled `df -hP` blocks
    DiskQuota,
}

impl Artifact {
    /// File name under the logs directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Modules => "modules.txt",
            Self::Partitions => "partitions.txt",
            Self::SlurmLoad => "slurm_load.txt",
            Self::DiskQuota => "disk_quota.txt",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Module categories and descriptions.
///
/// `categories` is curated by hand; `descriptions` is regenerated by the
/// description collector. The two maps are only joined when a family is
/// looked up, so regenerating one never clobbers the other.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleCatalog {
    #[serde(default)]
    pub categories: BTreeMap<String, String>,
    #[serde(default)]
    pub descriptions: BTreeMap<String, String>,
}

impl ModuleCatalog {
    /// Resolve the category for a family.
    ///
    /// Tries the exact name, then progressively shorter `/` prefixes (with or
    /// without a trailing slash), so `rc/` can categorise all of `rc/*`.
    pub fn category_for(&self, family: &str) -> &str {
        let parts: Vec<&str> = family.split('/').collect();
        for len in (1..=parts.len()).rev() {
            let prefix = parts[..len].join("/");
            if let Some(category) = self.categories.get(&prefix) {
                return category;
            }
            if let Some(category) = self.categories.get(&format!("{}/", prefix)) {
                return category;
            }
        }
        DEFAULT_CATEGORY
    }

    /// Description for a family, empty if none was generated.
    pub fn description_for(&self, family: &str) -> &str {
        self.descriptions
            .get(family)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Replace every description with a freshly generated set.
    ///
    /// Categories are left exactly as they were, including those for
    /// families missing from `descriptions`.
    pub fn replace_descriptions(&mut self, descriptions: BTreeMap<String, String>) {
        self.descriptions = descriptions;
    }

    pub fn set_category(&mut self, family: impl Into<String>, category: impl Into<String>) {
        self.categories.insert(family.into(), category.into());
    }
}

/// Site-maintained facts about one partition.
///
/// Sites write `nodes_per_researcher` and `priority_tier` as either strings
/// or numbers; both are kept as display text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PartitionInfo {
    pub category: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub nodes_per_researcher: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub priority_tier: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(text) => text,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
    }))
}

/// Partition metadata keyed by partition name, as kept in
/// `partition_metadata.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PartitionCatalog {
    pub partitions: BTreeMap<String, PartitionInfo>,
}

impl PartitionCatalog {
    /// Look up a partition. A trailing default marker (`normal*`) is ignored.
    pub fn get(&self, partition: &str) -> Option<&PartitionInfo> {
        let name = partition.strip_suffix('*').unwrap_or(partition);
        self.partitions.get(name)
    }

    pub fn category_for(&self, partition: &str) -> &str {
        self.get(partition)
            .and_then(|info| info.category.as_deref())
            .unwrap_or(DEFAULT_PARTITION_CATEGORY)
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}
