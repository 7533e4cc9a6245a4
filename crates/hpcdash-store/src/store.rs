use crate::types::{Artifact, ModuleCatalog, PartitionCatalog};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

/// Persisted dashboard state: raw collector artifacts plus the module catalog.
pub trait StateStore: Send + Sync {
    /// Read an artifact. Returns `None` if it was never written.
    fn read_artifact(&self, artifact: Artifact) -> Result<Option<String>, StoreError>;

    /// Replace an artifact's content.
    fn write_artifact(&self, artifact: Artifact, content: &str) -> Result<(), StoreError>;

    /// When the artifact was last written, `None` if it does not exist.
    fn artifact_modified(&self, artifact: Artifact) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Load the module catalog. Returns an empty catalog if none exists.
    fn load_catalog(&self) -> Result<ModuleCatalog, StoreError>;

    fn save_catalog(&self, catalog: &ModuleCatalog) -> Result<(), StoreError>;

    /// Load partition metadata. Returns an empty catalog if none exists.
    fn load_partition_catalog(&self) -> Result<PartitionCatalog, StoreError>;

    /// Swap in freshly generated descriptions.
    ///
    /// The persisted category map is re-read and written back untouched.
    fn merge_descriptions(
        &self,
        descriptions: BTreeMap<String, String>,
    ) -> Result<ModuleCatalog, StoreError> {
        let mut catalog = self.load_catalog()?;
        catalog.replace_descriptions(descriptions);
        self.save_catalog(&catalog)?;
        Ok(catalog)
    }

    /// Assign a category to a family, leaving descriptions untouched.
    fn assign_category(&self, family: &str, category: &str) -> Result<ModuleCatalog, StoreError> {
        let mut catalog = self.load_catalog()?;
        catalog.set_category(family, category);
        self.save_catalog(&catalog)?;
        Ok(catalog)
    }
}

/// On-disk catalog layout. Older installs kept a flat `family -> category` map.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Split(SplitCatalog),
    Flat(BTreeMap<String, String>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SplitCatalog {
    #[serde(default)]
    categories: BTreeMap<String, String>,
    #[serde(default)]
    descriptions: BTreeMap<String, String>,
}

impl From<CatalogFile> for ModuleCatalog {
    fn from(file: CatalogFile) -> Self {
        match file {
            CatalogFile::Split(split) => ModuleCatalog {
                categories: split.categories,
                descriptions: split.descriptions,
            },
            CatalogFile::Flat(categories) => ModuleCatalog {
                categories,
                descriptions: BTreeMap::new(),
            },
        }
    }
}

/// Filesystem store.
///
/// Artifacts live at `<logs_dir>/<file_name>`; the catalogs are JSON files.
/// Partition metadata defaults to `partition_metadata.json` next to the
/// module catalog.
pub struct FsStore {
    logs_dir: Utf8PathBuf,
    catalog_path: Utf8PathBuf,
    partition_catalog_path: Utf8PathBuf,
}

impl FsStore {
    pub fn new(logs_dir: impl Into<Utf8PathBuf>, catalog_path: impl Into<Utf8PathBuf>) -> Self {
        let catalog_path = catalog_path.into();
        Self {
            logs_dir: logs_dir.into(),
            partition_catalog_path: catalog_path.with_file_name(PARTITION_CATALOG_FILE),
            catalog_path,
        }
    }

    pub fn with_partition_catalog(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.partition_catalog_path = path.into();
        self
    }

    /// Get the path to an artifact file.
    pub fn artifact_path(&self, artifact: Artifact) -> Utf8PathBuf {
        self.logs_dir.join(artifact.file_name())
    }

    pub fn catalog_path(&self) -> &Utf8Path {
        &self.catalog_path
    }

    pub fn partition_catalog_path(&self) -> &Utf8Path {
        &self.partition_catalog_path
    }
}

pub const PARTITION_CATALOG_FILE: &str = "partition_metadata.json";

fn io_err(path: &Utf8Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_owned(),
        source,
    }
}

/// Write via a sibling temp file and rename, so readers never see a
/// half-written artifact.
fn write_replace(path: &Utf8Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

fn read_optional(path: &Utf8Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path)(e)),
    }
}

impl StateStore for FsStore {
    fn read_artifact(&self, artifact: Artifact) -> Result<Option<String>, StoreError> {
        read_optional(&self.artifact_path(artifact))
    }

    fn write_artifact(&self, artifact: Artifact, content: &str) -> Result<(), StoreError> {
        let path = self.artifact_path(artifact);
        write_replace(&path, content)?;
        tracing::debug!(path = %path, bytes = content.len(), "Wrote artifact");
        Ok(())
    }

    fn artifact_modified(
        &self,
        artifact: Artifact,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let path = self.artifact_path(artifact);
        match fs::metadata(&path) {
            Ok(meta) => {
                let modified = meta.modified().map_err(io_err(&path))?;
                Ok(Some(modified.into()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    fn load_catalog(&self) -> Result<ModuleCatalog, StoreError> {
        let Some(content) = read_optional(&self.catalog_path)? else {
            tracing::warn!(path = %self.catalog_path, "Module catalog not found, starting empty");
            return Ok(ModuleCatalog::default());
        };
        let file: CatalogFile =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: self.catalog_path.clone(),
                source,
            })?;
        Ok(file.into())
    }

    fn save_catalog(&self, catalog: &ModuleCatalog) -> Result<(), StoreError> {
        let content =
            serde_json::to_string_pretty(catalog).map_err(|source| StoreError::Json {
                path: self.catalog_path.clone(),
                source,
            })?;
        write_replace(&self.catalog_path, &content)
    }

    fn load_partition_catalog(&self) -> Result<PartitionCatalog, StoreError> {
        let path = &self.partition_catalog_path;
        let Some(content) = read_optional(path)? else {
            tracing::debug!(path = %path, "No partition metadata");
            return Ok(PartitionCatalog::default());
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    artifacts: Mutex<HashMap<Artifact, (String, DateTime<Utc>)>>,
    catalog: Mutex<ModuleCatalog>,
    partition_catalog: PartitionCatalog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an artifact with an explicit modification time.
    pub fn with_artifact(
        self,
        artifact: Artifact,
        content: impl Into<String>,
        modified: DateTime<Utc>,
    ) -> Self {
        if let Ok(mut artifacts) = self.artifacts.lock() {
            artifacts.insert(artifact, (content.into(), modified));
        }
        self
    }

    pub fn with_catalog(self, catalog: ModuleCatalog) -> Self {
        if let Ok(mut current) = self.catalog.lock() {
            *current = catalog;
        }
        self
    }

    pub fn with_partition_catalog(mut self, catalog: PartitionCatalog) -> Self {
        self.partition_catalog = catalog;
        self
    }
}

impl StateStore for MemoryStore {
    fn read_artifact(&self, artifact: Artifact) -> Result<Option<String>, StoreError> {
        let artifacts = self.artifacts.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(artifacts.get(&artifact).map(|(content, _)| content.clone()))
    }

    fn write_artifact(&self, artifact: Artifact, content: &str) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.lock().map_err(|_| StoreError::Poisoned)?;
        artifacts.insert(artifact, (content.to_string(), Utc::now()));
        Ok(())
    }

    fn artifact_modified(
        &self,
        artifact: Artifact,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let artifacts = self.artifacts.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(artifacts.get(&artifact).map(|(_, modified)| *modified))
    }

    fn load_catalog(&self) -> Result<ModuleCatalog, StoreError> {
        let catalog = self.catalog.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(catalog.clone())
    }

    fn save_catalog(&self, catalog: &ModuleCatalog) -> Result<(), StoreError> {
        let mut current = self.catalog.lock().map_err(|_| StoreError::Poisoned)?;
        *current = catalog.clone();
        Ok(())
    }

    fn load_partition_catalog(&self) -> Result<PartitionCatalog, StoreError> {
        Ok(self.partition_catalog.clone())
    }
}
