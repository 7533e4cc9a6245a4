pub mod store;
pub mod types;

pub use store::{FsStore, MemoryStore, PARTITION_CATALOG_FILE, StateStore, StoreError};
pub use types::{
    Artifact, DEFAULT_CATEGORY, DEFAULT_PARTITION_CATEGORY, ModuleCatalog, PartitionCatalog,
    PartitionInfo,
};
