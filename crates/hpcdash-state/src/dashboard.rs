//! The dashboard: collectors in, parsed records out.

use crate::types::{DashboardConfig, RefreshError, RefreshMode, Section, SectionError, SectionStatus};
use chrono::{DateTime, Utc};
use hpcdash_modules::{
    ModuleFamily, build_families, collect_descriptions, collect_listing, parse_listing,
};
use hpcdash_parsers::CommandRunner;
use hpcdash_quota::{QuotaRecord, collect_quota, parse_quota};
use hpcdash_slurm::{
    ClusterLoad, Partition, PartitionReference, PartitionSummary, collect_load, collect_sinfo,
    parse_load, parse_sinfo, partition_reference,
};
use hpcdash_store::{Artifact, ModuleCatalog, PartitionCatalog, StateStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Parsed partition state together with the load report captured alongside it.
#[derive(Debug, Clone, Default)]
struct PartitionState {
    partitions: Vec<Partition>,
    reference: BTreeMap<String, Vec<PartitionReference>>,
    load: Option<ClusterLoad>,
}

/// Holds the last good records per section and refreshes them on demand.
///
/// A section whose refresh fails keeps serving its previous records and is
/// marked stale in [`Dashboard::section_status`].
pub struct Dashboard<R, S> {
    runner: Arc<R>,
    store: S,
    config: DashboardConfig,

    modules: Vec<ModuleFamily>,
    partitions: PartitionState,
    quotas: Vec<QuotaRecord>,

    status: BTreeMap<Section, SectionStatus>,
}

impl<R, S> Dashboard<R, S>
where
    R: CommandRunner + 'static,
    S: StateStore,
{
    pub fn new(runner: R, store: S, config: DashboardConfig) -> Self {
        Self {
            runner: Arc::new(runner),
            store,
            config,
            modules: Vec::new(),
            partitions: PartitionState::default(),
            quotas: Vec::new(),
            status: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn modules(&self) -> &[ModuleFamily] {
        &self.modules
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions.partitions
    }

    pub fn partition_summary(&self) -> PartitionSummary {
        PartitionSummary::from_partitions(&self.partitions.partitions)
    }

    /// Catalogued partitions grouped by category.
    pub fn partition_reference(&self) -> &BTreeMap<String, Vec<PartitionReference>> {
        &self.partitions.reference
    }

    /// `None` when the load tool is unavailable.
    pub fn cluster_load(&self) -> Option<&ClusterLoad> {
        self.partitions.load.as_ref()
    }

    pub fn quotas(&self) -> &[QuotaRecord] {
        &self.quotas
    }

    pub fn section_status(&self, section: Section) -> SectionStatus {
        self.status.get(&section).cloned().unwrap_or_default()
    }

    /// Run the collectors and re-parse their output.
    ///
    /// Sections are refreshed one after another. A failing section does not
    /// stop the rest; every failure is reported together once all sections
    /// have been tried. Returns the sections whose collectors ran.
    pub async fn refresh(&mut self, mode: RefreshMode) -> Result<Vec<Section>, RefreshError> {
        let mut refreshed = Vec::new();
        let mut failures = Vec::new();

        for section in Section::ALL {
            let modified = match self.store.artifact_modified(section.artifact()) {
                Ok(modified) => modified,
                Err(e) => {
                    failures.push((section, self.record_failure(section, e.into())));
                    continue;
                }
            };

            let max_age = self.config.max_ages.for_section(section);
            if mode == RefreshMode::IfStale && !is_stale(modified, max_age, Utc::now()) {
                tracing::debug!(%section, "Artifact is fresh, skipping collector");
                if !self.status.contains_key(&section)
                    && let Err(e) = self.reload_section(section)
                {
                    failures.push((section, self.record_failure(section, e)));
                }
                continue;
            }

            tracing::info!(%section, "Refreshing");
            match self.collect_section(section).await {
                Ok(()) => {
                    let status = self.status.entry(section).or_default();
                    status.refreshed_at = Some(Utc::now());
                    status.artifact_modified =
                        self.store.artifact_modified(section.artifact()).ok().flatten();
                    status.stale = false;
                    status.last_error = None;
                    refreshed.push(section);
                }
                Err(e) => failures.push((section, self.record_failure(section, e))),
            }
        }

        if failures.is_empty() {
            Ok(refreshed)
        } else {
            Err(RefreshError { failures })
        }
    }

    /// Re-parse every stored artifact without running any collector.
    pub fn reload(&mut self) -> Result<(), RefreshError> {
        let mut failures = Vec::new();
        for section in Section::ALL {
            if let Err(e) = self.reload_section(section) {
                failures.push((section, self.record_failure(section, e)));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RefreshError { failures })
        }
    }

    fn record_failure(&mut self, section: Section, error: SectionError) -> SectionError {
        tracing::warn!(%section, error = %error, "Section refresh failed, keeping previous records");
        let status = self.status.entry(section).or_default();
        status.stale = true;
        status.last_error = Some(error.to_string());
        error
    }

    fn reload_section(&mut self, section: Section) -> Result<(), SectionError> {
        match section {
            Section::Modules => {
                let raw = self.read(Artifact::Modules)?;
                let catalog = self.store.load_catalog()?;
                self.modules = families_from(&raw, &catalog);
            }
            Section::Partitions => {
                let raw = self.read(Artifact::Partitions)?;
                let load = self.read(Artifact::SlurmLoad)?;
                self.partitions = self.partition_state(&raw, &load);
            }
            Section::Quota => {
                let raw = self.read(Artifact::DiskQuota)?;
                self.quotas = parse_quota(&raw);
            }
        }

        let status = self.status.entry(section).or_default();
        status.artifact_modified = self.store.artifact_modified(section.artifact())?;
        status.stale = false;
        status.last_error = None;
        Ok(())
    }

    fn read(&self, artifact: Artifact) -> Result<String, SectionError> {
        Ok(self.store.read_artifact(artifact)?.unwrap_or_default())
    }

    async fn collect_section(&mut self, section: Section) -> Result<(), SectionError> {
        match section {
            Section::Modules => self.modules = self.collect_modules().await?,
            Section::Partitions => self.partitions = self.collect_partitions().await?,
            Section::Quota => self.quotas = self.collect_quotas().await?,
        }
        Ok(())
    }

    async fn collect_modules(&self) -> Result<Vec<ModuleFamily>, SectionError> {
        let raw = collect_listing(self.runner.as_ref()).await?;
        self.store.write_artifact(Artifact::Modules, &raw)?;

        let listing = parse_listing(&raw);
        let descriptions = collect_descriptions(
            Arc::clone(&self.runner),
            listing.keys().cloned(),
            &self.config.describe,
        )
        .await;
        let catalog = self.store.merge_descriptions(descriptions)?;

        Ok(build_families(&listing, &catalog))
    }

    async fn collect_partitions(&self) -> Result<PartitionState, SectionError> {
        let raw = collect_sinfo(self.runner.as_ref()).await?;
        let load = collect_load(self.runner.as_ref(), &self.config.load_command).await;
        self.store.write_artifact(Artifact::SlurmLoad, &load)?;
        self.store.write_artifact(Artifact::Partitions, &raw)?;
        Ok(self.partition_state(&raw, &load))
    }

    /// Parse partition artifacts against the site's partition catalog.
    ///
    /// An unreadable catalog leaves every partition in the default category.
    fn partition_state(&self, raw: &str, load: &str) -> PartitionState {
        let catalog = self.store.load_partition_catalog().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Partition metadata unreadable, using defaults");
            PartitionCatalog::default()
        });
        let partitions = parse_sinfo(raw, &catalog);
        PartitionState {
            reference: partition_reference(&partitions, &catalog),
            partitions,
            load: parse_load(load),
        }
    }

    async fn collect_quotas(&self) -> Result<Vec<QuotaRecord>, SectionError> {
        let raw = collect_quota(self.runner.as_ref(), &self.config.mounts).await?;
        self.store.write_artifact(Artifact::DiskQuota, &raw)?;
        Ok(parse_quota(&raw))
    }

    /// Assign a category and rebuild the module records from the stored listing.
    pub fn categorize(&mut self, family: &str, category: &str) -> Result<(), SectionError> {
        let catalog = self.store.assign_category(family, category)?;
        let raw = self.read(Artifact::Modules)?;
        self.modules = families_from(&raw, &catalog);
        Ok(())
    }
}

fn families_from(raw: &str, catalog: &ModuleCatalog) -> Vec<ModuleFamily> {
    build_families(&parse_listing(raw), catalog)
}

/// An artifact is stale once it is at least `max_age` old. Missing artifacts
/// are always stale; timestamps in the future never are.
fn is_stale(modified: Option<DateTime<Utc>>, max_age: Duration, now: DateTime<Utc>) -> bool {
    match modified {
        None => true,
        Some(modified) => match (now - modified).to_std() {
            Ok(age) => age >= max_age,
            Err(_) => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpcdash_modules::describe::spider_command;
    use hpcdash_modules::listing::listing_command;
    use hpcdash_parsers::testing::{Reply, ScriptedRunner};
    use hpcdash_quota::{MountPoint, df_command};
    use hpcdash_slurm::load_command;
    use hpcdash_slurm::sinfo::sinfo_command;
    use hpcdash_store::{DEFAULT_CATEGORY, DEFAULT_PARTITION_CATEGORY, FsStore, MemoryStore};
    use tempfile::TempDir;

    const LISTING: &str = "GCC/11.2.0\nGCC/10.2.0\nR/4.3.1\nrc/3DSlicer/5.2.2\n";

    const SINFO: &str = "\
PARTITION AVAIL TIMELIMIT NODES(A/I/O/T) NODELIST
normal*      up   infinite      5/3/0/8 node[01-08]
gpu          up 2-00:00:00      1/1/0/2 g[01-02]
";

    const LOAD: &str = "Allocated nodes: 6\nIdle nodes: 4\n";

    const DF: &str = "\
Filesystem Size Used Avail Use% Mounted on
nfs:/home  5.0T 3.1T 1.9T  62% /home
";

    fn catalog(categories: &[(&str, &str)], descriptions: &[(&str, &str)]) -> ModuleCatalog {
        let map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        ModuleCatalog {
            categories: map(categories),
            descriptions: map(descriptions),
        }
    }

    /// A runner that answers every collector, with one existing mount.
    fn cluster(home: &TempDir) -> (ScriptedRunner, DashboardConfig) {
        let home_path = home.path().to_str().unwrap().to_string();
        let runner = ScriptedRunner::new()
            .on(listing_command(), Reply::stdout(LISTING))
            .on(
                spider_command("GCC"),
                Reply::stdout("    Description:\n      GNU compilers\n"),
            )
            .on(
                spider_command("R"),
                Reply::stdout("    Description:\n      R language\n"),
            )
            .on(spider_command("rc/3DSlicer"), Reply::exit(1, "no such module"))
            .on(sinfo_command(), Reply::stdout(SINFO))
            .on(load_command("slurm-load"), Reply::stdout(LOAD))
            .on(df_command(&home_path), Reply::stdout(DF));

        let config = DashboardConfig {
            mounts: vec![
                MountPoint::new("HOME", home_path.as_str()),
                MountPoint::new("SCRATCH", "/nonexistent/gpfs/scratch/alice"),
            ],
            ..DashboardConfig::default()
        };
        (runner, config)
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        let max_age = Duration::from_secs(300);
        assert!(is_stale(None, max_age, now));
        assert!(is_stale(Some(now - chrono::Duration::seconds(300)), max_age, now));
        assert!(!is_stale(Some(now - chrono::Duration::seconds(10)), max_age, now));
        assert!(!is_stale(Some(now + chrono::Duration::seconds(60)), max_age, now));
    }

    #[tokio::test]
    async fn test_force_refresh_populates_every_section() {
        let home = TempDir::new().unwrap();
        let (runner, config) = cluster(&home);
        let store = MemoryStore::new().with_catalog(catalog(&[("GCC", "Compilers")], &[]));
        let mut dashboard = Dashboard::new(runner, store, config);

        let refreshed = dashboard.refresh(RefreshMode::Force).await.unwrap();
        assert_eq!(refreshed, Section::ALL.to_vec());

        let names: Vec<&str> = dashboard.modules().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["GCC", "R", "rc/3DSlicer"]);
        let gcc = &dashboard.modules()[0];
        assert_eq!(gcc.category, "Compilers");
        assert_eq!(gcc.description, "GNU compilers");
        assert_eq!(gcc.versions, vec!["GCC/10.2.0", "GCC/11.2.0"]);
        assert_eq!(dashboard.modules()[1].category, DEFAULT_CATEGORY);
        assert_eq!(dashboard.modules()[2].description, "");

        assert_eq!(dashboard.partitions()[0].name, "gpu");
        assert_eq!(dashboard.partition_summary().total_nodes, 10);
        assert_eq!(dashboard.cluster_load().unwrap().idle_nodes, Some(4));

        assert_eq!(dashboard.quotas().len(), 1);
        assert_eq!(dashboard.quotas()[0].label, "HOME");

        let store = dashboard.store();
        assert_eq!(
            store.read_artifact(Artifact::Partitions).unwrap().as_deref(),
            Some(SINFO)
        );
        assert_eq!(
            store.read_artifact(Artifact::SlurmLoad).unwrap().as_deref(),
            Some(LOAD)
        );
        assert!(
            store
                .read_artifact(Artifact::DiskQuota)
                .unwrap()
                .unwrap()
                .starts_with("[HOME] ")
        );

        let status = dashboard.section_status(Section::Modules);
        assert!(status.refreshed_at.is_some());
        assert!(!status.stale);
    }

    #[tokio::test]
    async fn test_description_merge_keeps_categories() {
        let home = TempDir::new().unwrap();
        let (runner, config) = cluster(&home);
        let store = MemoryStore::new().with_catalog(catalog(
            &[("GCC", "Compilers"), ("Retired", "Old stuff")],
            &[("Retired", "gone"), ("GCC", "stale text")],
        ));
        let mut dashboard = Dashboard::new(runner, store, config);
        dashboard.refresh(RefreshMode::Force).await.unwrap();

        let saved = dashboard.store().load_catalog().unwrap();
        assert_eq!(
            saved.categories,
            catalog(&[("GCC", "Compilers"), ("Retired", "Old stuff")], &[]).categories
        );
        assert_eq!(
            saved.descriptions,
            catalog(
                &[],
                &[("GCC", "GNU compilers"), ("R", "R language"), ("rc/3DSlicer", "")]
            )
            .descriptions
        );
    }

    #[tokio::test]
    async fn test_deep_module_family_gets_its_description() {
        let runner = ScriptedRunner::new()
            .on(listing_command(), Reply::stdout("bio/tools/samtools/1.17\n"))
            .on(
                spider_command("bio/tools/samtools"),
                Reply::stdout("    Description:\n      Samtools for SAM files\n"),
            );
        let config = DashboardConfig {
            mounts: vec![],
            ..DashboardConfig::default()
        };
        let mut dashboard = Dashboard::new(runner, MemoryStore::new(), config);
        dashboard.refresh(RefreshMode::Force).await.unwrap();

        let family = &dashboard.modules()[0];
        assert_eq!(family.name, "bio/tools/samtools");
        assert_eq!(family.description, "Samtools for SAM files");
        assert_eq!(family.versions, vec!["bio/tools/samtools/1.17"]);

        let saved = dashboard.store().load_catalog().unwrap();
        assert_eq!(
            saved.descriptions,
            catalog(&[], &[("bio/tools/samtools", "Samtools for SAM files")]).descriptions
        );
    }

    #[tokio::test]
    async fn test_partitions_take_catalog_categories() {
        let catalog = serde_json::from_str(
            r#"{"gpu": {"category": "GPU", "nodes_per_researcher": 1, "priority_tier": "high"}}"#,
        )
        .unwrap();
        let store = MemoryStore::new().with_partition_catalog(catalog);
        let runner = ScriptedRunner::new().on(sinfo_command(), Reply::stdout(SINFO));
        let config = DashboardConfig {
            mounts: vec![],
            ..DashboardConfig::default()
        };
        let mut dashboard = Dashboard::new(runner, store, config);
        dashboard.refresh(RefreshMode::Force).await.unwrap();

        let gpu = &dashboard.partitions()[0];
        assert_eq!((gpu.name.as_str(), gpu.category.as_str()), ("gpu", "GPU"));
        assert_eq!(dashboard.partitions()[1].category, DEFAULT_PARTITION_CATEGORY);

        let reference = dashboard.partition_reference();
        assert_eq!(reference.len(), 1);
        assert_eq!(reference["GPU"][0].nodes, 2);
        assert_eq!(reference["GPU"][0].nodes_per_researcher.as_deref(), Some("1"));
    }

    #[test]
    fn test_unreadable_partition_catalog_keeps_partitions() {
        let temp = TempDir::new().unwrap();
        let root = camino::Utf8Path::from_path(temp.path()).unwrap();
        let store = FsStore::new(root.join("logs"), root.join("module_categories.json"));
        std::fs::write(store.partition_catalog_path(), "{ not json").unwrap();
        store.write_artifact(Artifact::Partitions, SINFO).unwrap();

        let mut dashboard = Dashboard::new(ScriptedRunner::new(), store, DashboardConfig::default());
        dashboard.reload().unwrap();

        assert_eq!(dashboard.partitions().len(), 2);
        assert!(
            dashboard
                .partitions()
                .iter()
                .all(|p| p.category == DEFAULT_PARTITION_CATEGORY)
        );
        assert!(dashboard.partition_reference().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_artifacts_skip_collectors() {
        let now = Utc::now();
        let store = MemoryStore::new()
            .with_artifact(Artifact::Modules, LISTING, now)
            .with_artifact(Artifact::Partitions, SINFO, now)
            .with_artifact(Artifact::SlurmLoad, "not found", now)
            .with_artifact(Artifact::DiskQuota, format!("[HOME] /home/alice\n{DF}"), now);
        let runner = ScriptedRunner::new();
        let mut dashboard = Dashboard::new(runner, store, DashboardConfig::default());

        let refreshed = dashboard.refresh(RefreshMode::IfStale).await.unwrap();
        assert!(refreshed.is_empty());
        assert_eq!(dashboard.runner.call_count(), 0);

        // Records still come from the stored artifacts.
        assert_eq!(dashboard.modules().len(), 3);
        assert_eq!(dashboard.partitions().len(), 2);
        assert!(dashboard.cluster_load().is_none());
        assert_eq!(dashboard.quotas()[0].path, "/home/alice");
        assert_eq!(
            dashboard.section_status(Section::Partitions).artifact_modified,
            Some(now)
        );
    }

    #[tokio::test]
    async fn test_stale_artifacts_are_recollected() {
        let old = Utc::now() - chrono::Duration::seconds(600);
        let now = Utc::now();
        let store = MemoryStore::new()
            .with_artifact(Artifact::Modules, LISTING, now)
            .with_artifact(Artifact::Partitions, "stale capture", old)
            .with_artifact(Artifact::DiskQuota, "", now);
        let runner = ScriptedRunner::new().on(sinfo_command(), Reply::stdout(SINFO));
        let mut dashboard = Dashboard::new(runner, store, DashboardConfig::default());

        let refreshed = dashboard.refresh(RefreshMode::IfStale).await.unwrap();
        assert_eq!(refreshed, vec![Section::Partitions]);
        assert_eq!(dashboard.partitions().len(), 2);
        // The load tool is unscripted, so the marker is stored.
        assert_eq!(
            dashboard
                .store()
                .read_artifact(Artifact::SlurmLoad)
                .unwrap()
                .as_deref(),
            Some("not found")
        );
    }

    #[tokio::test]
    async fn test_failed_section_keeps_previous_records() {
        let store = MemoryStore::new().with_artifact(Artifact::Partitions, SINFO, Utc::now());
        let runner = ScriptedRunner::new()
            .on(sinfo_command(), Reply::exit(1, "Unable to contact slurm controller"));
        let config = DashboardConfig {
            mounts: vec![],
            ..DashboardConfig::default()
        };
        let mut dashboard = Dashboard::new(runner, store, config);
        dashboard.reload().unwrap();
        assert_eq!(dashboard.partitions().len(), 2);

        let error = dashboard.refresh(RefreshMode::Force).await.unwrap_err();
        assert_eq!(error.sections().collect::<Vec<_>>(), vec![Section::Partitions]);

        assert_eq!(dashboard.partitions().len(), 2);
        let status = dashboard.section_status(Section::Partitions);
        assert!(status.stale);
        assert!(status.last_error.unwrap().contains("sinfo"));

        // Other sections degraded to empty output without failing.
        assert!(dashboard.modules().is_empty());
        assert!(!dashboard.section_status(Section::Modules).stale);
    }

    #[tokio::test]
    async fn test_categorize_rebuilds_modules() {
        let store = MemoryStore::new().with_artifact(Artifact::Modules, LISTING, Utc::now());
        let mut dashboard = Dashboard::new(ScriptedRunner::new(), store, DashboardConfig::default());
        dashboard.reload().unwrap();

        dashboard.categorize("rc/", "Research Computing").unwrap();
        let slicer = dashboard
            .modules()
            .iter()
            .find(|f| f.name == "rc/3DSlicer")
            .unwrap();
        assert_eq!(slicer.category, "Research Computing");
        assert_eq!(
            dashboard.store().load_catalog().unwrap().categories["rc/"],
            "Research Computing"
        );
    }
}
