//! Dashboard settings: built-in defaults, then the JSON settings file, then
//! command-line overrides.

use crate::Args;
use camino::{Utf8Path, Utf8PathBuf};
use hpcdash_modules::DescribeOptions;
use hpcdash_quota::{MountPoint, default_mounts};
use hpcdash_state::{DashboardConfig, MaxAges};
use hpcdash_store::FsStore;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid settings in {path}: {source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Collector ages, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxAgeSecs {
    pub modules: u64,
    pub partitions: u64,
    pub quota: u64,
}

impl Default for MaxAgeSecs {
    fn default() -> Self {
        let ages = MaxAges::default();
        Self {
            modules: ages.modules.as_secs(),
            partitions: ages.partitions.as_secs(),
            quota: ages.quota.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub logs_dir: Utf8PathBuf,
    pub catalog_path: Utf8PathBuf,
    /// Defaults to `partition_metadata.json` beside the module catalog
    pub partition_metadata_path: Option<Utf8PathBuf>,
    pub workers: usize,
    pub lookup_timeout_secs: u64,
    pub load_command: String,
    pub mounts: Vec<MountPoint>,
    pub max_age_secs: MaxAgeSecs,
}

impl Default for Settings {
    fn default() -> Self {
        let describe = DescribeOptions::default();
        Self {
            logs_dir: Utf8PathBuf::from("logs"),
            catalog_path: Utf8PathBuf::from("config/module_categories.json"),
            partition_metadata_path: None,
            workers: describe.workers,
            lookup_timeout_secs: describe.timeout.as_secs(),
            load_command: DashboardConfig::default().load_command,
            mounts: default_mounts(),
            max_age_secs: MaxAgeSecs::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Utf8Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| SettingsError::Json {
            path: path.to_owned(),
            source,
        })
    }

    /// Settings file named by `args`, with its command-line overrides applied.
    pub fn from_args(args: &Args) -> Result<Self, SettingsError> {
        let mut settings = Self::load(&args.config)?;
        if let Some(logs_dir) = &args.logs_dir {
            settings.logs_dir = logs_dir.clone();
        }
        if let Some(catalog) = &args.catalog {
            settings.catalog_path = catalog.clone();
        }
        if let Some(workers) = args.workers {
            settings.workers = workers;
        }
        Ok(settings)
    }

    pub fn store(&self) -> FsStore {
        let store = FsStore::new(self.logs_dir.clone(), self.catalog_path.clone());
        match &self.partition_metadata_path {
            Some(path) => store.with_partition_catalog(path.clone()),
            None => store,
        }
    }

    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            describe: DescribeOptions {
                workers: self.workers.max(1),
                timeout: Duration::from_secs(self.lookup_timeout_secs),
            },
            load_command: self.load_command.clone(),
            mounts: self.mounts.clone(),
            max_ages: MaxAges {
                modules: Duration::from_secs(self.max_age_secs.modules),
                partitions: Duration::from_secs(self.max_age_secs.partitions),
                quota: Duration::from_secs(self.max_age_secs.quota),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn write_settings(temp: &TempDir, content: &str) -> Utf8PathBuf {
        let path = Utf8Path::from_path(temp.path()).unwrap().join("dashboard.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = Utf8Path::from_path(temp.path()).unwrap().join("absent.json");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.workers, 8);
        assert_eq!(settings.lookup_timeout_secs, 5);
        assert_eq!(settings.load_command, "slurm-load");
        assert_eq!(settings.mounts[0].label, "HOME");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = write_settings(
            &temp,
            r#"{
                "workers": 2,
                "mounts": [{"label": "PROJECT", "path": "/projects/$USER"}],
                "max_age_secs": {"partitions": 60}
            }"#,
        );
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.logs_dir, "logs");
        assert_eq!(settings.mounts, vec![MountPoint::new("PROJECT", "/projects/$USER")]);

        let config = settings.dashboard_config();
        assert_eq!(config.describe.workers, 2);
        assert_eq!(config.max_ages.partitions, Duration::from_secs(60));
        assert_eq!(config.max_ages.modules, Duration::from_secs(3600));
    }

    #[test]
    fn test_partition_metadata_path() {
        let settings = Settings::default();
        assert_eq!(
            settings.store().partition_catalog_path().as_str(),
            "config/partition_metadata.json"
        );

        let temp = TempDir::new().unwrap();
        let path = write_settings(
            &temp,
            r#"{"partition_metadata_path": "/etc/hpcdash/partitions.json"}"#,
        );
        let settings = Settings::load(&path).unwrap();
        assert_eq!(
            settings.store().partition_catalog_path().as_str(),
            "/etc/hpcdash/partitions.json"
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = write_settings(&temp, "{ not json");
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Json { .. })
        ));

        let path = write_settings(&temp, r#"{"wrokers": 3}"#);
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_command_line_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_settings(&temp, r#"{"logs_dir": "/var/hpcdash/logs", "workers": 4}"#);
        let args = Args::try_parse_from([
            "hpcdash",
            "--config",
            path.as_str(),
            "--workers",
            "16",
            "refresh",
        ])
        .unwrap();

        let settings = Settings::from_args(&args).unwrap();
        assert_eq!(settings.workers, 16);
        assert_eq!(settings.logs_dir, "/var/hpcdash/logs");
        assert_eq!(
            settings.store().artifact_path(hpcdash_store::Artifact::Modules),
            "/var/hpcdash/logs/modules.txt"
        );
    }
}
