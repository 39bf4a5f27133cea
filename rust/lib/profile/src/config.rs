use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Environment variable naming a TOML config file for the global store.
pub const CONFIG_ENV: &str = "ATLAS_PROFILE_CONFIG";
/// Environment variable naming the data directory for the global store.
pub const DATA_DIR_ENV: &str = "ATLAS_DATA_DIR";

/// Property store configuration, usually read from a TOML file:
///
/// ```toml
/// [storage]
/// data_dir = "/var/lib/atlas"
/// config_db = "config.db"
/// qc_db = "qc.db"
/// data_db = "data.db"
/// wal = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Locations of the three logical databases.
///
/// Relative database paths resolve against `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub config_db: PathBuf,
    pub qc_db: PathBuf,
    pub data_db: PathBuf,
    /// Open databases in WAL journal mode.
    pub wal: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            config_db: PathBuf::from("config.db"),
            qc_db: PathBuf::from("qc.db"),
            data_db: PathBuf::from("data.db"),
            wal: true,
        }
    }
}

impl ProfileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProfileError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ProfileError> {
        toml::from_str(content).map_err(|e| ProfileError::Config(e.to_string()))
    }

    /// Configuration with the config database at `path`; the QC and data
    /// databases live next to it with their default names.
    pub fn for_config_file(path: &Path) -> Self {
        let data_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let config_db = path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| StorageConfig::default().config_db);
        Self {
            storage: StorageConfig {
                data_dir,
                config_db,
                ..StorageConfig::default()
            },
        }
    }

    /// Resolve configuration from the process environment.
    ///
    /// `ATLAS_PROFILE_CONFIG` names a TOML file; otherwise `ATLAS_DATA_DIR`
    /// sets the data directory; otherwise defaults apply.
    pub fn from_env() -> Result<Self, ProfileError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProfileError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Self::load(Path::new(&path));
        }
        let mut config = Self::default();
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            config.storage.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn resolve_config_db(&self) -> PathBuf {
        self.resolve(&self.storage.config_db)
    }

    pub fn resolve_qc_db(&self) -> PathBuf {
        self.resolve(&self.storage.qc_db)
    }

    pub fn resolve_data_db(&self) -> PathBuf {
        self.resolve(&self.storage.data_db)
    }

    /// Reject configurations that place two logical databases in one file.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let resolved = [
            ("config_db", self.resolve_config_db()),
            ("qc_db", self.resolve_qc_db()),
            ("data_db", self.resolve_data_db()),
        ];
        for (i, (name, path)) in resolved.iter().enumerate() {
            for (other, other_path) in &resolved[i + 1..] {
                if path.components().eq(other_path.components()) {
                    return Err(ProfileError::Config(format!(
                        "{name} and {other} both resolve to {}",
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.storage.data_dir.join(path)
        }
    }
}
