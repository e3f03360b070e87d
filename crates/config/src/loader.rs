use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use {
    anyhow::{Context, Result},
    serde_yaml::Value,
    tracing::{debug, info, warn},
};

use crate::{
    env_subst::substitute_env,
    schema::{BridgeConfig, CURRENT_CONFIG_VERSION, parse_version},
};

/// Config file name inside the data directory.
pub const CONFIG_FILENAME: &str = "config.yml";

/// Data directory used when the host does not provide one.
pub const DEFAULT_DATA_DIR: &str = "plugins/mc-vtod";

/// The bundled default config, written out when the file is missing or stale.
pub const DEFAULT_CONFIG: &str = include_str!("default_config.yml");

const VERSION_KEY: &str = "configuration-version";

/// What [`ConfigStore::ensure`] had to do to get a usable file on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum EnsureOutcome {
    /// The file was present and current.
    Existing,
    /// No file was present; the default was written.
    Created,
    /// The file was outdated. It was moved to the backup path and the
    /// default was written in its place.
    Replaced {
        stale_version: Option<f64>,
        backup: PathBuf,
    },
}

/// Access to `config.yml` inside a plugin data directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    data_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILENAME)
    }

    /// Where an outdated config of `stale_version` is moved before the
    /// default replaces it, e.g. `config.yml.1.1.bak`.
    pub fn backup_path(&self, stale_version: Option<f64>) -> PathBuf {
        self.data_dir.join(backup_name(stale_version, None))
    }

    /// First backup path not already taken, so earlier backups survive.
    fn free_backup_path(&self, stale_version: Option<f64>) -> PathBuf {
        let mut path = self.backup_path(stale_version);
        let mut n = 2;
        while path.exists() {
            path = self.data_dir.join(backup_name(stale_version, Some(n)));
            n += 1;
        }
        path
    }

    /// Make sure the data directory and a current config file exist.
    pub fn ensure(&self) -> Result<EnsureOutcome> {
        if !self.data_dir.exists() {
            info!(path = %self.data_dir.display(), "creating data directory");
            fs::create_dir_all(&self.data_dir).with_context(|| {
                format!("failed to create data directory {}", self.data_dir.display())
            })?;
            info!(path = %absolute(&self.data_dir).display(), "data directory created");
        }

        let path = self.config_path();
        info!(path = %absolute(&path).display(), "expected config path");

        if !path.exists() {
            write_default(&path)?;
            return Ok(EnsureOutcome::Created);
        }

        let version = read_version(&path)?;
        if version.is_some_and(|v| v >= CURRENT_CONFIG_VERSION) {
            debug!(path = %path.display(), version = ?version, "config is current");
            return Ok(EnsureOutcome::Existing);
        }

        warn!(
            path = %path.display(),
            stale_version = ?version,
            current_version = CURRENT_CONFIG_VERSION,
            "config file is outdated, replacing it with the bundled default"
        );
        let backup = self.free_backup_path(version);
        fs::rename(&path, &backup).with_context(|| {
            format!("failed to move {} to {}", path.display(), backup.display())
        })?;
        info!(backup = %backup.display(), "previous config kept as backup");
        write_default(&path)?;

        Ok(EnsureOutcome::Replaced {
            stale_version: version,
            backup,
        })
    }

    /// Load the config file. Fails if it does not exist; call
    /// [`ConfigStore::ensure`] first to have the default written.
    pub fn load(&self) -> Result<BridgeConfig> {
        load_config(&self.config_path())
    }

    /// Load the file as a flat string-keyed mapping.
    pub fn load_raw(&self) -> Result<BTreeMap<String, Value>> {
        load_raw(&self.config_path())
    }
}

/// Load and parse a config file, with env substitution.
pub fn load_config(path: &Path) -> Result<BridgeConfig> {
    let raw = read_substituted(path)?;
    if raw.trim().is_empty() {
        return Ok(BridgeConfig::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Read only the `configuration-version` field.
///
/// Returns `None` when the field is absent or not a number.
pub fn read_version(path: &Path) -> Result<Option<f64>> {
    let map = load_raw(path)?;
    Ok(map.get(VERSION_KEY).and_then(parse_version))
}

fn load_raw(path: &Path) -> Result<BTreeMap<String, Value>> {
    let raw = read_substituted(path)?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_substituted(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(substitute_env(&raw))
}

fn write_default(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config to {}", path.display()))?;
    info!(path = %path.display(), "wrote default config file");
    Ok(())
}

fn backup_name(stale_version: Option<f64>, n: Option<u32>) -> String {
    let version = stale_version.map_or_else(|| "unversioned".to_string(), |v| v.to_string());
    match n {
        Some(n) => format!("{CONFIG_FILENAME}.{version}-{n}.bak"),
        None => format!("{CONFIG_FILENAME}.{version}.bak"),
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
