//! Work directory layout for batch reconciliation runs

use crate::error::{EqualizerError, Result};
use crate::reconcile::ReconcileOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Optional per-directory configuration file
pub const CONFIG_FILE: &str = "equalizer.json";

pub const INSERT_DATA_FILE: &str = "insert_data.json";
pub const UPDATE_DATA_FILE: &str = "update_data.json";
pub const DELETE_DATA_FILE: &str = "delete_data.json";
pub const EQUALIZED_DATA_FILE: &str = "equalized_data.json";
pub const RUN_REPORT_FILE: &str = "run_report.json";

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Settings read from `equalizer.json`; every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkDirConfig {
    pub pretty: bool,
    pub parallel: bool,
    pub processed_dir: String,
    pub error_dir: String,
}

impl Default for WorkDirConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            parallel: true,
            processed_dir: "processed_data".to_string(),
            error_dir: "error_data".to_string(),
        }
    }
}

impl WorkDirConfig {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            parallel: self.parallel,
            ..ReconcileOptions::default()
        }
    }
}

/// A directory holding the inputs of one batch run and receiving its outputs.
#[derive(Debug, Clone)]
pub struct WorkDir {
    pub root: PathBuf,
    pub processed_dir: PathBuf,
    pub error_dir: PathBuf,
    pub config: WorkDirConfig,
}

impl WorkDir {
    /// Open an existing work directory and load its configuration, if any.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(EqualizerError::invalid_input(format!(
                "work dir does not exist: {}",
                root.display()
            )));
        }
        let config = Self::load_config(root)?;
        Ok(Self::with_config(root.to_path_buf(), config))
    }

    pub fn with_config(root: PathBuf, config: WorkDirConfig) -> Self {
        let processed_dir = root.join(&config.processed_dir);
        let error_dir = root.join(&config.error_dir);
        Self {
            root,
            processed_dir,
            error_dir,
            config,
        }
    }

    fn load_config(root: &Path) -> Result<WorkDirConfig> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(WorkDirConfig::default());
        }
        let value = read_json_file(&path)?;
        let config: WorkDirConfig = serde_json::from_value(value).map_err(|e| {
            EqualizerError::config(format!("invalid {}: {}", path.display(), e))
        })?;
        log::debug!("loaded work dir config from {}", path.display());
        Ok(config)
    }

    /// Resolve an input file name against the work dir, requiring it to exist.
    pub fn require_input(&self, name: &Path) -> Result<PathBuf> {
        let path = if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.root.join(name)
        };
        if !path.is_file() {
            return Err(EqualizerError::invalid_input(format!(
                "input file does not exist: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.processed_dir)?;
        fs::create_dir_all(&self.error_dir)?;
        Ok(())
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.processed_dir.join(file_name)
    }

    /// Move the top-level files of the work dir into `target_dir`.
    ///
    /// Subdirectories and the configuration file stay where they are.
    pub fn move_files_to(&self, target_dir: &Path) -> Result<usize> {
        if !target_dir.is_dir() {
            return Err(EqualizerError::invalid_input(format!(
                "target directory does not exist: {}",
                target_dir.display()
            )));
        }

        let mut moved = 0;
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.file_name() == CONFIG_FILE {
                continue;
            }
            fs::rename(entry.path(), target_dir.join(entry.file_name()))?;
            moved += 1;
        }
        log::info!("moved {} files to {}", moved, target_dir.display());
        Ok(moved)
    }
}

/// Read a JSON document, tolerating a leading UTF-8 byte order mark.
pub fn read_json_file(path: &Path) -> Result<serde_json::Value> {
    let bytes = fs::read(path)?;
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    serde_json::from_slice(bytes).map_err(|e| {
        EqualizerError::invalid_input(format!("cannot parse {}: {}", path.display(), e))
    })
}

pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, data: &T, pretty: bool) -> Result<()> {
    let content = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    fs::write(path, content)?;
    Ok(())
}
