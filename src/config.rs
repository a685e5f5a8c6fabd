// src/config.rs

//! Engine configuration
//!
//! Every tunable the builder, extractor and legacy adapter need is carried
//! in an [`EngineConfig`] value passed to their constructors. The config can
//! be loaded from a TOML file:
//!
//! ```toml
//! package_folder = "datapackage"
//! merge_suffix = ".tmp"
//! chunk_size = 65536
//! producer = "missionpack"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Smallest copy buffer the engine accepts
pub const MIN_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Folder (relative to an extraction root) that holds extracted packages
    pub package_folder: String,
    /// Suffix appended to a target path for the merge-forward copy
    pub merge_suffix: String,
    /// Suffix appended to a legacy archive path while it is being rewritten
    pub upgrade_suffix: String,
    /// Copy buffer size; cancellation is polled once per chunk
    pub chunk_size: usize,
    /// Producing application, written into the zip comment
    pub producer: String,
    /// Directory for staging nested containers (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            package_folder: "datapackage".to_string(),
            merge_suffix: ".tmp".to_string(),
            upgrade_suffix: ".upgrade".to_string(),
            chunk_size: 64 * 1024,
            producer: "missionpack".to_string(),
            temp_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string; missing keys take defaults
    pub fn parse(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.package_folder.trim().is_empty() {
            return Err(Error::Config("package_folder must not be empty".to_string()));
        }
        if self.merge_suffix.is_empty() || self.upgrade_suffix.is_empty() {
            return Err(Error::Config("path suffixes must not be empty".to_string()));
        }
        if self.merge_suffix == self.upgrade_suffix {
            return Err(Error::Config(
                "merge_suffix and upgrade_suffix must differ".to_string(),
            ));
        }
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::Config(format!(
                "chunk_size must be at least {} bytes",
                MIN_CHUNK_SIZE
            )));
        }
        Ok(())
    }

    /// Directory used for staging temporary copies
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// `path` with `suffix` appended to its file name
    pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut os = path.as_os_str().to_owned();
        os.push(suffix);
        PathBuf::from(os)
    }

    /// Location of the merge-forward copy for a build target
    pub fn merge_path(&self, target: &Path) -> PathBuf {
        Self::with_suffix(target, &self.merge_suffix)
    }

    /// Location of the rewritten archive during a legacy upgrade
    pub fn upgrade_path(&self, archive: &Path) -> PathBuf {
        Self::with_suffix(archive, &self.upgrade_suffix)
    }
}
