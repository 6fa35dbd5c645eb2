//! shellvec configuration
//!
//! `config.yaml` holds session defaults; `state.yaml` holds the stored
//! arguments of every module so that one-shot CLI invocations share them.

use serde::{Deserialize, Serialize};
use shellvec_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "shellvec";

/// Chunk sizing for modules that split a working set across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Items per request when the probed service is local to the target.
    pub local_size: usize,
    /// Items per request for any other host.
    pub remote_size: usize,
    /// Host substrings treated as local.
    pub local_hosts: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            local_size: 5000,
            remote_size: 20,
            local_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

impl ChunkingConfig {
    pub fn size_for_host(&self, host: &str) -> usize {
        if self.local_hosts.iter().any(|marker| host.contains(marker.as_str())) {
            self.local_size
        } else {
            self.remote_size
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Verbosity stack, most specific last. Empty prints every message.
    pub verbosity: Vec<u8>,
    /// Capability tags usable from the start of a session.
    pub capabilities: Vec<String>,
    pub chunking: ChunkingConfig,
    /// Where stored arguments are persisted. Defaults to the data dir.
    pub state_path: Option<PathBuf>,
}

impl Config {
    /// `~/.config/shellvec/config.yaml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.yaml")
    }

    /// Load from `path`, or the default location. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        if config.chunking.local_size == 0 || config.chunking.remote_size == 0 {
            return Err(Error::Config("chunk sizes must be greater than zero".to_string()));
        }

        Ok(config)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_path.clone().unwrap_or_else(StateFile::default_path)
    }
}

/// Stored arguments for one module. `None` marks an explicitly cleared key.
pub type StoredMap = BTreeMap<String, Option<String>>;

/// Per-module stored arguments persisted across invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub modules: BTreeMap<String, StoredMap>,
}

impl StateFile {
    /// `~/.local/share/shellvec/state.yaml`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("state.yaml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write to a temp file first, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self).map_err(|e| Error::Config(e.to_string()))?;
        let temp_path = path.with_extension("yaml.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<&StoredMap> {
        self.modules.get(name)
    }

    pub fn set_module(&mut self, name: &str, stored: StoredMap) {
        if stored.is_empty() {
            self.modules.remove(name);
        } else {
            self.modules.insert(name.to_string(), stored);
        }
    }
}
