// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{DEFAULT_DEBUG_DUMP_BYTES, DEFAULT_DMA_HEAP};
use crate::errors::ExportResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// File name looked up under the user configuration directory
const CONFIG_FILE_NAME: &str = "isp-export.json";

/// Runtime settings for an export pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on waiting for the converter, in milliseconds.
    /// `None` waits forever, which hangs the caller if the driver stalls.
    pub completion_timeout_ms: Option<u64>,
    /// Map the converted buffer after every conversion and log its first bytes
    pub debug_dump: bool,
    /// Number of bytes logged by the debug dump
    pub debug_dump_bytes: usize,
    /// dma-heap device node backing the physical buffer
    pub dma_heap: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            completion_timeout_ms: None,
            debug_dump: false,
            debug_dump_bytes: DEFAULT_DEBUG_DUMP_BYTES,
            dma_heap: PathBuf::from(DEFAULT_DMA_HEAP),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> ExportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> ExportResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        debug!(path = %path.display(), ?config, "Loaded pipeline configuration");
        Ok(config)
    }

    /// Default location: `$XDG_CONFIG_HOME/isp-export.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring invalid configuration");
                Self::default()
            }
        }
    }

    pub fn completion_timeout(&self) -> Option<Duration> {
        self.completion_timeout_ms.map(Duration::from_millis)
    }
}
