//! Settings file handling.
//!
//! Every field has a default, so a missing file, an empty object, or a file
//! naming only one field all load. Unknown fields are rejected to catch typos.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::installer::DEFAULT_REFRESH_COMMAND;
use crate::resources::ResourceThresholds;

/// Default per-command timeout: half an hour covers the slowest installers
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 1800;

/// Operator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub resource_thresholds: ResourceThresholds,
    /// Run the resource precheck before installing
    pub resource_check: bool,
    /// Per-command timeout in seconds; 0 disables the timeout
    pub command_timeout_secs: u64,
    /// Refresh the package index before installing (Linux)
    pub refresh_index: bool,
    pub index_refresh_command: String,
    /// Catalog JSON to use instead of the built-in table
    pub catalog_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resource_thresholds: ResourceThresholds::default(),
            resource_check: true,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            refresh_index: true,
            index_refresh_command: DEFAULT_REFRESH_COMMAND.to_string(),
            catalog_path: None,
        }
    }
}

impl Settings {
    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load and validate settings from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;

        let settings: Self =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {:?}", path.as_ref()))?;

        Ok(settings)
    }

    /// Load from `path` if given, otherwise defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.resource_thresholds.is_valid() {
            anyhow::bail!("Resource thresholds must be between 0 and 100");
        }

        if self.refresh_index && self.index_refresh_command.trim().is_empty() {
            anyhow::bail!("index_refresh_command cannot be empty while refresh_index is enabled");
        }

        if let Some(path) = &self.catalog_path {
            if path.as_os_str().is_empty() {
                anyhow::bail!("catalog_path cannot be empty");
            }
        }

        Ok(())
    }

    /// Timeout applied to each shell command
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    /// Refresh command to run, if refreshing is enabled
    pub fn refresh_command(&self) -> Option<String> {
        self.refresh_index
            .then(|| self.index_refresh_command.trim().to_string())
    }
}
