//! Platform configuration
//!
//! Loaded from a TOML file or built programmatically. The configuration
//! decides where per-tenant stores live and which modules are always on.

use crate::error::{WorkfoldError, WorkfoldResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the workspace platform core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkfoldConfig {
    /// Root directory for the core store and per-workspace stores
    pub storage_root: PathBuf,
    /// Locale used for localized fields written without an explicit locale
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Currency tag used when seeding workspace options
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Identifiers of modules active for every workspace regardless of
    /// subscriptions
    #[serde(default)]
    pub default_modules: Vec<String>,
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for WorkfoldConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("data"),
            default_locale: default_locale(),
            default_currency: default_currency(),
            default_modules: Vec::new(),
        }
    }
}

impl WorkfoldConfig {
    /// Create a configuration rooted at the given storage path.
    pub fn new(storage_root: PathBuf) -> Self {
        Self {
            storage_root,
            ..Default::default()
        }
    }

    /// Path of the core (catalog) store.
    pub fn core_store_path(&self) -> PathBuf {
        self.storage_root.join("core")
    }

    /// Path of the dedicated store for a workspace identifier.
    pub fn workspace_store_path(&self, identifier: &str) -> PathBuf {
        // identifier is already whitespace-free; dashes become underscores
        // to keep store directory names uniform
        self.storage_root
            .join("workspaces")
            .join(identifier.replace('-', "_"))
    }
}

/// Load a [`WorkfoldConfig`] from a TOML file.
pub fn load_config(path: &Path) -> WorkfoldResult<WorkfoldConfig> {
    let raw = std::fs::read_to_string(path)?;
    toml::from_str(&raw).map_err(|e| WorkfoldError::Config(e.to_string()))
}
