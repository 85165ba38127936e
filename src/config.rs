//! Configuration System
//!
//! Layered configuration: built-in defaults, a global user file, workspace
//! files and `STRATA_` environment variables, merged by the `config` crate
//! and validated before a manager is opened.

use crate::coordinator::PurgeMode;
use crate::logging::LoggingConfig;
use crate::manager::BackgroundParent;
use crate::store::StoreKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Store backend and location
    #[serde(default)]
    pub store: StoreConfig,

    /// Object model file
    #[serde(default)]
    pub model: ModelConfig,

    /// Context hierarchy defaults
    #[serde(default)]
    pub contexts: ContextConfig,

    /// Bulk delete behavior
    #[serde(default)]
    pub purge: PurgeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage engine: sled or memory
    #[serde(default = "default_backend")]
    pub backend: StoreKind,

    /// Store directory (sled backend only)
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Flush to disk after every commit that reaches the store
    #[serde(default = "default_true")]
    pub flush_on_save: bool,
}

fn default_backend() -> StoreKind {
    StoreKind::Sled
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".strata/store")
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
            flush_on_save: default_true(),
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path of the TOML model file
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model.toml")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Parent of contexts made by `background_context`: main or coordinator
    #[serde(default)]
    pub background_parent: BackgroundParent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// atomic or best_effort
    #[serde(default)]
    pub mode: PurgeMode,
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Store(String),
    Model(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::Model(msg) => write!(f, "Model: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StrataConfig {
    /// Validate the entire configuration, reporting every problem found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.store.backend == StoreKind::Sled && self.store.path.as_os_str().is_empty() {
            errors.push(ValidationError::Store(
                "Store path cannot be empty for the sled backend".to_string(),
            ));
        }
        if self.model.path.as_os_str().is_empty() {
            errors.push(ValidationError::Model("Model path cannot be empty".to_string()));
        }
        if !matches!(self.logging.format.as_str(), "json" | "text") {
            errors.push(ValidationError::Logging(format!(
                "Invalid log format '{}' (must be 'json' or 'text')",
                self.logging.format
            )));
        }
        if !matches!(
            self.logging.output.as_str(),
            "stdout" | "stderr" | "file" | "both"
        ) {
            errors.push(ValidationError::Logging(format!(
                "Invalid log output '{}'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Anchor relative store, model and log paths at `root`.
    pub fn resolve_paths(&mut self, root: &Path) {
        let anchor = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };
        anchor(&mut self.store.path);
        anchor(&mut self.model.path);
        anchor(&mut self.logging.file);
    }
}
