//! Config loader: builds a [`StrataConfig`] from every source in precedence order.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::StrataConfig;
use config::{ConfigError, Environment, File};
use std::path::Path;

/// Loads layered configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence, lowest first: defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{STRATA_ENV}.toml`, then
    /// `STRATA_*` environment variables (`__` separates nested keys, e.g.
    /// `STRATA_STORE__BACKEND=memory`). Relative paths are anchored at
    /// `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<StrataConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(env_source());

        let mut config: StrataConfig = builder.build()?.try_deserialize()?;
        config.resolve_paths(workspace_root);
        Ok(config)
    }

    /// Load configuration from one explicit file plus environment overrides.
    ///
    /// Relative paths are anchored at the file's directory.
    pub fn load_from_file(path: &Path) -> Result<StrataConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .add_source(env_source());

        let mut config: StrataConfig = builder.build()?.try_deserialize()?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("STRATA")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
