//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key; tables merge, scalars
/// replace.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("store.backend", "sled")?
        .set_default("store.path", ".strata/store")?
        .set_default("store.flush_on_save", true)?
        .set_default("model.path", "model.toml")?
        .set_default("contexts.background_parent", "main")?
        .set_default("purge.mode", "atomic")
}
