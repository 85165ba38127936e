//! Model file loading (TOML).

use crate::error::ModelError;
use crate::model::Model;
use std::path::Path;
use tracing::debug;

/// Parse a model from TOML text and check it.
pub fn from_toml_str(text: &str) -> Result<Model, ModelError> {
    let model: Model = toml::from_str(text).map_err(|e| ModelError::Parse(e.to_string()))?;
    model.check()?;
    Ok(model)
}

/// Load a model file from disk.
pub fn load(path: &Path) -> Result<Model, ModelError> {
    let text = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let model = from_toml_str(&text)?;
    debug!(
        path = %path.display(),
        model = %model.name,
        version = model.version,
        entities = model.entities.len(),
        "Loaded object model"
    );
    Ok(model)
}
