//! CLI route: single route table and run context. Dispatches to the manager and presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_purge_report, format_records_json, format_records_text, format_save_outcome,
    format_status_json, format_status_text, EntityCount, StatusView,
};
use crate::config::{ConfigLoader, StrataConfig};
use crate::error::{ContextError, ModelError};
use crate::manager::ContextManager;
use crate::model::Model;
use crate::object::{AttributeMap, Value};
use crate::types::ObjectId;
use std::path::{Path, PathBuf};
use tracing::info;

/// Runtime context for CLI execution: loaded configuration and an open manager.
pub struct RunContext {
    manager: ContextManager,
    config: StrataConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Load configuration (explicit file or workspace layering), validate it
    /// and open the manager it describes.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ContextError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };

        config.validate().map_err(|errors| {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            ContextError::ConfigError(joined)
        })?;

        let manager = ContextManager::open(&config)?;
        Ok(Self {
            manager,
            config,
            workspace_root,
        })
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Run one command and return the text to print.
    pub fn execute(&self, command: &Commands) -> Result<String, ContextError> {
        match command {
            Commands::Init => self.handle_init(),
            Commands::Status { format } => self.handle_status(format),
            Commands::List { entity, format } => self.handle_list(entity, format),
            Commands::Insert { entity, values } => self.handle_insert(entity, values),
            Commands::Update { id, values } => self.handle_update(id, values),
            Commands::Delete { id } => self.handle_delete(id),
            Commands::Purge { yes } => self.handle_purge(*yes),
        }
    }

    fn handle_init(&self) -> Result<String, ContextError> {
        self.manager.flush()?;
        let metadata = self.manager.store_metadata();
        Ok(format!(
            "Store ready at {} for {}",
            self.config.store.path.display(),
            metadata.model_label()
        ))
    }

    fn handle_status(&self, format: &str) -> Result<String, ContextError> {
        let main = self.manager.main_context();
        let mut entities = Vec::new();
        for name in self.manager.model().entity_names() {
            entities.push(EntityCount {
                entity: name.to_string(),
                objects: main.count(name)?,
            });
        }

        let metadata = self.manager.store_metadata();
        let status = StatusView {
            backend: self.manager.store_kind().to_string(),
            store_path: self.config.store.path.display().to_string(),
            model: metadata.model_label(),
            model_hash: metadata.model_hash.clone(),
            created_at: metadata.created_at.to_rfc3339(),
            entities,
        };

        match format {
            "json" => format_status_json(&status),
            "text" => Ok(format_status_text(&status)),
            other => Err(invalid_format(other)),
        }
    }

    fn handle_list(&self, entity: &str, format: &str) -> Result<String, ContextError> {
        let records = self.manager.main_context().fetch(entity)?;
        match format {
            "json" => format_records_json(&records),
            "text" => Ok(format_records_text(entity, &records)),
            other => Err(invalid_format(other)),
        }
    }

    fn handle_insert(&self, entity: &str, values: &[String]) -> Result<String, ContextError> {
        let attributes = parse_assignments(self.manager.model(), entity, values)?;
        let background = self.manager.background_context()?;
        let id = background.insert(entity, attributes)?;
        let outcome = self.manager.save(Some(&background));
        self.manager.destroy_context(&background)?;
        let outcome = outcome?;
        info!(object = %id, "Inserted object from CLI");
        Ok(format!("{}\n{}", id, format_save_outcome(&outcome)))
    }

    fn handle_update(&self, id: &str, values: &[String]) -> Result<String, ContextError> {
        let id = parse_object_id(id)?;
        let attributes = parse_assignments(self.manager.model(), id.entity(), values)?;
        let main = self.manager.main_context();
        main.update(&id, attributes)?;
        let outcome = self.manager.save(None)?;
        Ok(format_save_outcome(&outcome))
    }

    fn handle_delete(&self, id: &str) -> Result<String, ContextError> {
        let id = parse_object_id(id)?;
        let main = self.manager.main_context();
        main.delete(&id)?;
        let outcome = self.manager.save(None)?;
        Ok(format_save_outcome(&outcome))
    }

    fn handle_purge(&self, yes: bool) -> Result<String, ContextError> {
        if !yes {
            return Err(ContextError::ConfigError(
                "purge removes every stored object; pass --yes to confirm".to_string(),
            ));
        }
        let report = self.manager.delete_all_contents()?;
        Ok(format_purge_report(&report))
    }
}

fn invalid_format(format: &str) -> ContextError {
    ContextError::ConfigError(format!(
        "Invalid output format '{}' (must be 'text' or 'json')",
        format
    ))
}

fn parse_object_id(text: &str) -> Result<ObjectId, ContextError> {
    text.parse::<ObjectId>()
        .map_err(|e| ContextError::Model(ModelError::Invalid(e)))
}

/// Turn `name=value` arguments into attributes of `entity`.
///
/// Attribute values are parsed with the attribute's kind. Relationship values
/// are an object id, or a comma separated list of ids for to-many
/// relationships. `null` clears a property.
pub fn parse_assignments(
    model: &Model,
    entity: &str,
    assignments: &[String],
) -> Result<AttributeMap, ContextError> {
    let description = model
        .entity(entity)
        .ok_or_else(|| ContextError::UnknownEntity(entity.to_string()))?;

    let mut attributes = AttributeMap::new();
    for assignment in assignments {
        let (name, raw) = assignment.split_once('=').ok_or_else(|| {
            ModelError::Invalid(format!("expected name=value, got '{}'", assignment))
        })?;

        let value = if raw == "null" {
            Value::Null
        } else if let Some(attribute) = description.find_attribute(name) {
            attribute.kind.parse_value(raw)?
        } else if let Some(relationship) = description.find_relationship(name) {
            if relationship.to_many {
                let ids = raw
                    .split(',')
                    .filter(|part| !part.trim().is_empty())
                    .map(|part| parse_object_id(part.trim()))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::References(ids)
            } else {
                Value::Reference(parse_object_id(raw)?)
            }
        } else {
            return Err(ModelError::Invalid(format!(
                "entity '{}' has no property '{}'",
                entity, name
            ))
            .into());
        };
        attributes.insert(name.to_string(), value);
    }
    Ok(attributes)
}
