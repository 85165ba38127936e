//! Record validation against the model.
//!
//! Runs at commit time, never on individual writes, so an object may pass
//! through invalid intermediate states inside a context.

use crate::error::ContextError;
use crate::model::Model;
use crate::object::{ObjectRecord, Value};
use crate::types::ObjectId;
use std::collections::BTreeSet;

/// Validate one record.
///
/// `visible` reports whether a referenced object exists from the committing
/// context's point of view (its own pending state, its ancestors, the store).
pub fn validate_record<F>(model: &Model, record: &ObjectRecord, mut visible: F) -> Result<(), ContextError>
where
    F: FnMut(&ObjectId) -> Result<bool, ContextError>,
{
    let entity = model
        .entity(record.entity())
        .ok_or_else(|| ContextError::UnknownEntity(record.entity().to_string()))?;

    let failure = |attribute: &str, reason: String| ContextError::ValidationFailure {
        object: record.id.clone(),
        attribute: attribute.to_string(),
        reason,
    };

    for (name, value) in &record.attributes {
        if let Some(attribute) = entity.find_attribute(name) {
            if !attribute.kind.accepts(value) {
                return Err(failure(
                    name,
                    format!("expected {:?}, got {}", attribute.kind, value.type_name()),
                ));
            }
        } else if let Some(relationship) = entity.find_relationship(name) {
            let shape_ok = match value {
                Value::Null => true,
                Value::Reference(_) => !relationship.to_many,
                Value::References(_) => relationship.to_many,
                _ => false,
            };
            if !shape_ok {
                let expected = if relationship.to_many {
                    "references"
                } else {
                    "reference"
                };
                return Err(failure(
                    name,
                    format!("expected {}, got {}", expected, value.type_name()),
                ));
            }
            for target in value.referenced_ids() {
                if target.entity() != relationship.destination {
                    return Err(failure(
                        name,
                        format!(
                            "{} is not a {} object",
                            target, relationship.destination
                        ),
                    ));
                }
                if !visible(target)? {
                    return Err(failure(name, format!("{} does not exist", target)));
                }
            }
        } else {
            return Err(failure(
                name,
                format!("'{}' is not a property of {}", name, entity.name),
            ));
        }
    }

    for attribute in entity.attributes.iter().filter(|a| !a.optional) {
        if record.get(&attribute.name).map_or(true, Value::is_null) {
            return Err(failure(&attribute.name, "required attribute is missing".to_string()));
        }
    }
    for relationship in entity.relationships.iter().filter(|r| !r.optional) {
        if record.get(&relationship.name).map_or(true, Value::is_null) {
            return Err(failure(
                &relationship.name,
                "required relationship is missing".to_string(),
            ));
        }
    }

    Ok(())
}

/// Reject `record` if any of its relationships points at an object in `deleted`.
///
/// Deleting an object does not cascade, so a commit that removes a target
/// must also clear or remove every visible reference to it.
pub fn check_deleted_targets(
    model: &Model,
    record: &ObjectRecord,
    deleted: &BTreeSet<ObjectId>,
) -> Result<(), ContextError> {
    let Some(entity) = model.entity(record.entity()) else {
        return Ok(());
    };
    for relationship in &entity.relationships {
        let Some(value) = record.get(&relationship.name) else {
            continue;
        };
        if let Some(target) = value
            .referenced_ids()
            .into_iter()
            .find(|id| deleted.contains(*id))
        {
            return Err(ContextError::ValidationFailure {
                object: record.id.clone(),
                attribute: relationship.name.clone(),
                reason: format!("{} is deleted but still referenced", target),
            });
        }
    }
    Ok(())
}
