//! Integration tests for reopening a store with a different model

use super::test_utils::{library_model, sled_manager};
use std::sync::Arc;
use strata::model::{AttributeKind, EntityDescription};
use strata::{ContextError, ContextManager, ManagerSettings, Model, SledStore};
use tempfile::TempDir;

#[test]
fn reopening_with_a_changed_model_fails() {
    let dir = TempDir::new().unwrap();
    drop(sled_manager(&dir));

    let mut model = library_model();
    model.version = 2;
    let store = SledStore::open(&dir.path().join("store")).unwrap();
    let result =
        ContextManager::with_store(Arc::new(model), Arc::new(store), ManagerSettings::default());

    match result {
        Err(ContextError::SchemaMismatch { expected, found }) => {
            assert!(expected.starts_with("library v2"));
            assert!(found.starts_with("library v1"));
        }
        Err(other) => panic!("expected SchemaMismatch, got {:?}", other),
        Ok(_) => panic!("expected SchemaMismatch, got a manager"),
    }
}

#[test]
fn reopening_with_the_same_model_keeps_metadata() {
    let dir = TempDir::new().unwrap();
    let created_at = sled_manager(&dir).store_metadata().created_at;

    let manager = sled_manager(&dir);
    assert_eq!(manager.store_metadata().created_at, created_at);
    assert_eq!(manager.store_metadata().model_name, "library");
}

#[test]
fn a_structurally_different_model_is_a_mismatch() {
    let dir = TempDir::new().unwrap();
    drop(sled_manager(&dir));

    let other = Model::new(
        "library",
        1,
        vec![EntityDescription::new("Author").attribute("name", AttributeKind::String)],
    )
    .unwrap();
    let store = SledStore::open(&dir.path().join("store")).unwrap();
    let err = ContextManager::with_store(Arc::new(other), Arc::new(store), ManagerSettings::default())
        .err()
        .unwrap();
    assert_eq!(err.kind(), "schema_mismatch");
}
