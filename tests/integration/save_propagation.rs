//! Integration tests for saves travelling up the context chain

use super::test_utils::{memory_manager, sled_manager};
use strata::{attributes, ContextError, SaveOutcome, StoreSlot, Value};
use tempfile::TempDir;

#[test]
fn background_commit_then_main_save_survives_restart() {
    let dir = TempDir::new().unwrap();
    let id = {
        let manager = sled_manager(&dir);
        let main = manager.main_context();
        let background = manager.background_context().unwrap();

        let id = background
            .insert("Author", attributes([("name", "Tolkien")]))
            .unwrap();

        background.commit().unwrap();
        assert!(main.exists(&id).unwrap());
        assert_eq!(main.pending_counts().unwrap().inserted, 1);

        let outcome = manager.save(None).unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { levels: 1, .. }));
        id
    };

    let manager = sled_manager(&dir);
    let record = manager.main_context().get(&id).unwrap().unwrap();
    assert_eq!(record.get("name"), Some(&Value::from("Tolkien")));
}

#[test]
fn saving_a_nested_context_reaches_the_store() {
    let dir = TempDir::new().unwrap();
    let id = {
        let manager = sled_manager(&dir);
        let background = manager.background_context().unwrap();
        let nested = manager.background_context_from(&background).unwrap();

        let id = nested.insert("Author", attributes([("name", "Lem")])).unwrap();
        let outcome = manager.save(Some(&nested)).unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                objects: 1,
                levels: 3,
                store: StoreSlot::Durable
            }
        );
        assert!(!nested.has_changes().unwrap());
        assert!(!background.has_changes().unwrap());
        assert!(!manager.main_context().has_changes().unwrap());
        id
    };

    let manager = sled_manager(&dir);
    assert!(manager.main_context().exists(&id).unwrap());
}

#[test]
fn save_carries_unrelated_ancestor_changes_along() {
    let manager = memory_manager();
    let main = manager.main_context();
    let from_main = main.insert("Author", attributes([("name", "Main")])).unwrap();

    let background = manager.background_context().unwrap();
    background
        .insert("Author", attributes([("name", "Background")]))
        .unwrap();
    manager.save(Some(&background)).unwrap();

    let fresh = manager.create_context(None).unwrap();
    assert!(fresh.exists(&from_main).unwrap());
    assert_eq!(fresh.count("Author").unwrap(), 2);
}

#[test]
fn later_child_snapshot_wins() {
    let manager = memory_manager();
    let main = manager.main_context();
    let id = main
        .insert("Book", attributes([("title", "Draft")]))
        .unwrap();
    manager.save(None).unwrap();

    let first = manager.background_context().unwrap();
    let second = manager.background_context().unwrap();
    first.set(&id, "title", "First").unwrap();
    second.set(&id, "title", "Second").unwrap();

    manager.save(Some(&first)).unwrap();
    manager.save(Some(&second)).unwrap();

    let record = main.get(&id).unwrap().unwrap();
    assert_eq!(record.get("title"), Some(&Value::from("Second")));
    assert_eq!(record.get("in_print"), Some(&Value::Bool(true)));
}

#[test]
fn stale_update_does_not_resurrect_a_deleted_object() {
    let dir = TempDir::new().unwrap();
    let manager = sled_manager(&dir);
    let main = manager.main_context();
    let id = main
        .insert("Author", attributes([("name", "Vance")]))
        .unwrap();
    manager.save(None).unwrap();

    let editor = manager.background_context().unwrap();
    editor.set(&id, "name", "Jack Vance").unwrap();

    let deleter = manager.create_context(None).unwrap();
    deleter.delete(&id).unwrap();
    manager.save(Some(&deleter)).unwrap();

    let err = manager.save(Some(&editor)).unwrap_err();
    assert!(matches!(
        err,
        ContextError::MergeConflict { ref object, .. } if object == &id
    ));
    assert_eq!(err.kind(), "merge_conflict");

    // The editor's level committed; main failed and keeps the stale update.
    assert!(!editor.has_changes().unwrap());
    assert!(main.has_changes().unwrap());
    let fresh = manager.create_context(None).unwrap();
    assert!(!fresh.exists(&id).unwrap());

    main.rollback().unwrap();
    assert!(!main.exists(&id).unwrap());
    assert!(matches!(manager.save(None).unwrap(), SaveOutcome::NoChanges));
}

#[test]
fn saving_a_destroyed_context_fails() {
    let manager = memory_manager();
    let background = manager.background_context().unwrap();
    manager.destroy_context(&background).unwrap();

    assert!(matches!(
        manager.save(Some(&background)),
        Err(ContextError::UnknownContext(_))
    ));
}

#[test]
fn relationships_to_pending_objects_commit_together() {
    let manager = memory_manager();
    let background = manager.background_context().unwrap();
    let author = background
        .insert("Author", attributes([("name", "Banks")]))
        .unwrap();
    let book = background
        .insert(
            "Book",
            attributes([
                ("title", Value::from("Excession")),
                ("author", Value::Reference(author.clone())),
            ]),
        )
        .unwrap();

    manager.save(Some(&background)).unwrap();

    let stored = manager.main_context().get(&book).unwrap().unwrap();
    assert_eq!(stored.get("author"), Some(&Value::Reference(author)));
}
