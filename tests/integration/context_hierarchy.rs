//! Integration tests for context isolation and one-level commits

use super::test_utils::memory_manager;
use strata::{attributes, ContextError, Parent, StoreSlot, Value};

#[test]
fn sibling_contexts_do_not_see_each_other() {
    let manager = memory_manager();
    let a = manager.background_context().unwrap();
    let b = manager.background_context().unwrap();

    let id = a.insert("Author", attributes([("name", "Le Guin")])).unwrap();

    assert!(a.exists(&id).unwrap());
    assert!(!b.exists(&id).unwrap());
    assert!(!manager.main_context().exists(&id).unwrap());
    assert_eq!(b.count("Author").unwrap(), 0);
}

#[test]
fn commit_moves_changes_exactly_one_level() {
    let manager = memory_manager();
    let main = manager.main_context();
    let background = manager.background_context().unwrap();
    let nested = manager.background_context_from(&background).unwrap();

    let id = nested.insert("Author", attributes([("name", "Herbert")])).unwrap();
    let outcome = nested.commit().unwrap();

    assert_eq!(outcome.objects, 1);
    assert_eq!(outcome.target, Parent::Context(background.id()));
    assert!(!nested.has_changes().unwrap());
    assert_eq!(background.pending_counts().unwrap().inserted, 1);
    assert!(!main.exists(&id).unwrap());

    let outcome = background.commit().unwrap();
    assert_eq!(outcome.target, Parent::Context(main.id()));
    assert!(main.exists(&id).unwrap());
    assert!(main.has_changes().unwrap());

    let outcome = main.commit().unwrap();
    assert_eq!(outcome.target, Parent::Store(StoreSlot::Durable));
    assert!(!main.has_changes().unwrap());
}

#[test]
fn children_read_through_parent_pending_state() {
    let manager = memory_manager();
    let main = manager.main_context();
    let id = main.insert("Author", attributes([("name", "Butler")])).unwrap();

    let child = manager.background_context().unwrap();
    let seen = child.get(&id).unwrap().unwrap();
    assert_eq!(seen.get("name"), Some(&Value::from("Butler")));

    child.set(&id, "name", "Octavia Butler").unwrap();
    assert_eq!(
        main.get(&id).unwrap().unwrap().get("name"),
        Some(&Value::from("Butler"))
    );

    child.commit().unwrap();
    assert_eq!(
        main.get(&id).unwrap().unwrap().get("name"),
        Some(&Value::from("Octavia Butler"))
    );
}

#[test]
fn deletes_in_a_child_hide_objects_until_committed() {
    let manager = memory_manager();
    let main = manager.main_context();
    let id = main.insert("Author", attributes([("name", "Ellison")])).unwrap();
    manager.save(None).unwrap();

    let child = manager.background_context().unwrap();
    child.delete(&id).unwrap();
    assert!(!child.exists(&id).unwrap());
    assert_eq!(child.count("Author").unwrap(), 0);
    assert!(main.exists(&id).unwrap());

    assert!(matches!(
        child.delete(&id),
        Err(ContextError::ObjectNotFound(_))
    ));
}

#[test]
fn rollback_discards_only_local_changes() {
    let manager = memory_manager();
    let main = manager.main_context();
    main.insert("Author", attributes([("name", "Kept")])).unwrap();

    let child = manager.background_context().unwrap();
    child.insert("Author", attributes([("name", "Dropped")])).unwrap();
    let dropped = child.rollback().unwrap();

    assert_eq!(dropped.inserted, 1);
    assert!(!child.has_changes().unwrap());
    assert_eq!(child.count("Author").unwrap(), 1);
    assert!(main.has_changes().unwrap());
}

#[test]
fn in_memory_context_never_reaches_the_durable_store() {
    let manager = memory_manager();
    let scratch = manager.in_memory_context().unwrap();
    let id = scratch.insert("Author", attributes([("name", "Scratch")])).unwrap();

    manager.save(Some(&scratch)).unwrap();

    assert!(scratch.exists(&id).unwrap());
    assert!(!manager.main_context().exists(&id).unwrap());
    assert_eq!(manager.main_context().count("Author").unwrap(), 0);
}

#[test]
fn perform_runs_work_on_the_context() {
    let manager = memory_manager();
    let background = manager.background_context().unwrap();

    let id = background
        .perform(|ctx| ctx.insert("Author", attributes([("name", "Inside")])))
        .unwrap()
        .unwrap();

    assert!(background.exists(&id).unwrap());
}

#[test]
fn contexts_can_be_used_from_worker_threads() {
    let manager = memory_manager();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                let ctx = manager.background_context().unwrap();
                ctx.insert("Author", attributes([("name", format!("writer {}", i))]))
                    .unwrap();
                manager.save(Some(&ctx)).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.main_context().count("Author").unwrap(), 4);
    assert!(!manager.main_context().has_changes().unwrap());
}
