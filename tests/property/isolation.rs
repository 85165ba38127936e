//! Property-based tests for isolation guarantees

use proptest::prelude::*;
use strata::model::{AttributeKind, EntityDescription};
use strata::{attributes, Context, ContextManager, Model, ObjectId, ObjectRecord};

#[derive(Debug, Clone)]
enum Op {
    Insert(i64),
    Update(usize, i64),
    Delete(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i64>().prop_map(Op::Insert),
        (any::<usize>(), any::<i64>()).prop_map(|(i, v)| Op::Update(i, v)),
        any::<usize>().prop_map(Op::Delete),
    ]
}

fn manager() -> ContextManager {
    let model = Model::new(
        "counters",
        1,
        vec![EntityDescription::new("Counter").attribute("value", AttributeKind::Integer)],
    )
    .unwrap();
    ContextManager::in_memory(model).unwrap()
}

/// Apply ops to `ctx`, picking update/delete targets among visible objects.
fn apply(ctx: &Context, ops: &[Op]) {
    for op in ops {
        let visible: Vec<ObjectId> = ctx
            .fetch("Counter")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        match op {
            Op::Insert(v) => {
                ctx.insert("Counter", attributes([("value", *v)])).unwrap();
            }
            Op::Update(i, v) if !visible.is_empty() => {
                ctx.set(&visible[i % visible.len()], "value", *v).unwrap();
            }
            Op::Delete(i) if !visible.is_empty() => {
                ctx.delete(&visible[i % visible.len()]).unwrap();
            }
            _ => {}
        }
    }
}

fn view(ctx: &Context) -> Vec<ObjectRecord> {
    ctx.fetch("Counter").unwrap()
}

/// Uncommitted work in one context is invisible to its parent and siblings
#[test]
fn test_pending_changes_stay_private_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::vec(op_strategy(), 0..12),
                prop::collection::vec(op_strategy(), 0..12),
            ),
            |(seed_ops, child_ops)| {
                let manager = manager();
                let main = manager.main_context();
                apply(&main, &seed_ops);

                let before = view(&main);
                let child = manager.background_context().unwrap();
                let sibling = manager.background_context().unwrap();
                apply(&child, &child_ops);

                prop_assert_eq!(view(&main), before.clone());
                prop_assert_eq!(view(&sibling), before);
                Ok(())
            },
        )
        .unwrap();
}

/// After a commit the parent sees exactly what the child saw
#[test]
fn test_commit_publishes_child_view_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::vec(op_strategy(), 0..12),
                prop::collection::vec(op_strategy(), 0..12),
            ),
            |(seed_ops, child_ops)| {
                let manager = manager();
                let main = manager.main_context();
                apply(&main, &seed_ops);
                manager.save(None).unwrap();

                let child = manager.background_context().unwrap();
                apply(&child, &child_ops);
                let child_view = view(&child);

                child.commit().unwrap();
                prop_assert_eq!(view(&main), child_view.clone());

                manager.save(None).unwrap();
                let fresh = manager.create_context(None).unwrap();
                prop_assert_eq!(view(&fresh), child_view);
                Ok(())
            },
        )
        .unwrap();
}

/// Rollback restores the inherited view
#[test]
fn test_rollback_restores_parent_view_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &prop::collection::vec(op_strategy(), 0..16),
            |ops| {
                let manager = manager();
                let main = manager.main_context();
                main.insert("Counter", attributes([("value", 1i64)])).unwrap();

                let child = manager.background_context().unwrap();
                apply(&child, &ops);
                child.rollback().unwrap();

                prop_assert!(!child.has_changes().unwrap());
                prop_assert_eq!(view(&child), view(&main));
                Ok(())
            },
        )
        .unwrap();
}
