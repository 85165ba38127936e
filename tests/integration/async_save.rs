//! Integration tests for saving from async code

use super::test_utils::memory_manager;
use strata::{attributes, SaveOutcome};

#[tokio::test]
async fn save_async_commits_through_the_chain() {
    let manager = memory_manager();
    let background = manager.background_context().unwrap();
    let id = background
        .insert("Author", attributes([("name", "Async")]))
        .unwrap();

    let outcome = manager.save_async(Some(background.clone())).await.unwrap();

    assert!(matches!(outcome, SaveOutcome::Saved { levels: 2, .. }));
    assert!(manager.main_context().exists(&id).unwrap());
    assert!(!manager.main_context().has_changes().unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_async_saves_all_land() {
    let manager = memory_manager();
    let mut tasks = Vec::new();
    for i in 0..8i64 {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move {
            let ctx = manager.background_context().unwrap();
            ctx.insert("Author", attributes([("name", format!("author {}", i))]))
                .unwrap();
            manager.save_async(Some(ctx)).await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(manager.main_context().count("Author").unwrap(), 8);
}

#[tokio::test]
async fn save_async_defaults_to_main() {
    let manager = memory_manager();
    assert_eq!(manager.save_async(None).await.unwrap(), SaveOutcome::NoChanges);
}
