//! Integration tests for CLI command routing

use super::test_utils::{with_isolated_env, write_workspace};
use strata::cli::{Commands, RunContext};
use tempfile::TempDir;

fn run(dir: &TempDir, command: Commands) -> Result<String, strata::ContextError> {
    let ctx = RunContext::new(dir.path().to_path_buf(), None)?;
    ctx.execute(&command)
}

#[test]
fn insert_list_and_delete_round_trip_through_the_store() {
    let temp_dir = TempDir::new().unwrap();
    write_workspace(&temp_dir, None);

    with_isolated_env(&temp_dir, &[], || {
        run(&temp_dir, Commands::Init).unwrap();

        let output = run(
            &temp_dir,
            Commands::Insert {
                entity: "Author".to_string(),
                values: vec!["name=Jemisin".to_string()],
            },
        )
        .unwrap();
        let id = output.lines().next().unwrap().to_string();
        assert!(id.starts_with("Author/"));

        let listing = run(
            &temp_dir,
            Commands::List {
                entity: "Author".to_string(),
                format: "json".to_string(),
            },
        )
        .unwrap();
        let rows: serde_json::Value = serde_json::from_str(&listing).unwrap();
        assert_eq!(rows[0]["id"], id.as_str());
        assert_eq!(rows[0]["attributes"]["name"], "Jemisin");

        run(
            &temp_dir,
            Commands::Update {
                id: id.clone(),
                values: vec!["name=N. K. Jemisin".to_string()],
            },
        )
        .unwrap();
        let status = run(
            &temp_dir,
            Commands::Status {
                format: "json".to_string(),
            },
        )
        .unwrap();
        let status: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(status["entities"][0]["entity"], "Author");
        assert_eq!(status["entities"][0]["objects"], 1);

        run(&temp_dir, Commands::Delete { id }).unwrap();
        let listing = run(
            &temp_dir,
            Commands::List {
                entity: "Author".to_string(),
                format: "text".to_string(),
            },
        )
        .unwrap();
        assert_eq!(listing, "No Author objects.");
    });
}

#[test]
fn purge_requires_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    write_workspace(&temp_dir, None);

    with_isolated_env(&temp_dir, &[], || {
        let err = run(&temp_dir, Commands::Purge { yes: false }).unwrap_err();
        assert_eq!(err.kind(), "config");

        run(
            &temp_dir,
            Commands::Insert {
                entity: "Author".to_string(),
                values: vec!["name=Gibson".to_string()],
            },
        )
        .unwrap();
        let output = run(&temp_dir, Commands::Purge { yes: true }).unwrap();
        assert!(output.contains("1 object(s)"));
    });
}

#[test]
fn invalid_insert_reports_validation_failure() {
    let temp_dir = TempDir::new().unwrap();
    write_workspace(&temp_dir, None);

    with_isolated_env(&temp_dir, &[], || {
        let err = run(
            &temp_dir,
            Commands::Insert {
                entity: "Book".to_string(),
                values: vec!["pages=10".to_string()],
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(strata::cli::map_error(&err).contains("[validation]"));
    });
}

#[test]
fn unknown_output_format_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    write_workspace(&temp_dir, None);

    with_isolated_env(&temp_dir, &[], || {
        let err = run(
            &temp_dir,
            Commands::Status {
                format: "yaml".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), "config");
    });
}
