//! Shared test utilities for integration tests
//!
//! Provides a common object model, manager constructors and isolation of the
//! environment variables the configuration loader reads.

use std::sync::{Arc, Mutex};
use strata::model::loader;
use strata::{ContextManager, ManagerSettings, Model, SledStore};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub const LIBRARY_MODEL: &str = r#"
name = "library"
version = 1

[[entities]]
name = "Author"

[[entities.attributes]]
name = "name"
kind = "string"

[[entities]]
name = "Book"

[[entities.attributes]]
name = "title"
kind = "string"

[[entities.attributes]]
name = "pages"
kind = "integer"
optional = true

[[entities.attributes]]
name = "in_print"
kind = "bool"
default = true

[[entities.relationships]]
name = "author"
destination = "Author"
optional = true

[[entities]]
name = "Shelf"

[[entities.attributes]]
name = "label"
kind = "string"

[[entities.relationships]]
name = "books"
destination = "Book"
to_many = true
optional = true
"#;

pub fn library_model() -> Model {
    loader::from_toml_str(LIBRARY_MODEL).unwrap()
}

/// Manager whose durable store lives in memory.
pub fn memory_manager() -> ContextManager {
    ContextManager::in_memory(library_model()).unwrap()
}

/// Manager over a sled store in `dir`.
pub fn sled_manager(dir: &TempDir) -> ContextManager {
    let store = SledStore::open(&dir.path().join("store")).unwrap();
    ContextManager::with_store(
        Arc::new(library_model()),
        Arc::new(store),
        ManagerSettings::default(),
    )
    .unwrap()
}

/// Write the library model and an optional config file into a workspace.
pub fn write_workspace(dir: &TempDir, config: Option<&str>) {
    std::fs::write(dir.path().join("model.toml"), LIBRARY_MODEL).unwrap();
    if let Some(config) = config {
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config").join("config.toml"), config).unwrap();
    }
}

const ISOLATED_VARS: &[&str] = &[
    "HOME",
    "XDG_CONFIG_HOME",
    "STRATA_ENV",
    "STRATA_STORE__BACKEND",
    "STRATA_STORE__PATH",
    "STRATA_PURGE__MODE",
];

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            saved: ISOLATED_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(orig) => std::env::set_var(name, orig),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`, no
/// `STRATA_*` overrides set, and `vars` applied on top.
///
/// A global mutex serializes callers; the previous environment is restored
/// afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    let test_config_home = test_dir.path().join("xdg");
    std::fs::create_dir_all(&test_home).unwrap();
    std::fs::create_dir_all(&test_config_home).unwrap();

    for name in ISOLATED_VARS {
        std::env::remove_var(name);
    }
    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_config_home.to_str().unwrap());
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    let result = f();

    env_state.restore();

    result
}
