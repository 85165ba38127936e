//! Integration tests for Strata contexts, stores and configuration

mod async_save;
mod cli_route;
mod context_hierarchy;
mod save_propagation;
mod schema_mismatch;
mod test_utils;
