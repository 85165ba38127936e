//! CLI domain: parse, route, output, and presentation only.
//! Route handlers stay thin; all persistence work goes through the manager.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_purge_report, format_records_json, format_records_text, format_save_outcome,
    format_status_json, format_status_text, EntityCount, StatusView,
};
pub use route::{parse_assignments, RunContext};
