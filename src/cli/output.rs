//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ContextError;
use owo_colors::OwoColorize;

/// Map domain errors to a string for CLI output, tagged with the error kind.
pub fn map_error(e: &ContextError) -> String {
    format!("{} {} [{}]", "error:".red().bold(), e, e.kind())
}
