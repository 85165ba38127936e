//! Presentation: text and json formatters for CLI results.

use crate::coordinator::PurgeReport;
use crate::error::ContextError;
use crate::manager::SaveOutcome;
use crate::object::ObjectRecord;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize)]
pub struct EntityCount {
    pub entity: String,
    pub objects: usize,
}

/// Everything `strata status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub backend: String,
    pub store_path: String,
    pub model: String,
    pub model_hash: String,
    pub created_at: String,
    pub entities: Vec<EntityCount>,
}

pub fn format_status_text(status: &StatusView) -> String {
    let mut out = format!(
        "{}\n  Backend: {}\n  Path: {}\n  Model: {}\n  Created: {}\n",
        "Store".bold(),
        status.backend,
        status.store_path,
        status.model,
        status.created_at
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Entity", "Objects"]);
    for row in &status.entities {
        table.add_row(vec![row.entity.clone(), row.objects.to_string()]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_status_json(status: &StatusView) -> Result<String, ContextError> {
    serde_json::to_string_pretty(status).map_err(|e| ContextError::Runtime(e.to_string()))
}

pub fn format_records_text(entity: &str, records: &[ObjectRecord]) -> String {
    if records.is_empty() {
        return format!("No {} objects.", entity);
    }

    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.attributes.keys().map(String::as_str))
        .collect();

    let mut header = vec!["id".to_string()];
    header.extend(columns.iter().map(|c| c.to_string()));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    for record in records {
        let mut row = vec![record.id.to_string()];
        row.extend(
            columns
                .iter()
                .map(|c| record.get(c).map(|v| v.to_string()).unwrap_or_default()),
        );
        table.add_row(row);
    }
    table.to_string()
}

pub fn format_records_json(records: &[ObjectRecord]) -> Result<String, ContextError> {
    let rows: Vec<serde_json::Value> = records
        .iter()
        .map(|record| {
            let attributes: serde_json::Map<String, serde_json::Value> = record
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.to_string())))
                .collect();
            serde_json::json!({
                "id": record.id.to_string(),
                "attributes": attributes,
            })
        })
        .collect();
    serde_json::to_string_pretty(&rows).map_err(|e| ContextError::Runtime(e.to_string()))
}

pub fn format_save_outcome(outcome: &SaveOutcome) -> String {
    match outcome {
        SaveOutcome::NoChanges => "Nothing to save.".to_string(),
        SaveOutcome::Saved {
            objects, levels, ..
        } => format!(
            "{} {} object(s) through {} level(s)",
            "Saved".green(),
            objects,
            levels
        ),
    }
}

pub fn format_purge_report(report: &PurgeReport) -> String {
    format!(
        "{} {} object(s) across {} entities ({} purge, {} pending change(s) discarded)",
        "Removed".yellow(),
        report.removed,
        report.entities.len(),
        report.mode,
        report.discarded_pending
    )
}
