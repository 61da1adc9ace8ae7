//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde_json::json;
use strata_core::catalog::StoreFingerprint;
use strata_core::migration::{
    ChangeSet, CollectionDiff, EntityDifference, MigrationPlan, MigrationReport, MigrationStep,
    SchemaDiff,
};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Summary of a store's contents.
#[derive(Debug, Clone)]
pub struct StoreSummary {
    pub version: String,
    pub fingerprint: StoreFingerprint,
    /// Record count per concrete entity, by name.
    pub entities: Vec<(String, usize)>,
}

/// One line of a schema difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRow {
    pub entity: String,
    pub property: Option<String>,
    pub change: String,
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format schema fingerprints.
    fn format_fingerprints(&self, schemas: &[(String, StoreFingerprint)]) -> String;

    /// Format a schema difference.
    fn format_diff(&self, diff: &SchemaDiff) -> String;

    /// Format a migration plan.
    fn format_plan(&self, plan: &MigrationPlan) -> String;

    /// Format the outcome of a migration.
    fn format_report(&self, report: &MigrationReport) -> String;

    /// Format a store summary.
    fn format_summary(&self, summary: &StoreSummary) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Flatten a schema difference into rows, entity by entity.
pub fn diff_rows(diff: &SchemaDiff) -> Vec<DiffRow> {
    let mut rows = Vec::new();
    let row = |entity: &str, property: Option<&str>, change: String| DiffRow {
        entity: entity.to_string(),
        property: property.map(str::to_string),
        change,
    };

    for name in &diff.entities.added {
        rows.push(row(name, None, "entity added".to_string()));
    }
    for name in &diff.entities.removed {
        rows.push(row(name, None, "entity removed".to_string()));
    }
    for (name, entity) in &diff.entities.modified {
        rows.extend(entity_rows(entity).into_iter().map(|(p, c)| row(name, p.as_deref(), c)));
    }
    rows
}

fn entity_rows(entity: &EntityDifference) -> Vec<(Option<String>, String)> {
    let mut rows = Vec::new();
    if let Some((from, _)) = &entity.name_changed {
        rows.push((None, format!("renamed from {}", from)));
    }
    if let Some((_, to)) = entity.abstract_changed {
        rows.push((None, if to { "now abstract" } else { "now concrete" }.to_string()));
    }
    if let Some((from, to)) = &entity.parent_changed {
        let show = |p: &Option<String>| p.clone().unwrap_or_else(|| "(none)".to_string());
        rows.push((None, format!("parent {} -> {}", show(from), show(to))));
    }
    collection_rows(&entity.attributes, "attribute", &mut rows);
    collection_rows(&entity.relationships, "relationship", &mut rows);
    rows
}

fn collection_rows(
    diff: &CollectionDiff<ChangeSet>,
    noun: &str,
    rows: &mut Vec<(Option<String>, String)>,
) {
    for name in &diff.added {
        rows.push((Some(name.clone()), format!("{} added", noun)));
    }
    for name in &diff.removed {
        rows.push((Some(name.clone()), format!("{} removed", noun)));
    }
    for (name, changes) in &diff.modified {
        let text: Vec<String> = changes.iter().map(|c| c.description()).collect();
        rows.push((Some(name.clone()), text.join(", ")));
    }
}

fn step_kind(step: &MigrationStep) -> &'static str {
    match step {
        MigrationStep::Lightweight { .. } => "lightweight",
        MigrationStep::Scripted { .. } => "scripted",
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_fingerprints(&self, schemas: &[(String, StoreFingerprint)]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Version", "Fingerprint"]);
        for (version, fingerprint) in schemas {
            table.add_row(vec![version.clone(), fingerprint.to_string()]);
        }
        table.to_string()
    }

    fn format_diff(&self, diff: &SchemaDiff) -> String {
        let rows = diff_rows(diff);
        if rows.is_empty() {
            return format!("{} and {} are identical", diff.from_version, diff.to_version);
        }

        let mut table = Table::new();
        table.set_header(vec!["Entity", "Property", "Change"]);
        for row in rows {
            table.add_row(vec![
                Cell::new(row.entity),
                Cell::new(row.property.unwrap_or_default()),
                Cell::new(row.change),
            ]);
        }
        format!(
            "{} -> {} ({} change(s))\n{}",
            diff.from_version,
            diff.to_version,
            diff.change_count(),
            table
        )
    }

    fn format_plan(&self, plan: &MigrationPlan) -> String {
        if plan.is_empty() {
            return format!("store already at {}", plan.target.version);
        }

        let mut table = Table::new();
        table.set_header(vec!["#", "Kind", "Step"]);
        for (i, step) in plan.steps.iter().enumerate() {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(step_kind(step)),
                Cell::new(step.description()),
            ]);
        }
        format!(
            "{} -> {} ({} step(s))\n{}",
            plan.start.version,
            plan.target.version,
            plan.step_count(),
            table
        )
    }

    fn format_report(&self, report: &MigrationReport) -> String {
        if report.total_steps == 0 {
            return format!("store at {}, nothing to migrate", report.to_version);
        }
        format!(
            "migrated {} -> {}: {}/{} step(s), {} script(s) skipped",
            report.from_version,
            report.to_version,
            report.steps_executed,
            report.total_steps,
            report.scripts_skipped
        )
    }

    fn format_summary(&self, summary: &StoreSummary) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Entity", "Records"]);
        for (entity, count) in &summary.entities {
            table.add_row(vec![Cell::new(entity), Cell::new(count)]);
        }
        format!(
            "model {} ({})\n{}",
            summary.version, summary.fingerprint, table
        )
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_fingerprints(&self, schemas: &[(String, StoreFingerprint)]) -> String {
        let list: Vec<_> = schemas
            .iter()
            .map(|(version, fp)| json!({ "version": version, "fingerprint": fp.to_string() }))
            .collect();
        serde_json::to_string_pretty(&list).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_diff(&self, diff: &SchemaDiff) -> String {
        let changes: Vec<_> = diff_rows(diff)
            .into_iter()
            .map(|r| json!({ "entity": r.entity, "property": r.property, "change": r.change }))
            .collect();
        json!({
            "from": diff.from_version,
            "to": diff.to_version,
            "changes": changes,
        })
        .to_string()
    }

    fn format_plan(&self, plan: &MigrationPlan) -> String {
        let steps: Vec<_> = plan
            .steps
            .iter()
            .map(|s| json!({ "kind": step_kind(s), "description": s.description() }))
            .collect();
        json!({
            "start": plan.start.version,
            "target": plan.target.version,
            "steps": steps,
        })
        .to_string()
    }

    fn format_report(&self, report: &MigrationReport) -> String {
        json!({
            "from": report.from_version,
            "to": report.to_version,
            "steps_executed": report.steps_executed,
            "scripts_skipped": report.scripts_skipped,
            "total_steps": report.total_steps,
        })
        .to_string()
    }

    fn format_summary(&self, summary: &StoreSummary) -> String {
        let entities: serde_json::Map<String, serde_json::Value> = summary
            .entities
            .iter()
            .map(|(name, count)| (name.clone(), json!(count)))
            .collect();
        json!({
            "version": summary.version,
            "fingerprint": summary.fingerprint.to_string(),
            "entities": entities,
        })
        .to_string()
    }
}
