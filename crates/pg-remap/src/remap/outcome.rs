//! Per-row outcomes and the per-invocation report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::schema::{ColumnDescriptor, RowKey};
use crate::error::Result;

/// Characters of a value kept in an outcome.
pub const VALUE_PREVIEW_CHARS: usize = 80;

/// Outcomes kept per list in a report. Counts in [`ColumnSummary`] are
/// always complete.
pub const MAX_RECORDED_OUTCOMES: usize = 1_000;

/// What happened to one candidate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The new value exceeds the column's declared length; row left as is.
    SkippedTooLong,
    /// Dry run: the new value would have been written.
    Planned,
}

impl OutcomeStatus {
    fn label(self) -> &'static str {
        match self {
            OutcomeStatus::SkippedTooLong => "SKIPPED",
            OutcomeStatus::Planned => "PLANNED",
        }
    }
}

/// Record of one candidate row. Values are cut to
/// [`VALUE_PREVIEW_CHARS`] characters.
#[derive(Debug, Clone, Serialize)]
pub struct RemapOutcome {
    pub table: String,
    pub column: String,
    pub key: RowKey,
    pub old_preview: String,
    pub new_preview: String,
    /// Length of the full new value, in characters.
    pub new_length: usize,
    pub max_length: Option<usize>,
    pub status: OutcomeStatus,
}

impl RemapOutcome {
    pub fn new(
        column: &ColumnDescriptor,
        key: RowKey,
        old_value: &str,
        new_value: &str,
        status: OutcomeStatus,
    ) -> Self {
        Self {
            table: column.table.clone(),
            column: column.name.clone(),
            key,
            old_preview: preview(old_value),
            new_preview: preview(new_value),
            new_length: new_value.chars().count(),
            max_length: column.max_length,
            status,
        }
    }
}

fn preview(value: &str) -> String {
    match value.char_indices().nth(VALUE_PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &value[..end]),
        None => value.to_string(),
    }
}

impl fmt::Display for RemapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: table={} column={} key=[{}]",
            self.status.label(),
            self.table,
            self.column,
            self.key
        )?;
        match (self.status, self.max_length) {
            (OutcomeStatus::SkippedTooLong, Some(max)) => write!(
                f,
                " new length {} exceeds max length {}",
                self.new_length, max
            ),
            _ => Ok(()),
        }
    }
}

/// Row counts for one scanned column.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ColumnSummary {
    pub table: String,
    pub column: String,
    /// Rows the filter accepted.
    pub rows_matched: u64,
    /// Rows written.
    pub rows_updated: u64,
    /// Rows that would have been written (dry run).
    pub rows_planned: u64,
    /// Rows left alone because the new value was too long.
    pub rows_skipped: u64,
    /// Rows whose rewrite produced the same value.
    pub rows_unchanged: u64,
}

impl ColumnSummary {
    pub fn new(column: &ColumnDescriptor) -> Self {
        Self {
            table: column.table.clone(),
            column: column.name.clone(),
            ..Default::default()
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Result of one remap invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RemapReport {
    /// "literal" or "regex".
    pub kind: String,
    pub pattern: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    /// One entry per scanned column, in scan order.
    pub columns: Vec<ColumnSummary>,
    /// Rows skipped for length, up to [`MAX_RECORDED_OUTCOMES`].
    pub skipped: Vec<RemapOutcome>,
    /// Rows a dry run would have written, up to [`MAX_RECORDED_OUTCOMES`].
    pub planned: Vec<RemapOutcome>,
    /// Set once either list hit the cap and dropped outcomes.
    pub outcomes_truncated: bool,
}

impl RemapReport {
    pub fn new(kind: &str, pattern: &str, dry_run: bool) -> Self {
        Self {
            kind: kind.to_string(),
            pattern: pattern.to_string(),
            dry_run,
            started_at: Utc::now(),
            duration_seconds: 0.0,
            columns: Vec::new(),
            skipped: Vec::new(),
            planned: Vec::new(),
            outcomes_truncated: false,
        }
    }

    pub fn record_skipped(&mut self, outcome: RemapOutcome) {
        if self.skipped.len() < MAX_RECORDED_OUTCOMES {
            self.skipped.push(outcome);
        } else {
            self.outcomes_truncated = true;
        }
    }

    pub fn record_planned(&mut self, outcome: RemapOutcome) {
        if self.planned.len() < MAX_RECORDED_OUTCOMES {
            self.planned.push(outcome);
        } else {
            self.outcomes_truncated = true;
        }
    }

    pub fn columns_scanned(&self) -> usize {
        self.columns.len()
    }

    pub fn rows_matched(&self) -> u64 {
        self.columns.iter().map(|c| c.rows_matched).sum()
    }

    pub fn rows_updated(&self) -> u64 {
        self.columns.iter().map(|c| c.rows_updated).sum()
    }

    pub fn rows_planned(&self) -> u64 {
        self.columns.iter().map(|c| c.rows_planned).sum()
    }

    pub fn rows_skipped(&self) -> u64 {
        self.columns.iter().map(|c| c.rows_skipped).sum()
    }

    /// Summaries of columns where at least one row was written or planned.
    pub fn changed_columns(&self) -> impl Iterator<Item = &ColumnSummary> {
        self.columns
            .iter()
            .filter(|c| c.rows_updated > 0 || c.rows_planned > 0)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A row found by a search-only scan.
#[derive(Debug, Clone, Serialize)]
pub struct FindMatch {
    pub table: String,
    pub column: String,
    pub key: RowKey,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::KeyColumn;

    fn bookmarks_name() -> ColumnDescriptor {
        ColumnDescriptor {
            schema: "public".to_string(),
            table: "bookmarks".to_string(),
            name: "name".to_string(),
            data_type: "character varying".to_string(),
            max_length: Some(10),
            read_only: false,
            key_columns: vec![KeyColumn::new("id", "bigint")],
        }
    }

    #[test]
    fn test_skipped_line_identifies_row() {
        let outcome = RemapOutcome::new(
            &bookmarks_name(),
            RowKey::single("id", "7"),
            "short-bookmark",
            &"a".repeat(12),
            OutcomeStatus::SkippedTooLong,
        );
        let line = outcome.to_string();
        assert!(line.starts_with("SKIPPED:"));
        assert!(line.contains("table=bookmarks"));
        assert!(line.contains("column=name"));
        assert!(line.contains("key=[id=7]"));
        assert!(line.contains("new length 12 exceeds max length 10"));
    }

    #[test]
    fn test_outcome_keeps_preview_and_full_length() {
        let long = "é".repeat(VALUE_PREVIEW_CHARS * 50);
        let outcome = RemapOutcome::new(
            &bookmarks_name(),
            RowKey::single("id", "7"),
            "bookmark",
            &long,
            OutcomeStatus::SkippedTooLong,
        );
        assert_eq!(outcome.old_preview, "bookmark");
        assert_eq!(outcome.new_preview.chars().count(), VALUE_PREVIEW_CHARS + 3);
        assert!(outcome.new_preview.ends_with("..."));
        assert_eq!(outcome.new_length, VALUE_PREVIEW_CHARS * 50);
        assert!(outcome
            .to_string()
            .contains(&format!("new length {}", VALUE_PREVIEW_CHARS * 50)));
    }

    #[test]
    fn test_recorded_outcomes_capped() {
        let mut report = RemapReport::new("literal", "foo", true);
        for id in 0..MAX_RECORDED_OUTCOMES + 5 {
            report.record_planned(RemapOutcome::new(
                &bookmarks_name(),
                RowKey::single("id", id.to_string()),
                "foo",
                "bar",
                OutcomeStatus::Planned,
            ));
        }
        assert_eq!(report.planned.len(), MAX_RECORDED_OUTCOMES);
        assert!(report.outcomes_truncated);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_report_totals() {
        let mut report = RemapReport::new("literal", "foo", false);
        let mut posts = ColumnSummary::new(&bookmarks_name());
        posts.rows_matched = 3;
        posts.rows_updated = 2;
        posts.rows_skipped = 1;
        let mut empty = ColumnSummary::new(&bookmarks_name());
        empty.column = "url".to_string();
        report.columns.push(posts);
        report.columns.push(empty);

        assert_eq!(report.columns_scanned(), 2);
        assert_eq!(report.rows_matched(), 3);
        assert_eq!(report.rows_updated(), 2);
        assert_eq!(report.rows_skipped(), 1);
        assert_eq!(report.rows_planned(), 0);

        let changed: Vec<String> = report.changed_columns().map(|c| c.full_name()).collect();
        assert_eq!(changed, vec!["bookmarks.name"]);
    }

    #[test]
    fn test_report_json() {
        let report = RemapReport::new("regex", r"\d+", true);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"kind\": \"regex\""));
        assert!(json.contains("\"dry_run\": true"));
    }
}
