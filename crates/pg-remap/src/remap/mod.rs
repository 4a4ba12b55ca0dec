//! Bulk text remapping across every text column of a schema.
//!
//! [`Remapper`] takes a fresh [`SchemaSnapshot`] from its [`TextStore`],
//! drops excluded tables and read-only columns, then rewrites matching rows
//! one column at a time.
//!
//! # Non-transactional
//!
//! Every row is written with its own single-column `UPDATE`. Nothing wraps
//! the invocation: when it stops on an error, rows already written stay
//! written. Running two remaps over the same tables at once is unsupported.

mod outcome;
mod pattern;

pub use outcome::{
    ColumnSummary, FindMatch, OutcomeStatus, RemapOutcome, RemapReport, MAX_RECORDED_OUTCOMES,
    VALUE_PREVIEW_CHARS,
};
pub use pattern::{LiteralRewrite, RegexRewrite, Rewrite, DEFAULT_REGEX_FLAGS};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use futures::TryStreamExt;
use tracing::{debug, info, warn};

use crate::config::RemapDefaults;
use crate::core::schema::{ColumnDescriptor, SchemaSnapshot, StoredRow};
use crate::core::traits::TextStore;
use crate::error::{RemapError, Result};

/// Options recognized by every remap operation.
#[derive(Debug, Clone, Default)]
pub struct RemapOptions {
    /// Tables skipped entirely.
    pub excluded_tables: BTreeSet<String>,

    /// Leave rows whose new value exceeds the column length and record them
    /// as skipped. When false the first such row fails the invocation.
    pub skip_max_length_violations: bool,

    /// Log one `SKIPPED:` line per skipped row and per-column update counts.
    pub verbose: bool,

    /// Plan and report without writing.
    pub dry_run: bool,

    /// Value must start with the pattern. Literal patterns only; a regex
    /// request with an anchor set is rejected, use `^` in the pattern.
    pub anchor_left: bool,

    /// Value must end with the pattern. Literal patterns only; use `$` in
    /// a regex.
    pub anchor_right: bool,
}

impl RemapOptions {
    /// Options seeded from the configuration file.
    pub fn from_defaults(defaults: &RemapDefaults) -> Self {
        Self {
            excluded_tables: defaults.excluded_tables.clone(),
            skip_max_length_violations: defaults.skip_max_length_violations,
            verbose: defaults.verbose,
            ..Default::default()
        }
    }

    pub fn exclude_table(mut self, table: impl Into<String>) -> Self {
        self.excluded_tables.insert(table.into());
        self
    }

    pub fn skip_max_length_violations(mut self, skip: bool) -> Self {
        self.skip_max_length_violations = skip;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn anchored(mut self, anchor_left: bool, anchor_right: bool) -> Self {
        self.anchor_left = anchor_left;
        self.anchor_right = anchor_right;
        self
    }
}

/// One fully validated remap: what to rewrite and how.
#[derive(Debug, Clone)]
pub struct RemapRequest {
    pub rewrite: Rewrite,
    pub options: RemapOptions,
}

impl RemapRequest {
    /// Literal request. Anchors are taken from `options`.
    pub fn literal(from: &str, to: &str, options: RemapOptions) -> Result<Self> {
        let rewrite =
            Rewrite::literal(from, to)?.anchored(options.anchor_left, options.anchor_right);
        Ok(Self { rewrite, options })
    }

    /// Regex request with explicit flags. Anchors belong in the pattern
    /// itself, so `options` must not set them.
    pub fn regex(
        pattern: &str,
        replacement: &str,
        flags: &str,
        options: RemapOptions,
    ) -> Result<Self> {
        if options.anchor_left || options.anchor_right {
            return Err(RemapError::invalid_pattern(
                pattern,
                "anchors apply to literal patterns only; use ^ or $ in the regex",
            ));
        }
        let rewrite = Rewrite::regex(pattern, replacement, flags)?;
        Ok(Self { rewrite, options })
    }
}

/// Decision for one scanned row.
#[derive(Debug)]
pub enum RowPlan {
    /// Rewrite produced the same value.
    Unchanged,
    /// Write this value.
    Write(String),
    /// Too long; leave the row and record it.
    Skip(RemapOutcome),
    /// Too long and skipping is off; the caller stops.
    Violation(RemapError),
}

/// Decide what to do with one row.
pub fn plan_row(
    column: &ColumnDescriptor,
    row: &StoredRow,
    rewrite: &Rewrite,
    skip_max_length_violations: bool,
) -> RowPlan {
    let new_value = rewrite.apply(&row.value);
    if new_value == row.value.as_str() {
        return RowPlan::Unchanged;
    }

    match column.check_length(&new_value) {
        None => RowPlan::Write(new_value.into_owned()),
        Some(_) if skip_max_length_violations => RowPlan::Skip(RemapOutcome::new(
            column,
            row.key.clone(),
            &row.value,
            &new_value,
            OutcomeStatus::SkippedTooLong,
        )),
        Some((max_length, actual_length)) => {
            RowPlan::Violation(RemapError::ColumnLengthViolation {
                table: column.table.clone(),
                column: column.name.clone(),
                key: row.key.to_string(),
                max_length,
                actual_length,
            })
        }
    }
}

/// Applies literal or regex rewrites across a schema's text columns.
pub struct Remapper {
    store: Arc<dyn TextStore>,
    schema: String,
}

impl Remapper {
    /// Create a remapper over `schema` in `store`.
    pub fn new(store: Arc<dyn TextStore>, schema: impl Into<String>) -> Self {
        Self {
            store,
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Replace every occurrence of `from` with `to` (case-sensitive).
    pub async fn remap(&self, from: &str, to: &str, options: &RemapOptions) -> Result<RemapReport> {
        let request = RemapRequest::literal(from, to, options.clone())?;
        self.apply(&request).await
    }

    /// Replace every match of `pattern` with `replacement`.
    ///
    /// `replacement` may reference capture groups as `\1`..`\9`.
    pub async fn regexp_replace(
        &self,
        pattern: &str,
        replacement: &str,
        options: &RemapOptions,
    ) -> Result<RemapReport> {
        self.regexp_replace_with_flags(pattern, replacement, DEFAULT_REGEX_FLAGS, options)
            .await
    }

    /// [`Remapper::regexp_replace`] with explicit `g` / `i` flags.
    pub async fn regexp_replace_with_flags(
        &self,
        pattern: &str,
        replacement: &str,
        flags: &str,
        options: &RemapOptions,
    ) -> Result<RemapReport> {
        let request = RemapRequest::regex(pattern, replacement, flags, options.clone())?;
        self.apply(&request).await
    }

    /// Rows whose text columns contain `needle`. Honors exclusions and
    /// anchors from `options`; never writes.
    pub async fn find(&self, needle: &str, options: &RemapOptions) -> Result<Vec<FindMatch>> {
        let filter =
            Rewrite::literal(needle, needle)?.anchored(options.anchor_left, options.anchor_right);
        let snapshot = self.take_snapshot().await?;

        let mut matches = Vec::new();
        for column in snapshot.eligible(&options.excluded_tables) {
            let mut rows = self.store.scan_column(column, &filter).await?;
            let before = matches.len();
            while let Some(row) = rows.try_next().await? {
                matches.push(FindMatch {
                    table: column.table.clone(),
                    column: column.name.clone(),
                    key: row.key,
                    value: row.value,
                });
            }
            debug!("{}: {} matching rows", column.full_name(), matches.len() - before);
        }

        info!(
            "Found {} rows containing {:?} in schema '{}'",
            matches.len(),
            needle,
            self.schema
        );
        Ok(matches)
    }

    /// Columns a remap with `options` would scan.
    pub async fn eligible_columns(&self, options: &RemapOptions) -> Result<Vec<ColumnDescriptor>> {
        let snapshot = self.take_snapshot().await?;
        Ok(snapshot
            .eligible(&options.excluded_tables)
            .cloned()
            .collect())
    }

    /// Run a prepared request.
    pub async fn apply(&self, request: &RemapRequest) -> Result<RemapReport> {
        let started = Instant::now();
        let options = &request.options;
        let mut report = RemapReport::new(
            request.rewrite.kind(),
            request.rewrite.pattern(),
            options.dry_run,
        );

        let snapshot = self.take_snapshot().await?;
        let columns: Vec<&ColumnDescriptor> =
            snapshot.eligible(&options.excluded_tables).collect();

        let read_only = snapshot.columns.iter().filter(|c| c.read_only).count();
        info!(
            "Remapping {} pattern {:?} across {} columns in schema '{}' \
             ({} read-only columns, {} excluded tables){}",
            request.rewrite.kind(),
            request.rewrite.pattern(),
            columns.len(),
            self.schema,
            read_only,
            options.excluded_tables.len(),
            if options.dry_run { " [dry run]" } else { "" }
        );

        for column in columns {
            self.remap_column(column, request, &mut report).await?;
        }

        report.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            "Remap finished in {:.2}s: {} rows updated, {} skipped, {} planned",
            report.duration_seconds,
            report.rows_updated(),
            report.rows_skipped(),
            report.rows_planned()
        );
        Ok(report)
    }

    /// Introspect once for this invocation. Any failure here is fatal and
    /// happens before a single row is touched.
    async fn take_snapshot(&self) -> Result<SchemaSnapshot> {
        match self.store.snapshot(&self.schema).await {
            Ok(snapshot) => {
                debug!(
                    "Snapshot of schema '{}' from {} store: {} text columns in {} tables",
                    self.schema,
                    self.store.store_type(),
                    snapshot.columns.len(),
                    snapshot.tables().len()
                );
                Ok(snapshot)
            }
            Err(e @ RemapError::SchemaIntrospection(_)) => Err(e),
            Err(e) => Err(RemapError::SchemaIntrospection(e.to_string())),
        }
    }

    /// Scan and rewrite one column. Stops at the first length violation
    /// when skipping is off.
    async fn remap_column(
        &self,
        column: &ColumnDescriptor,
        request: &RemapRequest,
        report: &mut RemapReport,
    ) -> Result<()> {
        let options = &request.options;
        let mut rows = self.store.scan_column(column, &request.rewrite).await?;
        let mut summary = ColumnSummary::new(column);

        while let Some(row) = rows.try_next().await? {
            summary.rows_matched += 1;

            match plan_row(column, &row, &request.rewrite, options.skip_max_length_violations) {
                RowPlan::Unchanged => summary.rows_unchanged += 1,
                RowPlan::Skip(outcome) => {
                    summary.rows_skipped += 1;
                    log_skip(&outcome, options.verbose);
                    report.record_skipped(outcome);
                }
                RowPlan::Violation(err) => {
                    warn!(
                        "Stopping at {} after {} updated rows: {}",
                        column.full_name(),
                        summary.rows_updated,
                        err
                    );
                    return Err(err);
                }
                RowPlan::Write(new_value) if options.dry_run => {
                    summary.rows_planned += 1;
                    report.record_planned(RemapOutcome::new(
                        column,
                        row.key,
                        &row.value,
                        &new_value,
                        OutcomeStatus::Planned,
                    ));
                }
                RowPlan::Write(new_value) => {
                    match self.store.write_value(column, &row.key, &new_value).await {
                        Ok(0) => warn!(
                            "{} row [{}] disappeared before it could be updated",
                            column.full_name(),
                            row.key
                        ),
                        Ok(affected) => summary.rows_updated += affected,
                        // The server's own limit is the last word; honor the
                        // skip policy for it too.
                        Err(e) if e.is_length_violation() && options.skip_max_length_violations => {
                            let outcome = RemapOutcome::new(
                                column,
                                row.key,
                                &row.value,
                                &new_value,
                                OutcomeStatus::SkippedTooLong,
                            );
                            summary.rows_skipped += 1;
                            log_skip(&outcome, options.verbose);
                            report.record_skipped(outcome);
                        }
                        Err(e) => {
                            warn!(
                                "Stopping at {} after {} updated rows: {}",
                                column.full_name(),
                                summary.rows_updated,
                                e
                            );
                            return Err(e);
                        }
                    }
                }
            }
        }

        if summary.rows_updated > 0 || summary.rows_planned > 0 {
            let changed = summary.rows_updated + summary.rows_planned;
            if options.verbose {
                info!("{}={}", summary.full_name(), changed);
            } else {
                debug!("{}={}", summary.full_name(), changed);
            }
        }

        report.columns.push(summary);
        Ok(())
    }
}

fn log_skip(outcome: &RemapOutcome, verbose: bool) {
    if verbose {
        info!("{}", outcome);
    } else {
        debug!("{}", outcome);
    }
}
