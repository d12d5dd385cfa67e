//! The incremental fetch loop.
//!
//! One run walks every configured table in order, pages through its endpoint
//! from the table's cursor, upserts transformed rows into the sink, and
//! checkpoints the advanced state after each table. Tables are strictly
//! sequential: each page request depends on the cursor confirmed by the
//! previous one, so there is nothing to parallelize.
//!
//! Failure policy: transport errors, non-2xx statuses, and malformed bodies
//! abort only the current table. Its cursor stays at the pre-run value, so
//! the next run retries the same window or token instead of skipping
//! unfetched pages. Forward progress is never granted for unconfirmed data.

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};

use chatsync_config::ChatsyncConfig;

use crate::client::{PageQuery, PageSource};
use crate::schema::{table_schema, TableSchema};
use crate::sink::Sink;
use crate::state::{Cursor, SyncState};
use crate::tables::{known_tables, lookup, Pagination, TableSpec};
use crate::transform::transform;

/// Tuning knobs for one run, resolved from configuration.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// First-run lookback for time-windowed tables, in days.
    pub backfill_days: i64,
    /// Records requested per page.
    pub page_limit: u32,
    /// Tables to sync; empty means all known tables.
    pub tables: Vec<String>,
}

impl SyncOptions {
    pub fn from_config(config: &ChatsyncConfig) -> Self {
        Self {
            backfill_days: config.sync.backfill_days,
            page_limit: config.sync.page_limit,
            tables: config.sync.tables.clone(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            backfill_days: 30,
            page_limit: 100,
            tables: Vec::new(),
        }
    }
}

/// Per-table result of one run, for the end-of-run summary.
#[derive(Debug, Clone)]
pub struct TableReport {
    pub table: String,
    /// Requests issued (including the final empty page, if any).
    pub pages: u32,
    /// Rows handed to the sink.
    pub rows: u64,
    /// Whether this table aborted mid-pagination.
    pub aborted: bool,
}

/// How a table run wants its cursor recorded.
enum CursorUpdate {
    /// Leave whatever the table had before the run.
    Keep,
    /// Advance to a new position.
    Set(Cursor),
    /// Drop the cursor (terminal page token: next run starts over).
    Clear,
}

struct TableOutcome {
    cursor: CursorUpdate,
    pages: u32,
    rows: u64,
}

/// Runs one full sync over `state_in`, returning the advanced state.
///
/// Rows flow to `sink.upsert` as a side effect; `sink.checkpoint` is called
/// once per table as soon as that table's cursor is final, bounding how much
/// a partial failure can force the next run to re-fetch.
pub async fn run<C: PageSource, S: Sink>(
    client: &C,
    options: &SyncOptions,
    state_in: &SyncState,
    sink: &mut S,
) -> Result<(SyncState, Vec<TableReport>)> {
    // Resolve the table list up front: an unknown table name is a
    // configuration mismatch and fails the run before any request.
    let specs: Vec<&'static TableSpec> = if options.tables.is_empty() {
        known_tables().iter().collect()
    } else {
        options
            .tables
            .iter()
            .map(|name| lookup(name))
            .collect::<Result<_>>()?
    };

    let mut state_out = state_in.clone();
    let mut reports = Vec::with_capacity(specs.len());

    for spec in specs {
        let schema = table_schema(spec.name)
            .with_context(|| format!("No schema declared for table '{}'", spec.name))?;

        match sync_table(client, options, spec, &schema, state_in.get(spec.name), sink).await {
            Ok(outcome) => {
                match outcome.cursor {
                    CursorUpdate::Keep => {}
                    CursorUpdate::Set(cursor) => state_out.advance(spec.name, Some(cursor)),
                    CursorUpdate::Clear => state_out.advance(spec.name, None),
                }
                sink.checkpoint(&state_out)?;
                tracing::info!(
                    table = spec.name,
                    pages = outcome.pages,
                    rows = outcome.rows,
                    "Table sync complete"
                );
                reports.push(TableReport {
                    table: spec.name.to_string(),
                    pages: outcome.pages,
                    rows: outcome.rows,
                    aborted: false,
                });
            }
            Err(e) => {
                // Table-granularity recovery: cursor unchanged, next table runs.
                tracing::warn!(
                    table = spec.name,
                    error = %e,
                    "Table sync aborted; cursor unchanged"
                );
                reports.push(TableReport {
                    table: spec.name.to_string(),
                    pages: 0,
                    rows: 0,
                    aborted: true,
                });
            }
        }
    }

    Ok((state_out, reports))
}

async fn sync_table<C: PageSource, S: Sink>(
    client: &C,
    options: &SyncOptions,
    spec: &TableSpec,
    schema: &TableSchema,
    cursor: Option<&Cursor>,
    sink: &mut S,
) -> Result<TableOutcome> {
    match spec.pagination {
        Pagination::TimeWindow => {
            sync_time_window(client, options, spec, schema, cursor, sink).await
        }
        Pagination::Token => sync_token(client, spec, schema, cursor, sink).await,
    }
}

/// Time-windowed pagination (reporting API).
///
/// The window end is captured once before the first request and reused for
/// every page, so a multi-page fetch cannot shrink or advance its window
/// mid-traversal. On success the cursor moves to that captured end, not to
/// any record-derived timestamp: server-side commit times can land out of
/// order within a window, and a record-derived cursor would skip them.
async fn sync_time_window<C: PageSource, S: Sink>(
    client: &C,
    options: &SyncOptions,
    spec: &TableSpec,
    schema: &TableSchema,
    cursor: Option<&Cursor>,
    sink: &mut S,
) -> Result<TableOutcome> {
    let window_end = Utc::now();
    let date_from = cursor
        .and_then(Cursor::as_time)
        .unwrap_or_else(|| window_end - Duration::days(options.backfill_days));

    let mut page = 1u32;
    let mut pages = 0u32;
    let mut rows = 0u64;

    loop {
        let query = PageQuery::TimeWindow {
            date_from,
            date_to: window_end,
            limit: options.page_limit,
            page,
        };
        let body = client.fetch_page(spec, &query).await?;
        let items = extract_items(spec, &body)?;
        pages += 1;

        if items.is_empty() {
            break;
        }

        rows += upsert_items(spec, schema, &items, sink)?;
        page += 1;
    }

    // An empty window leaves the cursor untouched; only confirmed data
    // grants forward progress.
    let cursor = if rows > 0 {
        CursorUpdate::Set(Cursor::time(window_end))
    } else {
        CursorUpdate::Keep
    };

    Ok(TableOutcome { cursor, pages, rows })
}

/// Token pagination (agent API actions).
///
/// Each response carries the token for the next page; a missing token or an
/// empty item list ends the table. The terminal state clears the cursor, so
/// the next run walks the action list from the beginning — re-fetch is safe
/// because the sink upserts by primary key.
async fn sync_token<C: PageSource, S: Sink>(
    client: &C,
    spec: &TableSpec,
    schema: &TableSchema,
    cursor: Option<&Cursor>,
    sink: &mut S,
) -> Result<TableOutcome> {
    let mut token: Option<String> = cursor.and_then(Cursor::as_token).map(String::from);
    let mut pages = 0u32;
    let mut rows = 0u64;

    loop {
        let query = PageQuery::Token {
            page_id: token.clone(),
        };
        let body = client.fetch_page(spec, &query).await?;
        let items = extract_items(spec, &body)?;
        pages += 1;

        if items.is_empty() {
            break;
        }

        rows += upsert_items(spec, schema, &items, sink)?;

        match body
            .get("next_page_id")
            .or_else(|| body.get("next_page_token"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        {
            Some(next) => token = Some(next.to_string()),
            None => {
                token = None;
                break;
            }
        }
    }

    let cursor = match token {
        Some(page_id) => CursorUpdate::Set(Cursor::token(page_id)),
        None => CursorUpdate::Clear,
    };

    Ok(TableOutcome { cursor, pages, rows })
}

/// Pulls the item list out of a response body.
///
/// Looks under the table-specific key first, then accepts a bare top-level
/// list. Anything else is a malformed body and aborts the table.
fn extract_items(spec: &TableSpec, body: &serde_json::Value) -> Result<Vec<serde_json::Value>> {
    if let Some(list) = body.get(spec.items_key).and_then(|v| v.as_array()) {
        return Ok(list.clone());
    }
    if let Some(list) = body.as_array() {
        return Ok(list.clone());
    }
    bail!(
        "Malformed response for table {}: no '{}' list in body",
        spec.name,
        spec.items_key
    );
}

/// Transforms and upserts one page of items. Items that cannot become a
/// keyed row are logged and skipped; sink failures propagate.
fn upsert_items<S: Sink>(
    spec: &TableSpec,
    schema: &TableSchema,
    items: &[serde_json::Value],
    sink: &mut S,
) -> Result<u64> {
    let mut rows = 0u64;
    for item in items {
        let row = match transform(spec.name, item) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(table = spec.name, error = %e, "Skipping unusable item");
                continue;
            }
        };
        if !row.has_primary_key(schema) {
            tracing::warn!(table = spec.name, "Skipping item with null primary key");
            continue;
        }
        sink.upsert(spec.name, row)?;
        rows += 1;
    }
    Ok(rows)
}
