//! Destination sink: idempotent upserts plus durable state checkpoints.
//!
//! The sink is the host side of the connector contract. `upsert` must be
//! idempotent by primary key (re-delivery overwrites in place, never
//! duplicates) because the loop guarantees at-least-once delivery, not
//! exactly-once.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::row::Row;
use crate::schema::{table_schema, TableSchema};
use crate::state::SyncState;

/// Where upserted rows and checkpointed state go.
pub trait Sink {
    /// Inserts or overwrites one row, keyed by the table's primary key.
    fn upsert(&mut self, table: &str, row: Row) -> Result<()>;

    /// Durably persists sync state as the new resume point.
    fn checkpoint(&mut self, state: &SyncState) -> Result<()>;
}

/// In-memory sink with real upsert semantics, for tests and dry runs.
///
/// Rows are keyed by (table, primary key); a repeated upsert of the same key
/// overwrites in place, which is exactly what makes re-fetch of overlapping
/// windows safe.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: HashMap<String, HashMap<String, Row>>,
    /// Every state ever checkpointed, oldest first.
    pub checkpoints: Vec<SyncState>,
    /// Total upsert calls, counting overwrites.
    pub upsert_calls: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct rows currently stored for a table.
    pub fn table_rows(&self, table: &str) -> Vec<&Row> {
        self.rows
            .get(table)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows.get(table).map(|m| m.len()).unwrap_or(0)
    }

    pub fn last_checkpoint(&self) -> Option<&SyncState> {
        self.checkpoints.last()
    }
}

impl Sink for MemorySink {
    fn upsert(&mut self, table: &str, row: Row) -> Result<()> {
        let schema = table_schema(table)
            .with_context(|| format!("No schema declared for table '{}'", table))?;
        let key = row.primary_key_of(&schema);
        self.rows
            .entry(table.to_string())
            .or_default()
            .insert(key, row);
        self.upsert_calls += 1;
        Ok(())
    }

    fn checkpoint(&mut self, state: &SyncState) -> Result<()> {
        self.checkpoints.push(state.clone());
        Ok(())
    }
}

/// File-backed sink used by the CLI.
///
/// Each table lives in `<data_dir>/<table>.jsonl`, one JSON object per line,
/// one line per primary key. Existing rows are loaded on first touch and
/// upserts overwrite in place, so re-delivery never duplicates a row in the
/// destination. Table files and the state file are rewritten atomically
/// (temp file + rename) at checkpoint time, so a crash mid-checkpoint never
/// corrupts the previous resume point.
pub struct JsonlSink {
    data_dir: PathBuf,
    state_path: PathBuf,
    /// Per-table rows keyed by primary key, flushed at checkpoint.
    tables: HashMap<String, BTreeMap<String, Row>>,
}

impl JsonlSink {
    pub fn new(data_dir: impl AsRef<Path>, state_path: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
        Ok(Self {
            data_dir,
            state_path: state_path.as_ref().to_path_buf(),
            tables: HashMap::new(),
        })
    }

    /// Loads previously checkpointed state, or empty state on first run.
    pub fn load_state(&self) -> Result<SyncState> {
        if !self.state_path.exists() {
            return Ok(SyncState::new());
        }
        let contents = fs::read_to_string(&self.state_path)
            .with_context(|| format!("Failed to read state file {}", self.state_path.display()))?;
        SyncState::from_json(&contents)
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", table))
    }

    /// Reads a table's existing file into memory, keyed by primary key, so
    /// upserts across runs overwrite rather than duplicate.
    fn load_table(&mut self, table: &str, schema: &TableSchema) -> Result<()> {
        if self.tables.contains_key(table) {
            return Ok(());
        }
        let path = self.table_path(table);
        let mut rows = BTreeMap::new();
        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                let row: Row = serde_json::from_str(line)
                    .with_context(|| format!("Corrupt row in {}", path.display()))?;
                rows.insert(row.primary_key_of(schema), row);
            }
        }
        self.tables.insert(table.to_string(), rows);
        Ok(())
    }

    fn write_atomic(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(())
    }
}

impl Sink for JsonlSink {
    fn upsert(&mut self, table: &str, row: Row) -> Result<()> {
        let schema = table_schema(table)
            .with_context(|| format!("No schema declared for table '{}'", table))?;
        self.load_table(table, &schema)?;
        let key = row.primary_key_of(&schema);
        self.tables.entry(table.to_string()).or_default().insert(key, row);
        Ok(())
    }

    fn checkpoint(&mut self, state: &SyncState) -> Result<()> {
        for (table, rows) in &self.tables {
            let mut buf = String::new();
            for row in rows.values() {
                buf.push_str(&serde_json::to_string(row).context("Failed to serialize row")?);
                buf.push('\n');
            }
            Self::write_atomic(&self.table_path(table), &buf)?;
        }
        Self::write_atomic(&self.state_path, &state.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;
    use crate::state::Cursor;
    use chrono::{TimeZone, Utc};

    fn chat_row(id: &str, rating: i64) -> Row {
        let mut row = Row::new();
        row.set("chat_id", Value::String(id.to_string()));
        row.set("rating", Value::Integer(rating));
        row
    }

    #[test]
    fn test_memory_sink_upsert_overwrites() {
        let mut sink = MemorySink::new();
        sink.upsert("chats", chat_row("c1", 3)).unwrap();
        sink.upsert("chats", chat_row("c1", 5)).unwrap();
        sink.upsert("chats", chat_row("c2", 4)).unwrap();

        assert_eq!(sink.upsert_calls, 3);
        assert_eq!(sink.row_count("chats"), 2);
        let c1 = sink
            .table_rows("chats")
            .into_iter()
            .find(|r| r.get("chat_id") == Some(&Value::String("c1".to_string())))
            .unwrap();
        assert_eq!(c1.get("rating"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_memory_sink_unknown_table_is_error() {
        let mut sink = MemorySink::new();
        assert!(sink.upsert("visitors", chat_row("c1", 1)).is_err());
    }

    #[test]
    fn test_memory_sink_checkpoints_accumulate() {
        let mut sink = MemorySink::new();
        let mut state = SyncState::new();
        state.advance("threads", Some(Cursor::token("p1")));
        sink.checkpoint(&state).unwrap();
        state.advance("threads", Some(Cursor::token("p2")));
        sink.checkpoint(&state).unwrap();

        assert_eq!(sink.checkpoints.len(), 2);
        assert_eq!(
            sink.last_checkpoint().unwrap().get("threads").unwrap(),
            &Cursor::token("p2")
        );
    }

    #[test]
    fn test_jsonl_sink_writes_rows_at_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let mut sink = JsonlSink::new(dir.path(), &state_path).unwrap();

        sink.upsert("chats", chat_row("c1", 5)).unwrap();
        sink.upsert("chats", chat_row("c2", 4)).unwrap();
        sink.checkpoint(&SyncState::new()).unwrap();

        let contents = fs::read_to_string(dir.path().join("chats.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("c1"));
    }

    #[test]
    fn test_jsonl_sink_upsert_overwrites_by_key() {
        // Re-delivery of the same primary key must overwrite, not duplicate.
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let mut sink = JsonlSink::new(dir.path(), &state_path).unwrap();

        sink.upsert("chats", chat_row("c1", 3)).unwrap();
        sink.upsert("chats", chat_row("c1", 5)).unwrap();
        sink.checkpoint(&SyncState::new()).unwrap();

        let contents = fs::read_to_string(dir.path().join("chats.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"rating\":5"));
    }

    #[test]
    fn test_jsonl_sink_overwrites_across_runs() {
        // A later run re-fetching the same key updates the stored row in
        // place instead of appending a second copy.
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");

        let mut sink = JsonlSink::new(dir.path(), &state_path).unwrap();
        sink.upsert("chats", chat_row("c1", 3)).unwrap();
        sink.upsert("chats", chat_row("c2", 4)).unwrap();
        sink.checkpoint(&SyncState::new()).unwrap();
        drop(sink);

        let mut sink = JsonlSink::new(dir.path(), &state_path).unwrap();
        sink.upsert("chats", chat_row("c1", 5)).unwrap();
        sink.checkpoint(&SyncState::new()).unwrap();

        let contents = fs::read_to_string(dir.path().join("chats.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let c1 = contents.lines().find(|l| l.contains("c1")).unwrap();
        assert!(c1.contains("\"rating\":5"));
    }

    #[test]
    fn test_jsonl_sink_unknown_table_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::new(dir.path(), dir.path().join("state.json")).unwrap();
        assert!(sink.upsert("visitors", chat_row("c1", 1)).is_err());
    }

    #[test]
    fn test_jsonl_sink_checkpoint_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("nested/state.json");
        let mut sink = JsonlSink::new(dir.path(), &state_path).unwrap();

        assert!(sink.load_state().unwrap().is_empty());

        let mut state = SyncState::new();
        state.advance(
            "chats",
            Some(Cursor::time(
                Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            )),
        );
        sink.checkpoint(&state).unwrap();

        let loaded = sink.load_state().unwrap();
        assert_eq!(loaded, state);
        assert!(!state_path.with_extension("tmp").exists());
    }
}
