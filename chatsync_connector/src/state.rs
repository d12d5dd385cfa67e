//! Per-table sync state and cursors.
//!
//! [`SyncState`] is the checkpointed mapping from table name to cursor. It is
//! read once at the start of a run, mutated only through
//! [`SyncState::advance`], and persisted by the sink's checkpoint operation.
//!
//! Wire shape (what the host stores between runs):
//!
//! ```json
//! {
//!   "chats":   { "last_synced_time": "2024-06-01T00:00:00Z" },
//!   "threads": { "page_id": "MTcxOD..." }
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position marking how much of one table has been synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    /// Time-windowed tables: everything up to this instant has been fetched.
    LastSyncedTime {
        last_synced_time: DateTime<Utc>,
    },
    /// Token-paginated tables: opaque next-page token assigned by the API.
    PageToken {
        page_id: String,
    },
}

impl Cursor {
    pub fn time(ts: DateTime<Utc>) -> Self {
        Cursor::LastSyncedTime {
            last_synced_time: ts,
        }
    }

    pub fn token(page_id: impl Into<String>) -> Self {
        Cursor::PageToken {
            page_id: page_id.into(),
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Cursor::LastSyncedTime { last_synced_time } => Some(*last_synced_time),
            Cursor::PageToken { .. } => None,
        }
    }

    pub fn as_token(&self) -> Option<&str> {
        match self {
            Cursor::PageToken { page_id } => Some(page_id.as_str()),
            Cursor::LastSyncedTime { .. } => None,
        }
    }
}

/// Checkpointed sync state: table name → cursor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncState {
    tables: BTreeMap<String, Cursor>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<&Cursor> {
        self.tables.get(table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Advances a table's cursor.
    ///
    /// Timestamp cursors are monotonic: an older timestamp than the stored one
    /// is ignored, so a re-run with stale input can never lose already-synced
    /// ground. Token cursors are opaque and API-assigned, so they always
    /// replace the stored value. `None` clears the cursor (terminal page
    /// token: the next run starts from the beginning).
    pub fn advance(&mut self, table: &str, cursor: Option<Cursor>) {
        match cursor {
            Some(Cursor::LastSyncedTime { last_synced_time }) => {
                let regressed = matches!(
                    self.tables.get(table),
                    Some(Cursor::LastSyncedTime { last_synced_time: prev }) if *prev > last_synced_time
                );
                if !regressed {
                    self.tables
                        .insert(table.to_string(), Cursor::time(last_synced_time));
                }
            }
            Some(token @ Cursor::PageToken { .. }) => {
                self.tables.insert(table.to_string(), token);
            }
            None => {
                self.tables.remove(table);
            }
        }
    }

    /// Parses state from its persisted JSON form.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).map_err(|e| anyhow::anyhow!("Failed to parse sync state: {}", e))
    }

    /// Serializes state to its persisted JSON form.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize sync state: {}", e))
    }
}
