//! Chatsync connector — incremental extraction from the LiveChat API.
//!
//! This crate implements the connector contract: given configuration and
//! prior sync state, fetch every new or changed record since the last
//! checkpoint, normalize it into a fixed tabular schema, hand rows to an
//! upsert [`Sink`](sink::Sink), and return the advanced state.
//!
//! # Modules
//!
//! - [`schema`]: Table and column declarations
//! - [`state`]: Per-table cursors and checkpointed sync state
//! - [`row`]: Canonical row values handed to the sink
//! - [`tables`]: Endpoint registry (pagination style, item-list key)
//! - [`transform`]: Raw API item → row field mappings
//! - [`client`]: The `reqwest`-backed LiveChat client and the page-source seam
//! - [`sink`]: Upsert/checkpoint trait plus memory and JSONL implementations
//! - [`sync`]: The incremental fetch loop

pub mod client;
pub mod row;
pub mod schema;
pub mod sink;
pub mod state;
pub mod sync;
pub mod tables;
pub mod transform;

// Re-export primary types for convenience
pub use client::{AuthScheme, LiveChatClient, PageQuery, PageSource};
pub use row::{Row, Value};
pub use schema::{schema, table_schema, Column, ColumnType, TableSchema};
pub use sink::{JsonlSink, MemorySink, Sink};
pub use state::{Cursor, SyncState};
pub use sync::{run, SyncOptions, TableReport};
pub use tables::{known_tables, Pagination, TableSpec};
pub use transform::transform;
