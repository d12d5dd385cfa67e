//! Registry of synced tables: endpoint, pagination style, and item-list key.
//!
//! The LiveChat API splits across two surfaces. The v3.3 reporting API serves
//! `chats` as a time-windowed GET; the v3.5 agent API serves `threads` and
//! `events` as token-paginated POST actions.

use anyhow::{bail, Result};

/// How a table's endpoint paginates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// GET with `date_from`/`date_to`/`limit`/`page` query parameters.
    TimeWindow,
    /// POST with a JSON body carrying an optional `page_id` token.
    Token,
}

/// Static description of one synced table's upstream endpoint.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Destination table name (matches the schema declaration).
    pub name: &'static str,
    /// URL path relative to the API base.
    pub path: &'static str,
    /// Response key the item list lives under.
    pub items_key: &'static str,
    /// Pagination style.
    pub pagination: Pagination,
}

const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "chats",
        path: "/v3.3/reporting/chats",
        items_key: "chats",
        pagination: Pagination::TimeWindow,
    },
    TableSpec {
        name: "threads",
        path: "/v3.5/agent/action/list_threads",
        items_key: "items",
        pagination: Pagination::Token,
    },
    TableSpec {
        name: "events",
        path: "/v3.5/agent/action/list_events",
        items_key: "items",
        pagination: Pagination::Token,
    },
];

/// All tables this connector knows how to sync, in sync order.
pub fn known_tables() -> &'static [TableSpec] {
    TABLES
}

/// Resolves a table name to its spec.
///
/// An unknown name is a configuration/schema mismatch, not a transient
/// condition, so this is an error rather than a skip.
pub fn lookup(name: &str) -> Result<&'static TableSpec> {
    match TABLES.iter().find(|t| t.name == name) {
        Some(spec) => Ok(spec),
        None => bail!(
            "Unsupported table '{}': known tables are {}",
            name,
            TABLES
                .iter()
                .map(|t| t.name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
