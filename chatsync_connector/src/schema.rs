//! Table schema declarations for the LiveChat connector.
//!
//! Each synced table is declared once as a [`TableSchema`] with a non-empty
//! primary key and a typed column list. Schemas are immutable for the
//! connector's lifetime; the host registers them before the first run.

use serde::{Deserialize, Serialize};

/// Declared type of a destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Integer,
    Timestamp,
}

/// A single column declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
        }
    }
}

/// Schema for one synced table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Destination table name.
    pub name: String,
    /// Ordered primary-key column names (always non-empty).
    pub primary_key: Vec<String>,
    /// Column declarations.
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Looks up a column declaration by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether `name` is one of the primary-key columns.
    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == name)
    }
}

/// Returns the schema declarations for all tables this connector syncs.
///
/// The set is fixed: `chats` (time-windowed reporting API), `threads` and
/// `events` (token-paginated agent API).
pub fn schema() -> Vec<TableSchema> {
    vec![
        TableSchema {
            name: "chats".to_string(),
            primary_key: vec!["chat_id".to_string()],
            columns: vec![
                Column::new("chat_id", ColumnType::String),
                Column::new("start_time", ColumnType::Timestamp),
                Column::new("end_time", ColumnType::Timestamp),
                Column::new("agent_id", ColumnType::String),
                Column::new("agent_name", ColumnType::String),
                Column::new("group_id", ColumnType::Integer),
                Column::new("tags", ColumnType::String),
                Column::new("duration", ColumnType::Integer),
                Column::new("rating", ColumnType::Integer),
                Column::new("customer_email", ColumnType::String),
                Column::new("customer_ip", ColumnType::String),
            ],
        },
        TableSchema {
            name: "threads".to_string(),
            primary_key: vec!["id".to_string()],
            columns: vec![
                Column::new("id", ColumnType::String),
                Column::new("chat_id", ColumnType::String),
                Column::new("created_at", ColumnType::Timestamp),
                Column::new("user_ids", ColumnType::String),
                Column::new("tags", ColumnType::String),
            ],
        },
        TableSchema {
            name: "events".to_string(),
            primary_key: vec!["id".to_string()],
            columns: vec![
                Column::new("id", ColumnType::String),
                Column::new("thread_id", ColumnType::String),
                Column::new("chat_id", ColumnType::String),
                Column::new("event_type", ColumnType::String),
                Column::new("author_id", ColumnType::String),
                Column::new("created_at", ColumnType::Timestamp),
                Column::new("text", ColumnType::String),
            ],
        },
    ]
}

/// Looks up one table's schema by name.
pub fn table_schema(name: &str) -> Option<TableSchema> {
    schema().into_iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tables_declared() {
        let tables = schema();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["chats", "threads", "events"]);
    }

    #[test]
    fn test_primary_keys_non_empty() {
        for table in schema() {
            assert!(
                !table.primary_key.is_empty(),
                "table {} has empty primary key",
                table.name
            );
            for pk in &table.primary_key {
                assert!(
                    table.column(pk).is_some(),
                    "table {} primary key {} not in columns",
                    table.name,
                    pk
                );
            }
        }
    }

    #[test]
    fn test_chats_columns() {
        let chats = table_schema("chats").unwrap();
        assert!(chats.is_primary_key("chat_id"));
        assert!(!chats.is_primary_key("tags"));
        assert_eq!(
            chats.column("group_id").unwrap().column_type,
            ColumnType::Integer
        );
        assert_eq!(
            chats.column("start_time").unwrap().column_type,
            ColumnType::Timestamp
        );
    }

    #[test]
    fn test_unknown_table() {
        assert!(table_schema("nonexistent").is_none());
    }

    #[test]
    fn test_schema_serialization() {
        let json = serde_json::to_string(&schema()).unwrap();
        assert!(json.contains("\"type\":\"timestamp\""));
        let back: Vec<TableSchema> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 3);
    }
}
