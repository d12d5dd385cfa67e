//! Canonical row representation handed to the sink.
//!
//! A [`Row`] maps column names to scalar [`Value`]s conforming to the table's
//! declared types. Rows are ephemeral: produced from one raw API item, handed
//! to the sink, then dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::TableSchema;

/// A scalar cell value.
///
/// Untagged variant order matters for deserialization: timestamps are tried
/// before plain strings so RFC 3339 text round-trips as a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Timestamp(DateTime<Utc>),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value for use in a composite primary-key string.
    fn key_part(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339(),
        }
    }
}

/// One destination row: column name → scalar value.
///
/// Columns are kept sorted so serialized rows are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &str, value: Value) {
        self.values.insert(column.to_string(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether every primary-key column of `table` is present and non-null.
    pub fn has_primary_key(&self, table: &TableSchema) -> bool {
        table
            .primary_key
            .iter()
            .all(|pk| self.get(pk).is_some_and(|v| !v.is_null()))
    }

    /// Builds the composite upsert key for this row under `table`'s primary key.
    ///
    /// Callers must check [`Row::has_primary_key`] first; missing parts render
    /// as empty strings.
    pub fn primary_key_of(&self, table: &TableSchema) -> String {
        table
            .primary_key
            .iter()
            .map(|pk| self.get(pk).map(Value::key_part).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::table_schema;
    use chrono::TimeZone;

    #[test]
    fn test_set_and_get() {
        let mut row = Row::new();
        row.set("chat_id", Value::String("c1".to_string()));
        row.set("rating", Value::Null);
        assert_eq!(row.get("chat_id"), Some(&Value::String("c1".to_string())));
        assert!(row.get("rating").unwrap().is_null());
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_has_primary_key() {
        let chats = table_schema("chats").unwrap();
        let mut row = Row::new();
        assert!(!row.has_primary_key(&chats));

        row.set("chat_id", Value::Null);
        assert!(!row.has_primary_key(&chats));

        row.set("chat_id", Value::String("c1".to_string()));
        assert!(row.has_primary_key(&chats));
    }

    #[test]
    fn test_primary_key_of() {
        let chats = table_schema("chats").unwrap();
        let mut row = Row::new();
        row.set("chat_id", Value::String("c42".to_string()));
        assert_eq!(row.primary_key_of(&chats), "c42");
    }

    #[test]
    fn test_serialization_null_and_timestamp() {
        let mut row = Row::new();
        row.set("chat_id", Value::String("c1".to_string()));
        row.set("rating", Value::Null);
        row.set("group_id", Value::Integer(7));
        row.set(
            "start_time",
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()),
        );

        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"rating\":null"));
        assert!(json.contains("\"group_id\":7"));
        assert!(json.contains("2024-06-01T12:00:00"));
    }

    #[test]
    fn test_deterministic_column_order() {
        let mut row = Row::new();
        row.set("zzz", Value::Integer(1));
        row.set("aaa", Value::Integer(2));
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.find("aaa").unwrap() < json.find("zzz").unwrap());
    }
}
