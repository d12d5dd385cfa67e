//! Raw API item → canonical row transformation.
//!
//! Upstream item shapes are API-version-specific and partially undocumented
//! (field names drift across versions, e.g. `chat_id` vs `id`, `start_time`
//! vs `started_at`). Each table therefore has one explicit mapping here, with
//! a documented fallback name per column where the versions diverge. Missing
//! keys fill with [`Value::Null`] instead of failing.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::row::{Row, Value};

/// Transforms one raw API item into a row for `table`.
///
/// Fails only on structurally unusable input (the item is not a JSON object,
/// or the table is unknown); a missing field is never an error.
pub fn transform(table: &str, item: &serde_json::Value) -> Result<Row> {
    if !item.is_object() {
        bail!("Expected a JSON object item for table {}, got {}", table, item);
    }

    match table {
        "chats" => Ok(chat_to_row(item)),
        "threads" => Ok(thread_to_row(item)),
        "events" => Ok(event_to_row(item)),
        other => bail!("No transformation defined for table '{}'", other),
    }
}

/// v3.3 reporting-API chat shape, with v3.5 agent-API fallback names.
fn chat_to_row(item: &serde_json::Value) -> Row {
    let mut row = Row::new();
    row.set("chat_id", string_of(item, &["chat_id", "id"]));
    row.set("start_time", timestamp_of(item, &["start_time", "started_at"]));
    row.set("end_time", timestamp_of(item, &["end_time", "ended_at"]));
    row.set("agent_id", string_of(item, &["agent_id"]));
    row.set("agent_name", string_of(item, &["agent_name"]));
    row.set("group_id", integer_of(item, &["group_id"]));
    row.set("tags", joined_list_of(item, "tags"));
    row.set("duration", integer_of(item, &["duration"]));
    // The reporting API calls the customer rating "rate".
    row.set("rating", integer_of(item, &["rate", "rating"]));
    row.set("customer_email", nested_string_of(item, "visitor", "email"));
    row.set("customer_ip", nested_string_of(item, "visitor", "ip"));
    row
}

fn thread_to_row(item: &serde_json::Value) -> Row {
    let mut row = Row::new();
    row.set("id", string_of(item, &["id", "thread_id"]));
    row.set("chat_id", string_of(item, &["chat_id"]));
    row.set("created_at", timestamp_of(item, &["created_at"]));
    row.set("user_ids", joined_list_of(item, "user_ids"));
    row.set("tags", joined_list_of(item, "tags"));
    row
}

fn event_to_row(item: &serde_json::Value) -> Row {
    let mut row = Row::new();
    row.set("id", string_of(item, &["id", "event_id"]));
    row.set("thread_id", string_of(item, &["thread_id"]));
    row.set("chat_id", string_of(item, &["chat_id"]));
    row.set("event_type", string_of(item, &["type"]));
    row.set("author_id", string_of(item, &["author_id"]));
    row.set("created_at", timestamp_of(item, &["created_at"]));
    row.set("text", string_of(item, &["text"]));
    row
}

fn scalar_string(v: &serde_json::Value) -> Option<Value> {
    match v {
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Number(n) => Some(Value::String(n.to_string())),
        serde_json::Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

/// First present key wins; non-string scalars are coerced via display.
fn string_of(item: &serde_json::Value, keys: &[&str]) -> Value {
    keys.iter()
        .filter_map(|key| item.get(key).and_then(scalar_string))
        .next()
        .unwrap_or(Value::Null)
}

fn integer_of(item: &serde_json::Value, keys: &[&str]) -> Value {
    for key in keys {
        if let Some(v) = item.get(key) {
            if let Some(i) = v.as_i64() {
                return Value::Integer(i);
            }
            if let Some(f) = v.as_f64() {
                return Value::Integer(f as i64);
            }
            if let Some(s) = v.as_str() {
                if let Ok(i) = s.parse::<i64>() {
                    return Value::Integer(i);
                }
            }
        }
    }
    Value::Null
}

/// RFC 3339 parse; unparseable or missing text yields null rather than error.
fn timestamp_of(item: &serde_json::Value, keys: &[&str]) -> Value {
    for key in keys {
        if let Some(s) = item.get(key).and_then(|v| v.as_str()) {
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Value::Timestamp(ts.with_timezone(&Utc));
            }
        }
    }
    Value::Null
}

/// List-valued field flattened to a single comma-joined scalar.
///
/// Lossy only for ordering of duplicate values, never for set membership.
fn joined_list_of(item: &serde_json::Value, key: &str) -> Value {
    match item.get(key).and_then(|v| v.as_array()) {
        Some(list) => {
            let parts: Vec<String> = list
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            Value::String(parts.join(", "))
        }
        None => Value::Null,
    }
}

fn nested_string_of(item: &serde_json::Value, outer: &str, inner: &str) -> Value {
    item.get(outer)
        .and_then(|v| v.get(inner))
        .and_then(scalar_string)
        .unwrap_or(Value::Null)
}
