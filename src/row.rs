//! Result rows and search response parsing
//!
//! A [`ResultRow`] is an opaque JSON object. The engine only reads an
//! identifier, a label, an optional secondary line, and whatever fields the
//! binding's write-back rules ask for.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shared, immutable list of rows (cheap to clone across waiters)
pub type Rows = Arc<[ResultRow]>;

const ID_KEYS: &[&str] = &["id", "value", "code"];
const LABEL_KEYS: &[&str] = &["label", "name", "text", "title", "full_name"];
const SECONDARY_KEYS: &[&str] = &["subtitle", "description", "code", "sku"];

/// One search result record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow(Map<String, Value>);

impl ResultRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap any JSON value; non-objects become `{ "label": <value> }`
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            other => {
                let mut map = Map::new();
                map.insert("label".to_string(), other);
                Self(map)
            }
        }
    }

    /// Raw field access
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Field rendered as text (strings unquoted, numbers/bools via Display)
    pub fn text(&self, field: &str) -> Option<String> {
        self.0.get(field).and_then(scalar_text)
    }

    fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.text(k))
            .find(|s| !s.is_empty())
    }

    /// Identifying value
    pub fn id(&self) -> Option<String> {
        self.first_text(ID_KEYS)
    }

    /// Human label, falling back to the identifier
    pub fn label(&self) -> String {
        self.first_text(LABEL_KEYS)
            .or_else(|| self.id())
            .unwrap_or_default()
    }

    /// Optional secondary line (never repeats the label)
    pub fn secondary(&self) -> Option<String> {
        let label = self.label();
        SECONDARY_KEYS
            .iter()
            .filter_map(|k| self.text(k))
            .find(|s| !s.is_empty() && *s != label)
    }

    /// Value for a write-back field: `label` and `id` use the fallbacks above
    pub fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "label" => Some(self.label()),
            "id" => self.id(),
            other => self.text(other),
        }
    }

    /// Case-insensitive substring match against every scalar in the record
    pub fn matches(&self, needle_lower: &str) -> bool {
        if needle_lower.is_empty() {
            return true;
        }
        self.0.values().any(|v| value_matches(v, needle_lower))
    }
}

impl From<Value> for ResultRow {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_matches(value: &Value, needle_lower: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| value_matches(v, needle_lower)),
        Value::Object(map) => map.values().any(|v| value_matches(v, needle_lower)),
        other => scalar_text(other)
            .map(|s| s.to_lowercase().contains(needle_lower))
            .unwrap_or(false),
    }
}

/// Parse a search response body
///
/// Accepts a bare array or `{ "items": [...] }`. Any other shape is zero
/// rows, not an error.
pub fn parse_rows(body: Value) -> Vec<ResultRow> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items.into_iter().map(ResultRow::from_value).collect()
}
