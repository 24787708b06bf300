//! Typed access to index documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single index document, kept as its raw field map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolrDocument(Map<String, Value>);

impl SolrDocument {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style field setter
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// First string value of a field; multi-valued fields yield their first entry
    pub fn first_str(&self, field: &str) -> Option<&str> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.as_str()),
            Value::Array(values) => values.iter().find_map(Value::as_str),
            _ => None,
        }
        .filter(|s| !s.is_empty())
    }

    /// All values of a field rendered as strings
    pub fn values(&self, field: &str) -> Vec<String> {
        match self.0.get(field) {
            Some(Value::Array(values)) => values.iter().filter_map(value_to_string).collect(),
            Some(value) => value_to_string(value).into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn first_i64(&self, field: &str) -> Option<i64> {
        let value = match self.0.get(field)? {
            Value::Array(values) => values.first()?,
            value => value,
        };
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean field; absent or unparseable counts as false
    pub fn bool(&self, field: &str) -> bool {
        match self.0.get(field) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Array(values)) => values.first().and_then(Value::as_bool).unwrap_or(false),
            _ => false,
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for SolrDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
