//! Loosely-typed upstream records
//!
//! Upstream payloads carry no schema guarantees: fields go missing, numbers
//! arrive as strings, strings arrive as null. [`RawRecord`] wraps one record
//! and exposes accessors that always produce a value.

use serde_json::{Map, Value};

/// An upstream-shaped bag of optional fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value, returning None unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Sets a field, replacing any previous value
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Builder-style variant of [`RawRecord::insert`]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns true if the key exists and is not null
    pub fn has(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(v) if !v.is_null())
    }

    /// Returns the raw value for a key, if any
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a field as text
    ///
    /// Strings are returned as-is, numbers and booleans are rendered, and
    /// anything else (missing, null, arrays, objects) becomes an empty string.
    pub fn text(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// Returns a field as a non-negative finite number
    ///
    /// JSON numbers and numeric strings are accepted. Anything that does not
    /// parse, is negative, or is not finite yields 0.
    pub fn number(&self, key: &str) -> f64 {
        let value = match self.fields.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match value {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => 0.0,
        }
    }

    /// Returns a field as a non-negative integer count
    pub fn count(&self, key: &str) -> u64 {
        if let Some(n) = self.fields.get(key).and_then(Value::as_u64) {
            return n;
        }
        self.number(key).trunc() as u64
    }

    /// Number of fields present
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
