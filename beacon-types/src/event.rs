//! Structured analytics events.

use chrono::{DateTime, Utc};

/// A typed parameter value.
///
/// Covers every shape the collect wire format can carry: the four numeric
/// widths, booleans, strings, fixed-format timestamps, and arbitrarily nested
/// objects and arrays.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    String(String),
    /// Rendered as a quoted `yyyy-MM-dd HH:mm:ss` UTC string on the wire.
    Timestamp(DateTime<Utc>),
    Object(EventData),
    Array(Vec<Value>),
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

/// An insertion-ordered key→value parameter container.
///
/// Setting an existing key replaces the value in place; iteration order is
/// the order keys were first set, which is also the order parameters appear
/// on the wire.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventData {
    entries: Vec<(String, Value)>,
}

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing any existing value under the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One analytics event, assembled by the application before buffering.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    name: String,
    /// Schema version; present only for versioned standard events.
    version: Option<i32>,
    pub parameters: EventData,
}

impl Event {
    pub fn new(name: impl Into<String>, version: Option<i32>) -> Self {
        Self {
            name: name.into(),
            version,
            parameters: EventData::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<i32> {
        self.version
    }
}
