// Payload - A small typed field set exchanged between phone and watch
//
// Keys are unique and keep their insertion order. Each value remembers the
// type it was written with, so a typed read of the wrong type yields None.

use std::fmt;
use thiserror::Error;

/// Errors from building a payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Empty key")]
    EmptyKey,
}

/// A typed payload value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Int(i32),
    Long(i64),
}

impl FieldValue {
    /// Name of the value's type, as shown by the CLI and in logs
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

/// Ordered mapping from string keys to typed values
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    fields: Vec<(String, FieldValue)>,
}

impl Payload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from an ordered field list, rejecting repeated keys
    pub fn from_fields<I, K>(fields: I) -> Result<Self, PayloadError>
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        let mut payload = Self::new();
        for (key, value) in fields {
            let key = key.into();
            if key.is_empty() {
                return Err(PayloadError::EmptyKey);
            }
            if payload.contains_key(&key) {
                return Err(PayloadError::DuplicateKey(key));
            }
            payload.fields.push((key, value));
        }
        Ok(payload)
    }

    /// Add a string field
    pub fn with_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, FieldValue::Str(value.into()));
        self
    }

    /// Add a 32-bit integer field
    pub fn with_int(mut self, key: &str, value: i32) -> Self {
        self.insert(key, FieldValue::Int(value));
        self
    }

    /// Add a 64-bit integer field
    pub fn with_long(mut self, key: &str, value: i64) -> Self {
        self.insert(key, FieldValue::Long(value));
        self
    }

    /// Insert a field. An existing key is replaced in place and its old value returned.
    ///
    /// An empty key is held but makes the payload unencodable.
    pub fn insert(&mut self, key: &str, value: FieldValue) -> Option<FieldValue> {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.fields.push((key.to_string(), value));
                None
            }
        }
    }

    /// Remove a field
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(index).1)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(FieldValue::as_int)
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_long)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
