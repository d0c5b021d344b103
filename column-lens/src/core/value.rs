//! Raw values and rows as delivered by a query executor.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar delivered by the executor.
///
/// Executors are free to deliver numbers as text; the accessors below parse
/// tolerantly and treat anything unparseable as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value. Empty or non-numeric text is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Integral view of the value, truncating fractional parts.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| float_to_i64(trimmed.parse::<f64>().ok()?))
            }
            other => float_to_i64(other.as_f64()?),
        }
    }

    /// Count view of the value: negative or unparseable counts are `None`.
    pub fn as_count(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }

    /// Text rendering used for frequencies, samples and extremes.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn float_to_i64(f: f64) -> Option<i64> {
    (f.is_finite() && f.abs() < 9.2e18).then(|| f.trunc() as i64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row, in either of the shapes executors are known to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRow {
    /// Field name to value.
    Named(BTreeMap<String, Value>),
    /// Values in the fragment's declared output-field order.
    Positional(Vec<Value>),
}

impl RawRow {
    /// Builds a named row from `(field, value)` pairs.
    pub fn named<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        RawRow::Named(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Normalizes either shape into a [`Record`].
    ///
    /// Positional rows are zipped with `fields`; surplus values are ignored
    /// and missing trailing values read as null. Named keys are matched
    /// case-insensitively.
    pub fn normalize(&self, fields: &[String]) -> Record {
        let values = match self {
            RawRow::Named(map) => map
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
            RawRow::Positional(values) => fields
                .iter()
                .zip(values.iter())
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
        };
        Record { values }
    }
}

/// A normalized row keyed by lowercase field name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    /// The value of `field`, or null when absent.
    pub fn get(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values
            .get(&field.to_ascii_lowercase())
            .unwrap_or(&NULL)
    }

    pub fn count(&self, field: &str) -> u64 {
        self.get(field).as_count().unwrap_or(0)
    }

    pub fn float(&self, field: &str) -> Option<f64> {
        self.get(field).as_f64()
    }

    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field).render()
    }

    /// Converts back into a named row with lowercase keys.
    pub fn into_row(self) -> RawRow {
        RawRow::Named(self.values)
    }
}
