use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single report cell: either a metric number or a descriptive string.
///
/// Rows are not a fixed schema, so cells carry their own shape instead of
/// relying on a record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    /// Render the cell the way it participates in a composite join key.
    ///
    /// Whole numbers print without a fractional part so a numeric offer id
    /// and its string form produce the same key segment.
    pub fn key_part(&self) -> String {
        match self {
            Value::Number(n) => format!("{n}"),
            Value::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
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

/// One report row: a mapping from field name to value.
///
/// The set of present keys depends on what was requested; missing metrics are
/// normalized to zero by the reconciliation engine, never left to propagate
/// as "absent" into arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(Value::as_number)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Composite join key over the requested grouping dimensions.
    ///
    /// Purely a function of the dimension list: changing the requested
    /// dimensions changes both what "matches" means and what constitutes a
    /// distinct output row. Absent fields contribute an empty segment.
    pub fn composite_key(&self, dimensions: &[String]) -> String {
        dimensions
            .iter()
            .map(|f| self.get(f).map(Value::key_part).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Convert a raw JSON object (one tracker row) into a row.
    ///
    /// Numbers and strings carry over; booleans become text; null and nested
    /// shapes are dropped, which the zero-default normalization then covers.
    pub fn from_json_map(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut row = Row::new();
        for (field, value) in map {
            match value {
                serde_json::Value::Number(n) => {
                    if let Some(n) = n.as_f64() {
                        row.set(field.clone(), n);
                    }
                }
                serde_json::Value::String(s) => {
                    row.set(field.clone(), s.clone());
                }
                serde_json::Value::Bool(b) => {
                    row.set(field.clone(), b.to_string());
                }
                serde_json::Value::Null
                | serde_json::Value::Array(_)
                | serde_json::Value::Object(_) => {}
            }
        }
        row
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (S, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Round a summary value to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Final report payload: joined rows plus a per-field aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportResult {
    pub rows: Vec<Row>,
    pub summary: BTreeMap<String, f64>,
}
