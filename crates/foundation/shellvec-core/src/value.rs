//! Result shapes
//!
//! Probe logic picks one shape explicitly instead of handing back an
//! untyped value for the formatter to inspect.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

/// Structured result of one module run.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultValue {
    /// Nothing was produced.
    #[default]
    Empty,
    Scalar(Scalar),
    /// One cell per row, single column.
    FlatRow(Vec<Scalar>),
    /// Rows of equal width.
    RowMatrix(Vec<Vec<Scalar>>),
    /// `key, cells...` per row, insertion ordered.
    KeyedRows(Vec<(String, Vec<Scalar>)>),
    /// `key, value` per row, insertion ordered.
    KeyedScalars(Vec<(String, Scalar)>),
}

impl ResultValue {
    pub fn text(s: impl Into<String>) -> Self {
        ResultValue::Scalar(Scalar::Text(s.into()))
    }

    /// True for values that display as nothing.
    ///
    /// `false` is a meaningful answer and is not blank; an empty string,
    /// an empty collection or `Empty` are.
    pub fn is_blank(&self) -> bool {
        match self {
            ResultValue::Empty => true,
            ResultValue::Scalar(Scalar::Text(s)) => s.is_empty(),
            ResultValue::Scalar(_) => false,
            ResultValue::FlatRow(v) => v.is_empty(),
            ResultValue::RowMatrix(v) => v.is_empty(),
            ResultValue::KeyedRows(v) => v.is_empty(),
            ResultValue::KeyedScalars(v) => v.is_empty(),
        }
    }

    /// JSON view of the value, used by `--json` output.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Map, Value};

        match self {
            ResultValue::Empty => Value::Null,
            ResultValue::Scalar(s) => json!(s),
            ResultValue::FlatRow(cells) => json!(cells),
            ResultValue::RowMatrix(rows) => json!(rows),
            ResultValue::KeyedRows(rows) => {
                let mut map = Map::new();
                for (key, cells) in rows {
                    map.insert(key.clone(), json!(cells));
                }
                Value::Object(map)
            }
            ResultValue::KeyedScalars(rows) => {
                let mut map = Map::new();
                for (key, cell) in rows {
                    map.insert(key.clone(), json!(cell));
                }
                Value::Object(map)
            }
        }
    }
}

impl From<Scalar> for ResultValue {
    fn from(s: Scalar) -> Self {
        ResultValue::Scalar(s)
    }
}

impl From<bool> for ResultValue {
    fn from(b: bool) -> Self {
        ResultValue::Scalar(Scalar::Bool(b))
    }
}

impl From<&str> for ResultValue {
    fn from(s: &str) -> Self {
        ResultValue::text(s)
    }
}

impl From<String> for ResultValue {
    fn from(s: String) -> Self {
        ResultValue::text(s)
    }
}
