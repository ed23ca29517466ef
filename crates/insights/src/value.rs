//! Typed cell values.

use crate::schema::ColumnKind;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A single dataset cell.
///
/// Values have a total order used for grouping and sorting: nulls first,
/// then booleans, then numbers (integers and floats compared numerically),
/// then text (lexicographic).
#[derive(Debug, Clone)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Convert a JSON value into a cell of `kind`, or `None` if the JSON
    /// value has the wrong type. JSON `null` is always accepted.
    pub fn from_json(value: &serde_json::Value, kind: ColumnKind) -> Option<Self> {
        use serde_json::Value;
        match (value, kind) {
            (Value::Null, _) => Some(CellValue::Null),
            (Value::String(s), ColumnKind::Text) => Some(CellValue::Text(s.clone())),
            (Value::Bool(b), ColumnKind::Boolean) => Some(CellValue::Bool(*b)),
            (Value::Number(n), ColumnKind::Integer) => n.as_i64().map(CellValue::Int),
            (Value::Number(n), ColumnKind::Float) => n.as_f64().map(CellValue::Float),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Bool(_) => 1,
            CellValue::Int(_) | CellValue::Float(_) => 2,
            CellValue::Text(_) => 3,
        }
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.type_rank().cmp(&b.type_rank()),
            },
        }
    }
}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Int(i) => serializer.serialize_i64(*i),
            CellValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            CellValue::Float(_) => serializer.serialize_none(),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str(""),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{:.1}", x),
            CellValue::Float(x) => write!(f, "{:.2}", x),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}
