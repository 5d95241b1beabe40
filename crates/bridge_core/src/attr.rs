//! Tagged attribute values
//!
//! The shape of a leaf value is decided once, when it enters the system,
//! and carried through to the document as an [`AttrValue`]. Newly created
//! attributes take their [`AttrType`] from that tag; existing attributes
//! keep their declared type and the value is coerced into it.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// 4x4 matrix, row-major as written in the textual literal form
pub type Matrix4 = [[f64; 4]; 4];

/// Declared type of a document attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrType {
    String,
    Bool,
    Int,
    Double,
    Matrix4d,
    StringArray,
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Number(f64),
    String(String),
    Matrix(Matrix4),
    StringList(Vec<String>),
}

impl AttrValue {
    /// Classify a payload leaf.
    ///
    /// Strings holding a 4x4 array literal become matrices, booleans stay
    /// booleans, numbers become doubles. Non-matrix arrays are kept as their
    /// JSON text. Nulls and objects have no attribute representation.
    pub fn from_payload(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Object(_) => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(i) => Some(Self::Number(*i as f64)),
            Value::Float(f) => Some(Self::Number(*f)),
            Value::String(s) => Some(parse_matrix(s).map(Self::Matrix).unwrap_or_else(|| Self::String(s.clone()))),
            Value::Array(items) => match matrix_from_values(items) {
                Some(m) => Some(Self::Matrix(m)),
                None => serde_json::to_string(value).ok().map(Self::String),
            },
        }
    }

    /// The attribute type a new attribute holding this value gets
    pub fn inferred_type(&self) -> AttrType {
        match self {
            Self::Bool(_) => AttrType::Bool,
            Self::Int(_) => AttrType::Int,
            Self::Number(_) => AttrType::Double,
            Self::String(_) => AttrType::String,
            Self::Matrix(_) => AttrType::Matrix4d,
            Self::StringList(_) => AttrType::StringArray,
        }
    }

    /// Convert into a value storable in an attribute of type `ty`.
    ///
    /// Returns the original value back when no lossless conversion exists.
    pub fn coerce_to(self, ty: AttrType) -> Result<Self, Self> {
        match (ty, self) {
            (AttrType::Bool, v @ Self::Bool(_)) => Ok(v),
            (AttrType::Int, v @ Self::Int(_)) => Ok(v),
            (AttrType::Int, Self::Number(n)) if n.fract() == 0.0 && n.is_finite() => Ok(Self::Int(n as i64)),
            (AttrType::Double, v @ Self::Number(_)) => Ok(v),
            (AttrType::Double, Self::Int(i)) => Ok(Self::Number(i as f64)),
            (AttrType::String, v @ Self::String(_)) => Ok(v),
            (AttrType::String, Self::Matrix(m)) => Ok(Self::String(format_matrix(&m))),
            (AttrType::Matrix4d, v @ Self::Matrix(_)) => Ok(v),
            (AttrType::Matrix4d, Self::String(s)) => match parse_matrix(&s) {
                Some(m) => Ok(Self::Matrix(m)),
                None => Err(Self::String(s)),
            },
            (AttrType::StringArray, v @ Self::StringList(_)) => Ok(v),
            (_, other) => Err(other),
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Matrix(_) => "matrix",
            Self::StringList(_) => "string list",
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringList(v)
    }
}

impl From<Matrix4> for AttrValue {
    fn from(v: Matrix4) -> Self {
        Self::Matrix(v)
    }
}

/// Parse a textual 4x4 array literal.
///
/// Accepts both bracket (`[[1, 0, 0, 0], ...]`) and tuple
/// (`((1, 0, 0, 0), ...)`) spellings.
pub fn parse_matrix(text: &str) -> Option<Matrix4> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('[') || trimmed.starts_with('(')) {
        return None;
    }
    let normalized: String = trimmed
        .chars()
        .map(|c| match c {
            '(' => '[',
            ')' => ']',
            other => other,
        })
        .collect();
    let rows: Vec<Vec<f64>> = serde_json::from_str(&normalized).ok()?;
    matrix_from_rows(&rows)
}

/// Render a matrix in the bracket literal form accepted by [`parse_matrix`]
pub fn format_matrix(m: &Matrix4) -> String {
    let rows: Vec<String> = m
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            format!("[{}]", cells.join(", "))
        })
        .collect();
    format!("[{}]", rows.join(", "))
}

fn matrix_from_values(items: &[Value]) -> Option<Matrix4> {
    let rows = items
        .iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(Value::as_float).collect::<Option<Vec<f64>>>(),
            _ => None,
        })
        .collect::<Option<Vec<Vec<f64>>>>()?;
    matrix_from_rows(&rows)
}

fn matrix_from_rows(rows: &[Vec<f64>]) -> Option<Matrix4> {
    if rows.len() != 4 || rows.iter().any(|r| r.len() != 4) {
        return None;
    }
    let mut m = [[0.0; 4]; 4];
    for (i, row) in rows.iter().enumerate() {
        m[i].copy_from_slice(row);
    }
    Some(m)
}
