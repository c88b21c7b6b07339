//! Runtime Values
//!
//! Everything a deferred expression can resolve to: single cells, positional
//! vectors, id-keyed vectors and callables.

use crate::callable::Callable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell.
///
/// Serializes untagged, so `Missing` becomes JSON `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Missing-value marker
    #[default]
    Missing,
    /// Logical value
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
}

impl Scalar {
    /// Whether this cell is the missing-value marker
    pub fn is_missing(&self) -> bool {
        matches!(self, Scalar::Missing)
    }

    /// Numeric view of the cell. Logicals map to 0/1, text has none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) => Some(*v),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Missing | Scalar::Text(_) => None,
        }
    }

    /// Render the cell as a row identifier. Missing cells have no id.
    pub fn to_id(&self) -> Option<String> {
        match self {
            Scalar::Missing => None,
            Scalar::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Scalar::Missing => "missing",
            Scalar::Bool(_) => "bool",
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "text",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Missing => write!(f, "NA"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(v) => write!(f, "{v}"),
            Scalar::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Number(v as f64)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
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

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Missing)
    }
}

/// A resolved value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// One cell
    Scalar(Scalar),
    /// Positional vector
    Vector(Vec<Scalar>),
    /// Id-keyed vector, in reported order
    Keyed(Vec<(String, Scalar)>),
    /// A callable
    Function(Callable),
}

impl Value {
    /// The missing value
    pub fn missing() -> Self {
        Value::Scalar(Scalar::Missing)
    }

    /// Numeric vector
    pub fn numbers(values: impl IntoIterator<Item = f64>) -> Self {
        Value::Vector(values.into_iter().map(Scalar::Number).collect())
    }

    /// Text vector
    pub fn texts<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Value::Vector(values.into_iter().map(|s| Scalar::Text(s.into())).collect())
    }

    /// Id-keyed numeric vector
    pub fn keyed<K: Into<String>>(entries: impl IntoIterator<Item = (K, f64)>) -> Self {
        Value::Keyed(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Scalar::Number(v)))
                .collect(),
        )
    }

    /// Number of cells (callables and scalars count as one)
    pub fn len(&self) -> usize {
        match self {
            Value::Vector(v) => v.len(),
            Value::Keyed(v) => v.len(),
            Value::Scalar(_) | Value::Function(_) => 1,
        }
    }

    /// Whether the value holds no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short type name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(s) => s.type_name(),
            Value::Vector(_) => "vector",
            Value::Keyed(_) => "keyed vector",
            Value::Function(_) => "function",
        }
    }

    /// Borrow the callable, if this is one
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Function(c) => Some(c),
            _ => None,
        }
    }

    /// Numeric view; missing and non-numeric cells become NaN.
    pub fn to_numbers(&self) -> Option<Vec<f64>> {
        let cells: Vec<&Scalar> = match self {
            Value::Scalar(s) => vec![s],
            Value::Vector(v) => v.iter().collect(),
            Value::Keyed(v) => v.iter().map(|(_, s)| s).collect(),
            Value::Function(_) => return None,
        };
        Some(
            cells
                .into_iter()
                .map(|s| s.as_f64().unwrap_or(f64::NAN))
                .collect(),
        )
    }

    /// Positional cells. Keyed vectors drop their ids; callables have no cells.
    pub fn into_cells(self) -> Option<Vec<Scalar>> {
        match self {
            Value::Scalar(s) => Some(vec![s]),
            Value::Vector(v) => Some(v),
            Value::Keyed(v) => Some(v.into_iter().map(|(_, s)| s).collect()),
            Value::Function(_) => None,
        }
    }

    /// Id-keyed cells. Only keyed vectors qualify.
    pub fn into_keyed(self) -> Option<Vec<(String, Scalar)>> {
        match self {
            Value::Keyed(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::Vector(v) => {
                let items: Vec<String> = v.iter().map(|s| s.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Keyed(v) => {
                let items: Vec<String> = v.iter().map(|(k, s)| format!("{k}: {s}")).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Value::Function(c) => write!(f, "{}", c.source_text()),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Number(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(Scalar::Number(v as f64))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::Text(s.to_string()))
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::numbers(v)
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(v: Vec<Scalar>) -> Self {
        Value::Vector(v)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Value::Function(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_render_integral_numbers_without_fraction() {
        assert_eq!(Scalar::Number(3.0).to_id().as_deref(), Some("3"));
        assert_eq!(Scalar::from("g1").to_id().as_deref(), Some("g1"));
        assert_eq!(Scalar::Missing.to_id(), None);
    }

    #[test]
    fn test_missing_serializes_as_null() {
        let cells = vec![Scalar::Number(1.5), Scalar::Missing, Scalar::from("a")];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[1.5,null,"a"]"#);
        let back: Vec<Scalar> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }

    #[test]
    fn test_keyed_cells_drop_ids_positionally() {
        let v = Value::keyed([("g1", 1.0), ("g2", 2.0)]);
        assert_eq!(
            v.clone().into_cells().unwrap(),
            vec![Scalar::Number(1.0), Scalar::Number(2.0)]
        );
        assert_eq!(v.into_keyed().unwrap()[1].0, "g2");
        assert!(Value::numbers([1.0]).into_keyed().is_none());
    }
}
