//! Datasets
//!
//! An immutable, ordered set of named fields. Fields are usually columns
//! (vectors) but may be any [`Value`]. Cloning shares the underlying storage.

use benchdesign_logic::{Lookup, Scalar, Value};
use fxhash::FxHashMap;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors from building or loading a dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Reading the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON with a shape that is not a dataset
    #[error("unsupported dataset layout: {0}")]
    Layout(String),
}

#[derive(Debug, Default)]
struct Fields {
    names: Vec<String>,
    values: FxHashMap<String, Value>,
}

/// Read-only named field set
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    fields: Arc<Fields>,
}

impl Dataset {
    /// Empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs; later duplicates replace earlier ones.
    pub fn from_fields<N, V>(fields: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        fields
            .into_iter()
            .fold(Self::new(), |ds, (name, value)| ds.with_field(name, value))
    }

    /// Dataset with one more field. Replacing a field keeps its position.
    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let mut fields = Arc::try_unwrap(self.fields).unwrap_or_else(|shared| Fields {
            names: shared.names.clone(),
            values: shared.values.clone(),
        });
        if fields.values.insert(name.clone(), value.into()).is_none() {
            fields.names.push(name);
        }
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.values.get(name)
    }

    /// Whether a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.fields.values.contains_key(name)
    }

    /// Field names in insertion order
    pub fn names(&self) -> &[String] {
        &self.fields.names
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.names.len()
    }

    /// Whether the dataset has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.names.is_empty()
    }

    /// Cells of a field, positionally
    pub fn column(&self, name: &str) -> Option<Vec<Scalar>> {
        self.get(name).cloned().and_then(Value::into_cells)
    }

    /// Load a dataset from a JSON file. See [`Dataset::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let root: JsonValue = serde_json::from_str(&text)?;
        Self::from_json(&root)
    }

    /// Build from JSON.
    ///
    /// Accepts either a column-oriented object
    /// (`{"p": [0.01, 0.2], "gene": ["a", "b"]}`) or records
    /// (`[{"p": 0.01, "gene": "a"}, ...]`). In column form an object of
    /// scalars becomes an id-keyed field; in record form absent keys are
    /// missing cells.
    pub fn from_json(root: &JsonValue) -> Result<Self, DatasetError> {
        match root {
            JsonValue::Object(map) => {
                let mut ds = Self::new();
                for (name, field) in map {
                    ds = ds.with_field(name.clone(), json_to_value(name, field)?);
                }
                Ok(ds)
            }
            JsonValue::Array(records) => records_to_dataset(records),
            other => Err(DatasetError::Layout(format!(
                "expected an object or an array of records, got {}",
                json_kind(other)
            ))),
        }
    }
}

impl Lookup for Dataset {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

fn records_to_dataset(records: &[JsonValue]) -> Result<Dataset, DatasetError> {
    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| DatasetError::Layout(format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let mut ds = Dataset::new();
    for name in names {
        let cells = records
            .iter()
            .enumerate()
            .map(|(i, rec)| match rec.get(&name) {
                Some(v) => json_to_scalar(v)
                    .ok_or_else(|| DatasetError::Layout(format!("row {i}, '{name}': nested value"))),
                None => Ok(Scalar::Missing),
            })
            .collect::<Result<Vec<_>, _>>()?;
        ds = ds.with_field(name, Value::Vector(cells));
    }
    Ok(ds)
}

fn json_to_value(name: &str, val: &JsonValue) -> Result<Value, DatasetError> {
    match val {
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(j, v)| {
                json_to_scalar(v)
                    .ok_or_else(|| DatasetError::Layout(format!("{name}[{j}]: nested value")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Vector),
        JsonValue::Object(map) => map
            .iter()
            .map(|(k, v)| {
                json_to_scalar(v)
                    .map(|s| (k.clone(), s))
                    .ok_or_else(|| DatasetError::Layout(format!("{name}.{k}: nested value")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Keyed),
        scalar => json_to_scalar(scalar)
            .map(Value::Scalar)
            .ok_or_else(|| DatasetError::Layout(format!("{name}: unsupported value"))),
    }
}

/// Convert a JSON scalar to a cell; arrays and objects have no cell form.
pub fn json_to_scalar(val: &JsonValue) -> Option<Scalar> {
    match val {
        JsonValue::Null => Some(Scalar::Missing),
        JsonValue::Bool(b) => Some(Scalar::Bool(*b)),
        JsonValue::Number(n) => n.as_f64().map(Scalar::Number),
        JsonValue::String(s) => Some(Scalar::Text(s.clone())),
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn json_kind(val: &JsonValue) -> &'static str {
    match val {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
