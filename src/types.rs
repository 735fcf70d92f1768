// Core data model: cell values, records, datasets, and the field schema
// that maps raw spreadsheet headers onto canonical field names.
use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

/// Label substituted for absent categorical values so filtering and
/// grouping always operate on concrete strings.
pub const MISSING_LABEL: &str = "Unknown";

/// Sentinel offered at the head of every filter candidate list; selecting
/// it leaves the dataset untouched.
pub const ALL_SENTINEL: &str = "ALL";

/// One cell of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Missing,
}

impl Value {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// String form used for filter keys and group keys. Numeric cells are
    /// never used as keys, so they render through `Display` only.
    pub fn label(&self) -> &str {
        match self {
            Value::Str(s) => s.as_str(),
            Value::Missing => MISSING_LABEL,
            Value::Num(_) => "",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Num(n) => write!(f, "{}", n),
            Value::Missing => write!(f, "{}", MISSING_LABEL),
        }
    }
}

/// Declared type of a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Categorical,
    Numeric,
    /// Computed by the pipeline, never read from the source.
    DerivedNumeric,
}

/// One schema entry: which raw header feeds which canonical field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    /// Raw source header. Empty for derived fields.
    #[serde(default)]
    pub raw: String,
    /// Canonical field name used everywhere downstream.
    pub name: String,
    pub kind: FieldKind,
}

/// Validated mapping from raw headers to the canonical field set.
///
/// Construction rejects duplicate canonical names; lookups of fields the
/// schema does not declare surface as [`PipelineError::SchemaMismatch`],
/// which callers raise once at pipeline construction rather than per row.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldDef>) -> Result<Self, PipelineError> {
        let mut index = HashMap::with_capacity(fields.len());
        for (i, def) in fields.iter().enumerate() {
            if index.insert(def.name.clone(), i).is_some() {
                return Err(PipelineError::SchemaMismatch {
                    field: format!("duplicate canonical field `{}`", def.name),
                });
            }
        }
        Ok(FieldSchema { fields, index })
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Index of a field the caller requires; absence is a configuration
    /// error, not a data error.
    pub fn require(&self, name: &str) -> Result<usize, PipelineError> {
        self.field_index(name)
            .ok_or_else(|| PipelineError::SchemaMismatch {
                field: format!("canonical field `{}` is not mapped", name),
            })
    }

}

/// One row of data. Values sit in schema field order; records are
/// immutable once the cleaning and derivation stages have produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Record { values }
    }

    pub fn get(&self, idx: usize) -> &Value {
        &self.values[idx]
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// An ordered sequence of records sharing one schema. Every record exposes
/// the full canonical field set; absent source columns appear as
/// [`Value::Missing`], never as a shorter row.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub schema: Arc<FieldSchema>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(schema: Arc<FieldSchema>, records: Vec<Record>) -> Self {
        Dataset { schema, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cell lookup by row number and canonical field name.
    pub fn value(&self, row: usize, field: &str) -> Option<&Value> {
        let idx = self.schema.field_index(field)?;
        self.records.get(row).map(|r| r.get(idx))
    }
}

/// Errors raised by the fetch stage. The kinds are deliberately distinct
/// so the caller can tell "file missing / host unreachable" apart from a
/// transport failure or a response that is not a table at all.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source not found or unreachable: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Fatal pipeline errors. Each render cycle is all-or-nothing: none of
/// these leave partial output behind. Recoverable conditions (unparseable
/// numeric cells) are absorbed by the cleaner and never surface here. An
/// empty post-filter dataset is an ordinary empty state, not an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] FetchError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("schema mismatch: {field}")]
    SchemaMismatch { field: String },
}
