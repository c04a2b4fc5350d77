use std::fmt;

use crate::schema::GenerationStrategy;
use crate::value::ValueType;

/// A record type cannot be turned into a usable schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The record type declares no document metadata.
    MissingDocument { record: &'static str },
    /// Two fields at the same declaration level claim the same column.
    DuplicateColumn { record: &'static str, column: String },
    /// Document metadata could not be parsed from its TOML source.
    Parse(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDocument { record } => {
                write!(f, "record type '{record}' has no document declaration")
            }
            Self::DuplicateColumn { record, column } => {
                write!(f, "record type '{record}': column '{column}' is bound twice")
            }
            Self::Parse(msg) => write!(f, "document declaration parse error: {msg}"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// A cell's canonical text cannot be converted to its field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionError {
    pub field: String,
    pub raw: String,
    pub value_type: ValueType,
    pub reason: String,
}

impl CoercionError {
    pub fn new(field: impl Into<String>, raw: impl Into<String>, value_type: ValueType, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            raw: raw.into(),
            value_type,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': cannot convert '{}' to {}: {}",
            self.field, self.raw, self.value_type, self.reason
        )
    }
}

impl std::error::Error for CoercionError {}

/// The identifier generator failed or produced a value the field cannot hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// A generated column is bound but the reader has no generator.
    NoGenerator { field: String },
    /// The generated identifier does not fit the field's declared type.
    Incompatible { field: String, strategy: GenerationStrategy, value_type: String },
    /// The generator itself failed.
    Failed(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoGenerator { field } => {
                write!(f, "field '{field}' is generated but no identifier generator is configured")
            }
            Self::Incompatible { field, strategy, value_type } => {
                write!(f, "field '{field}': {strategy} identifiers cannot be stored as {value_type}")
            }
            Self::Failed(msg) => write!(f, "identifier generation failed: {msg}"),
        }
    }
}

impl std::error::Error for GenerationError {}
