use std::fmt;

use sheetbind_core::{CoercionError, DocumentKind, GenerationError, SchemaError};

/// Everything that can go wrong while reading or writing a document.
#[derive(Debug)]
pub enum SheetError {
    /// The record type has no usable schema.
    Schema(SchemaError),
    /// The input is unreadable, or is not a document of the declared kind.
    DocumentOpen { kind: DocumentKind, message: String },
    /// A cell could not be converted to its field's type.
    Coercion { row: u32, source: CoercionError },
    /// A generated field could not be populated.
    Generation(GenerationError),
    /// Output could not be produced.
    Write(String),
    /// A stream or sink could not be released.
    Resource(String),
}

impl SheetError {
    pub(crate) fn open(kind: DocumentKind, err: impl fmt::Display) -> Self {
        Self::DocumentOpen { kind, message: err.to_string() }
    }

    pub(crate) fn write(err: impl fmt::Display) -> Self {
        Self::Write(err.to_string())
    }
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::DocumentOpen { kind, message } => {
                write!(f, "cannot open {kind} document: {message}")
            }
            Self::Coercion { row, source } => write!(f, "row {}: {source}", row + 1),
            Self::Generation(e) => write!(f, "generation error: {e}"),
            Self::Write(msg) => write!(f, "write error: {msg}"),
            Self::Resource(msg) => write!(f, "resource error: {msg}"),
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Schema(e) => Some(e),
            Self::Coercion { source, .. } => Some(source),
            Self::Generation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchemaError> for SheetError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}

impl From<GenerationError> for SheetError {
    fn from(e: GenerationError) -> Self {
        Self::Generation(e)
    }
}
