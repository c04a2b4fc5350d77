//! `sheetbind-core`: record schemas and value coercion.
//!
//! Pure crate: derives column bindings for record types and converts
//! canonical cell text into typed field values. No spreadsheet I/O.

pub mod coerce;
pub mod date;
pub mod error;
pub mod ids;
pub mod registry;
pub mod schema;
pub mod value;

pub use error::{CoercionError, GenerationError, SchemaError};
pub use ids::{DefaultIdGenerator, IdGenerator};
pub use registry::SchemaRegistry;
pub use schema::{
    Description, DocumentKind, DocumentSpec, FieldBinding, FieldSet, GenerationStrategy,
    SheetRecord, SpreadsheetSchema,
};
pub use value::{CellEnum, EnumType, FieldKind, FieldValue, ValueType};
