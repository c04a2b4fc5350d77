// Record schemas: document-level metadata plus the ordered column -> field
// bindings derived from a `SheetRecord` declaration.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coerce;
use crate::error::{CoercionError, SchemaError};
use crate::value::{CellEnum, EnumType, FieldKind, FieldValue, ValueType};

// ---------------------------------------------------------------------------
// Document metadata
// ---------------------------------------------------------------------------

/// Spreadsheet container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Legacy binary workbook (BIFF8), loaded eagerly.
    #[default]
    Xls,
    /// Zip/XML workbook, read with a forward-only row stream.
    Xlsx,
}

impl DocumentKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xls => ".xls",
            Self::Xlsx => ".xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Xls => "application/vnd.ms-excel",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xls => write!(f, "xls"),
            Self::Xlsx => write!(f, "xlsx"),
        }
    }
}

/// Free-form block above the header row.
///
/// `last_row` is the zero-based index of the block's final row; the header
/// row follows immediately after it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Description {
    #[serde(default)]
    pub text: String,
    pub last_row: u32,
}

/// Document-level declaration of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentSpec {
    /// Export file name, without extension
    pub name: String,
    pub kind: DocumentKind,
    pub description: Option<Description>,
    /// Rows read ahead by the streaming reader
    pub row_cache_size: usize,
    /// Input buffer size of the streaming reader, in bytes
    pub buffer_size: usize,
}

impl Default for DocumentSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: DocumentKind::Xls,
            description: None,
            row_cache_size: 100,
            buffer_size: 2048,
        }
    }
}

impl DocumentSpec {
    pub fn new(kind: DocumentKind) -> Self {
        Self { kind, ..Default::default() }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, text: impl Into<String>, last_row: u32) -> Self {
        self.description = Some(Description { text: text.into(), last_row });
        self
    }

    pub fn with_tuning(mut self, row_cache_size: usize, buffer_size: usize) -> Self {
        self.row_cache_size = row_cache_size;
        self.buffer_size = buffer_size;
        self
    }

    /// Zero-based index of the header row.
    pub fn header_row(&self) -> u32 {
        match &self.description {
            Some(d) if !d.text.is_empty() => d.last_row + 1,
            _ => 0,
        }
    }

    /// Parse a declaration from TOML, e.g. a per-record config file.
    pub fn from_toml(input: &str) -> Result<Self, SchemaError> {
        toml::from_str(input).map_err(|e| SchemaError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Field bindings
// ---------------------------------------------------------------------------

/// How a field's value is produced instead of reading its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    #[default]
    None,
    Uuid,
    SequenceId,
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Uuid => write!(f, "uuid"),
            Self::SequenceId => write!(f, "sequence id"),
        }
    }
}

type Getter<R> = Arc<dyn Fn(&R) -> Option<FieldValue> + Send + Sync>;
type Setter<R> = Arc<dyn Fn(&mut R, FieldValue) -> bool + Send + Sync>;

/// Association between a column name and a field of `R`.
pub struct FieldBinding<R> {
    column: String,
    value_type: ValueType,
    pattern: Option<String>,
    strategy: GenerationStrategy,
    get: Getter<R>,
    set: Setter<R>,
}

impl<R> Clone for FieldBinding<R> {
    fn clone(&self) -> Self {
        Self {
            column: self.column.clone(),
            value_type: self.value_type,
            pattern: self.pattern.clone(),
            strategy: self.strategy,
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<R> fmt::Debug for FieldBinding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("column", &self.column)
            .field("value_type", &self.value_type)
            .field("pattern", &self.pattern)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl<R: 'static> FieldBinding<R> {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn strategy(&self) -> GenerationStrategy {
        self.strategy
    }

    pub fn is_generated(&self) -> bool {
        self.strategy != GenerationStrategy::None
    }

    /// Date pattern used for parsing and exporting this field.
    pub fn date_pattern<'a>(&'a self, default: &'a str) -> &'a str {
        self.pattern.as_deref().unwrap_or(default)
    }

    pub fn with_pattern(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn generated(&mut self, strategy: GenerationStrategy) -> &mut Self {
        self.strategy = strategy;
        self
    }

    pub fn get(&self, record: &R) -> Option<FieldValue> {
        (self.get)(record)
    }

    /// Store `value`; `false` if the value's variant does not fit the field.
    pub fn set(&self, record: &mut R, value: FieldValue) -> bool {
        (self.set)(record, value)
    }

    /// Coerce canonical cell text and store it. Blank text on a non-text
    /// field leaves the field untouched.
    pub fn assign(&self, record: &mut R, raw: &str) -> Result<(), CoercionError> {
        let coerced = coerce::coerce(raw, &self.value_type, self.pattern.as_deref())
            .map_err(|reason| CoercionError::new(&self.column, raw, self.value_type, reason))?;
        match coerced {
            Some(value) => {
                if self.set(record, value) {
                    Ok(())
                } else {
                    Err(CoercionError::new(
                        &self.column,
                        raw,
                        self.value_type,
                        "field rejected the coerced value",
                    ))
                }
            }
            None => Ok(()),
        }
    }

    /// Exported string form, `None` for an unset optional field.
    pub fn export(&self, record: &R, default_date_pattern: &str) -> Option<String> {
        self.get(record)
            .map(|value| value.export_string(self.date_pattern(default_date_pattern)))
    }

    /// Re-target this binding at a parent record embedded in `C`.
    fn lift<C: 'static>(self, get: fn(&C) -> &R, get_mut: fn(&mut C) -> &mut R) -> FieldBinding<C> {
        let inner_get = self.get;
        let inner_set = self.set;
        FieldBinding {
            column: self.column,
            value_type: self.value_type,
            pattern: self.pattern,
            strategy: self.strategy,
            get: Arc::new(move |record: &C| inner_get(get(record))),
            set: Arc::new(move |record: &mut C, value| inner_set(get_mut(record), value)),
        }
    }
}

/// Collects the bindings a record type declares.
pub struct FieldSet<R> {
    record: &'static str,
    own: Vec<FieldBinding<R>>,
    inherited: Vec<FieldBinding<R>>,
    error: Option<SchemaError>,
}

impl<R: SheetRecord> FieldSet<R> {
    fn new() -> Self {
        Self {
            record: std::any::type_name::<R>(),
            own: Vec::new(),
            inherited: Vec::new(),
            error: None,
        }
    }

    /// Bind `column` to a field whose Rust type determines the value type.
    pub fn field<F: FieldKind>(
        &mut self,
        column: &str,
        get: fn(&R) -> &F,
        get_mut: fn(&mut R) -> &mut F,
    ) -> &mut FieldBinding<R> {
        self.push(FieldBinding {
            column: column.to_string(),
            value_type: F::value_type(),
            pattern: None,
            strategy: GenerationStrategy::None,
            get: Arc::new(move |record: &R| get(record).to_value()),
            set: Arc::new(move |record: &mut R, value| match F::from_value(value) {
                Some(v) => {
                    *get_mut(record) = v;
                    true
                }
                None => false,
            }),
        })
    }

    /// Bind `column` to an enumeration field.
    pub fn enumeration<E: CellEnum>(
        &mut self,
        column: &str,
        get: fn(&R) -> &E,
        get_mut: fn(&mut R) -> &mut E,
    ) -> &mut FieldBinding<R> {
        self.push(FieldBinding {
            column: column.to_string(),
            value_type: ValueType::Enumeration(EnumType::of::<E>()),
            pattern: None,
            strategy: GenerationStrategy::None,
            get: Arc::new(move |record: &R| Some(FieldValue::Enum(get(record).canonical()))),
            set: Arc::new(move |record: &mut R, value| match value {
                FieldValue::Enum(name) => match E::from_canonical(name) {
                    Some(member) => {
                        *get_mut(record) = member;
                        true
                    }
                    None => false,
                },
                _ => false,
            }),
        })
    }

    /// Merge the bindings of an embedded parent record. Columns declared
    /// directly on `R` win over inherited ones.
    pub fn inherit<P: SheetRecord>(&mut self, get: fn(&R) -> &P, get_mut: fn(&mut R) -> &mut P) -> &mut Self {
        match collect::<P>() {
            Ok(parent) => self
                .inherited
                .extend(parent.into_iter().map(|binding| binding.lift(get, get_mut))),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    fn push(&mut self, binding: FieldBinding<R>) -> &mut FieldBinding<R> {
        self.own.push(binding);
        let last = self.own.len() - 1;
        &mut self.own[last]
    }
}

/// A record type that maps to spreadsheet rows.
pub trait SheetRecord: Default + 'static {
    /// Document-level declaration; `None` means the type cannot be mapped.
    fn document() -> Option<DocumentSpec> {
        None
    }

    fn fields(fields: &mut FieldSet<Self>);
}

fn collect<R: SheetRecord>() -> Result<Vec<FieldBinding<R>>, SchemaError> {
    let mut set = FieldSet::<R>::new();
    R::fields(&mut set);
    if let Some(e) = set.error {
        return Err(e);
    }

    let mut seen = HashSet::new();
    let mut bindings = Vec::with_capacity(set.own.len() + set.inherited.len());
    for binding in set.own {
        if !seen.insert(binding.column.clone()) {
            return Err(SchemaError::DuplicateColumn {
                record: set.record,
                column: binding.column,
            });
        }
        bindings.push(binding);
    }
    for binding in set.inherited {
        if seen.insert(binding.column.clone()) {
            bindings.push(binding);
        } else {
            log::debug!("{}: inherited column '{}' is shadowed", set.record, binding.column);
        }
    }
    Ok(bindings)
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Immutable, reusable mapping for one record type.
pub struct SpreadsheetSchema<R> {
    record: &'static str,
    document: DocumentSpec,
    bindings: Vec<FieldBinding<R>>,
    columns: HashMap<String, usize>,
}

impl<R: SheetRecord> SpreadsheetSchema<R> {
    /// Derive the schema from `R`'s declaration. Pure; prefer
    /// [`crate::SchemaRegistry::schema`] which memoizes the result.
    pub fn derive() -> Result<Self, SchemaError> {
        let record = std::any::type_name::<R>();
        let document = R::document().ok_or(SchemaError::MissingDocument { record })?;
        let bindings = collect::<R>()?;
        let columns = bindings
            .iter()
            .enumerate()
            .map(|(idx, binding)| (binding.column.clone(), idx))
            .collect();
        Ok(Self { record, document, bindings, columns })
    }

    pub fn record_name(&self) -> &'static str {
        self.record
    }

    pub fn document(&self) -> &DocumentSpec {
        &self.document
    }

    pub fn kind(&self) -> DocumentKind {
        self.document.kind
    }

    pub fn header_row(&self) -> u32 {
        self.document.header_row()
    }

    /// Bindings in column order.
    pub fn bindings(&self) -> &[FieldBinding<R>] {
        &self.bindings
    }

    pub fn binding(&self, column: &str) -> Option<&FieldBinding<R>> {
        self.position(column).map(|idx| &self.bindings[idx])
    }

    /// Index into [`Self::bindings`] of the binding for `column`.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.get(column).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.column.as_str())
    }
}

impl<R> fmt::Debug for SpreadsheetSchema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpreadsheetSchema")
            .field("record", &self.record)
            .field("document", &self.document)
            .field("bindings", &self.bindings)
            .finish()
    }
}
