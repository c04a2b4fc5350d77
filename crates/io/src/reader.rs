// Record import from xls and xlsx documents
//
// Only the first sheet is read. The header row sits at row 0, or directly
// after the declared description block. Rows above it are ignored, and
// every later non-blank row becomes one record.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use calamine::{Reader, Xls, Xlsx};
use log::{debug, warn};
use sheetbind_config::ReaderSettings;
use sheetbind_core::date::DEFAULT_PATTERN;
use sheetbind_core::{
    ids, DocumentKind, GenerationError, IdGenerator, SchemaRegistry, SheetRecord,
    SpreadsheetSchema, ValueType,
};

use crate::cell::RawCell;
use crate::error::SheetError;
use crate::source::{EagerRows, PositionedCell, RowSource, SheetRow, StreamingRows};

/// Reads documents into records of type `R`.
pub struct SheetReader<R: SheetRecord> {
    schema: Arc<SpreadsheetSchema<R>>,
    generator: Option<Arc<dyn IdGenerator>>,
    settings: ReaderSettings,
}

impl<R: SheetRecord> SheetReader<R> {
    /// Reader backed by the process-wide schema registry.
    pub fn new() -> Result<Self, SheetError> {
        Self::with_registry(SchemaRegistry::global())
    }

    pub fn with_registry(registry: &SchemaRegistry) -> Result<Self, SheetError> {
        Ok(Self {
            schema: registry.schema::<R>()?,
            generator: None,
            settings: ReaderSettings::default(),
        })
    }

    /// Identifier source for generated columns.
    pub fn with_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_settings(mut self, settings: ReaderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn schema(&self) -> &SpreadsheetSchema<R> {
        &self.schema
    }

    /// Open `handle` as a document of the schema's declared kind.
    pub fn open<RS: Read + Seek>(&self, handle: RS) -> Result<Document<RS>, SheetError> {
        let spec = self.schema.document();
        let row_cache_size = self.settings.row_cache_size.unwrap_or(spec.row_cache_size);
        let buffer_size = self.settings.buffer_size.unwrap_or(spec.buffer_size);
        Document::open(handle, spec.kind, row_cache_size, buffer_size)
    }

    /// Read every record of the first sheet.
    ///
    /// Fails on the first cell that cannot be coerced; no partial result is
    /// returned.
    pub fn read<RS: Read + Seek>(&self, handle: RS) -> Result<Vec<R>, SheetError> {
        let mut document = self.open(handle)?;
        let records: Result<Vec<R>, SheetError> = document.records(self)?.collect();
        let records = records?;
        debug!(
            "read {} {} record(s) from sheet '{}'",
            records.len(),
            self.schema.record_name(),
            document.sheet_name()
        );
        Ok(records)
    }

    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<Vec<R>, SheetError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SheetError::open(self.schema.kind(), format!("{}: {e}", path.display())))?;
        self.read(file)
    }

    fn normalize_pattern(&self, value_type: &ValueType, field_pattern: Option<&str>) -> String {
        // Native date cells feed date fields in the pattern the field parses.
        match value_type {
            ValueType::Date => field_pattern.unwrap_or(DEFAULT_PATTERN).to_string(),
            _ => self.settings.date_pattern.clone(),
        }
    }
}

enum Workbook<RS: Read + Seek> {
    Legacy(Xls<RS>),
    Streaming(Xlsx<BufReader<RS>>),
}

/// An open document. The underlying handle is released on drop.
pub struct Document<RS: Read + Seek> {
    kind: DocumentKind,
    sheet: String,
    workbook: Workbook<RS>,
    row_cache_size: usize,
}

impl<RS: Read + Seek> Document<RS> {
    pub fn open(
        handle: RS,
        kind: DocumentKind,
        row_cache_size: usize,
        buffer_size: usize,
    ) -> Result<Self, SheetError> {
        let workbook = match kind {
            DocumentKind::Xls => {
                Workbook::Legacy(Xls::new(handle).map_err(|e| SheetError::open(kind, e))?)
            }
            DocumentKind::Xlsx => {
                let buffered = BufReader::with_capacity(buffer_size.max(1), handle);
                Workbook::Streaming(Xlsx::new(buffered).map_err(|e| SheetError::open(kind, e))?)
            }
        };
        let sheet = match &workbook {
            Workbook::Legacy(wb) => wb.sheet_names().first().cloned(),
            Workbook::Streaming(wb) => wb.sheet_names().first().cloned(),
        }
        .ok_or_else(|| SheetError::open(kind, "document has no sheets"))?;
        Ok(Self { kind, sheet, workbook, row_cache_size })
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Name of the first sheet, the only one read.
    pub fn sheet_name(&self) -> &str {
        &self.sheet
    }

    /// Non-blank rows of the first sheet, in order.
    pub fn rows(&mut self) -> Result<Box<dyn RowSource + '_>, SheetError> {
        let kind = self.kind;
        let sheet = &self.sheet;
        match &mut self.workbook {
            Workbook::Legacy(wb) => {
                let values = wb.worksheet_range(sheet).map_err(|e| SheetError::open(kind, e))?;
                let formulas = match wb.worksheet_formula(sheet) {
                    Ok(formulas) => Some(formulas),
                    Err(e) => {
                        debug!("no formula text for sheet '{sheet}': {e}");
                        None
                    }
                };
                Ok(Box::new(EagerRows::new(values, formulas)))
            }
            Workbook::Streaming(wb) => {
                let formulas = streaming_formulas(wb, sheet).map_err(|e| SheetError::open(kind, e))?;
                let mut cells = wb
                    .worksheet_cells_reader(sheet)
                    .map_err(|e| SheetError::open(kind, e))?;
                let next_cell = move || -> Result<Option<PositionedCell>, SheetError> {
                    let cell = cells.next_cell().map_err(|e| SheetError::open(kind, e))?;
                    Ok(cell.map(|cell| {
                        let (row, col) = cell.get_position();
                        (row, col, RawCell::from(cell.get_value()))
                    }))
                };
                Ok(Box::new(StreamingRows::new(next_cell, formulas, self.row_cache_size)))
            }
        }
    }

    /// Lazily materialize records of type `R`.
    ///
    /// The header row is resolved up front. The iterator stops after
    /// yielding its first error.
    pub fn records<'a, R: SheetRecord>(
        &'a mut self,
        reader: &SheetReader<R>,
    ) -> Result<Records<'a, R>, SheetError> {
        let header_row = reader.schema.header_row();
        let (kind, sheet) = (self.kind, self.sheet.clone());
        let mut rows = self.rows()?;
        let header = loop {
            match rows.next_row()? {
                Some(row) if row.index < header_row => continue,
                Some(row) if row.index == header_row => {
                    break HeaderBinding::resolve(&row, &reader.schema);
                }
                Some(row) => {
                    return Err(SheetError::open(
                        kind,
                        format!(
                            "header row {} of sheet '{}' is missing; first data row is {}",
                            header_row + 1,
                            sheet,
                            row.index + 1
                        ),
                    ));
                }
                // nothing at or after the header row: an empty document
                None => break HeaderBinding::default(),
            }
        };

        if reader.generator.is_none() {
            if let Some(column) = header.generated(&reader.schema).next() {
                return Err(GenerationError::NoGenerator { field: column.to_string() }.into());
            }
        }

        let patterns = header
            .positions
            .iter()
            .map(|slot| {
                slot.map(|idx| {
                    let binding = &reader.schema.bindings()[idx];
                    reader.normalize_pattern(&binding.value_type(), binding.pattern())
                })
            })
            .collect();

        Ok(Records {
            rows,
            header,
            patterns,
            schema: Arc::clone(&reader.schema),
            generator: reader.generator.clone(),
            done: false,
        })
    }
}

fn streaming_formulas<RS: Read + Seek>(
    wb: &mut Xlsx<RS>,
    sheet: &str,
) -> Result<HashMap<(u32, u32), String>, calamine::XlsxError> {
    let mut formulas = HashMap::new();
    let mut cells = wb.worksheet_cells_reader(sheet)?;
    while let Some(cell) = cells.next_formula()? {
        if !cell.get_value().is_empty() {
            formulas.insert(cell.get_position(), cell.get_value().clone());
        }
    }
    Ok(formulas)
}

/// Column position to binding index, resolved from the header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderBinding {
    positions: Vec<Option<usize>>,
}

impl HeaderBinding {
    pub fn resolve<R: SheetRecord>(row: &SheetRow, schema: &SpreadsheetSchema<R>) -> Self {
        let positions = row
            .cells
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                let name = cell.normalize(DEFAULT_PATTERN);
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let idx = schema.position(name);
                if idx.is_none() {
                    warn!("column {} '{name}' is not bound on {}", col + 1, schema.record_name());
                }
                idx
            })
            .collect();
        Self { positions }
    }

    /// Binding index for the column at `col`, if any.
    pub fn binding_at(&self, col: usize) -> Option<usize> {
        self.positions.get(col).copied().flatten()
    }

    pub fn bound_count(&self) -> usize {
        self.positions.iter().flatten().count()
    }

    fn bound(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.positions
            .iter()
            .enumerate()
            .filter_map(|(col, slot)| slot.map(|idx| (col, idx)))
    }

    fn generated<'s, R: SheetRecord>(
        &'s self,
        schema: &'s SpreadsheetSchema<R>,
    ) -> impl Iterator<Item = &'s str> + 's {
        self.bound()
            .map(move |(_, idx)| &schema.bindings()[idx])
            .filter(|binding| binding.is_generated())
            .map(|binding| binding.column())
    }
}

/// Records materialized one row at a time.
pub struct Records<'a, R: SheetRecord> {
    rows: Box<dyn RowSource + 'a>,
    header: HeaderBinding,
    patterns: Vec<Option<String>>,
    schema: Arc<SpreadsheetSchema<R>>,
    generator: Option<Arc<dyn IdGenerator>>,
    done: bool,
}

impl<R: SheetRecord> Records<'_, R> {
    pub fn header(&self) -> &HeaderBinding {
        &self.header
    }

    fn materialize(&self, row: &SheetRow) -> Result<R, SheetError> {
        let mut record = R::default();
        for (col, idx) in self.header.bound() {
            let binding = &self.schema.bindings()[idx];
            if binding.is_generated() {
                let generator = self.generator.as_deref().ok_or_else(|| {
                    GenerationError::NoGenerator { field: binding.column().to_string() }
                })?;
                let value_type = binding.value_type();
                if let Some(value) =
                    ids::generate(generator, binding.strategy(), &value_type, binding.column())?
                {
                    if !binding.set(&mut record, value) {
                        return Err(GenerationError::Incompatible {
                            field: binding.column().to_string(),
                            strategy: binding.strategy(),
                            value_type: value_type.to_string(),
                        }
                        .into());
                    }
                }
                continue;
            }
            let pattern = self.patterns[col].as_deref().unwrap_or(DEFAULT_PATTERN);
            let raw = row.cell(col).normalize(pattern);
            binding
                .assign(&mut record, &raw)
                .map_err(|source| SheetError::Coercion { row: row.index, source })?;
        }
        Ok(record)
    }
}

impl<R: SheetRecord> Iterator for Records<'_, R> {
    type Item = Result<R, SheetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.rows.next_row() {
            Ok(Some(row)) => self.materialize(&row),
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
