// Batched xlsx export
//
// A session owns one workbook. Each write_batch call appends records to a
// named sheet, creating it (with a header row) on first use. Where a batch
// lands is decided by the sheet's WriteCursor.

use std::collections::HashMap;

use log::{debug, warn};
use rust_xlsxwriter::{Workbook, Worksheet};
use sheetbind_config::WriterSettings;
use sheetbind_core::{DocumentKind, FieldBinding, SheetRecord, SpreadsheetSchema};

use crate::error::SheetError;
use crate::export::{ContentMetadata, ExportSink};
use crate::styles::SheetStyles;

/// Title text merged across all bound columns over `rows` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRegion {
    pub content: String,
    pub rows: u32,
}

impl TitleRegion {
    pub fn new(content: impl Into<String>, rows: u32) -> Self {
        Self { content: content.into(), rows }
    }
}

/// Per-sheet write position.
///
/// `next_row` is one past the last row written so far. The first two
/// batches start there; from the third on, a batch starts one row earlier
/// and overwrites the previous batch's last row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCursor {
    invocations: u32,
    next_row: u32,
}

impl WriteCursor {
    pub fn invocations(&self) -> u32 {
        self.invocations
    }

    pub fn next_row(&self) -> u32 {
        self.next_row
    }

    /// Register a new batch and return its starting row.
    fn begin(&mut self) -> u32 {
        self.invocations += 1;
        if self.invocations > 2 {
            self.next_row.saturating_sub(1)
        } else {
            self.next_row
        }
    }

    fn advance(&mut self, last_used: u32) {
        self.next_row = last_used + 1;
    }
}

/// Where a batch ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// First row touched by the batch, title included.
    pub offset: u32,
    /// First record row.
    pub data_start: u32,
    pub records: usize,
    /// Whether the sheet was created (and given a header row) by this batch.
    pub created: bool,
}

pub struct WriterSession {
    kind: DocumentKind,
    workbook: Workbook,
    cursors: HashMap<String, WriteCursor>,
    styles: SheetStyles,
    settings: WriterSettings,
}

impl WriterSession {
    pub fn new(kind: DocumentKind) -> Result<Self, SheetError> {
        Self::with_settings(kind, WriterSettings::default())
    }

    pub fn with_settings(kind: DocumentKind, settings: WriterSettings) -> Result<Self, SheetError> {
        if kind == DocumentKind::Xls {
            return Err(SheetError::Write(
                "legacy .xls output is not supported; declare the document as xlsx".into(),
            ));
        }
        Ok(Self {
            kind,
            workbook: Workbook::new(),
            cursors: HashMap::new(),
            styles: SheetStyles::from_settings(&settings),
            settings,
        })
    }

    /// Session for the kind declared on `R`'s schema.
    pub fn for_schema<R: SheetRecord>(schema: &SpreadsheetSchema<R>) -> Result<Self, SheetError> {
        Self::new(schema.kind())
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn cursor(&self, sheet_name: &str) -> Option<&WriteCursor> {
        self.cursors.get(sheet_name)
    }

    /// Append `records` to `sheet_name`, one column per binding, in order.
    ///
    /// Every value is written as its exported string form; unset optionals
    /// become blank cells.
    pub fn write_batch<R: SheetRecord>(
        &mut self,
        records: &[R],
        sheet_name: &str,
        bindings: &[FieldBinding<R>],
        title: Option<&TitleRegion>,
    ) -> Result<BatchReport, SheetError> {
        if bindings.is_empty() {
            return Err(SheetError::Write(format!("no columns to write on sheet '{sheet_name}'")));
        }
        let last_col = u16::try_from(bindings.len() - 1)
            .map_err(|_| SheetError::Write(format!("too many columns: {}", bindings.len())))?;
        if let Some(title) = title {
            if title.rows == 0 {
                return Err(SheetError::Write("title region must span at least one row".into()));
            }
        }

        let created = !self.cursors.contains_key(sheet_name);
        if created {
            // name is validated before the sheet joins the workbook
            let mut sheet = Worksheet::new();
            sheet.set_name(sheet_name).map_err(SheetError::write)?;
            self.workbook.push_worksheet(sheet);
        }
        let worksheet = self
            .workbook
            .worksheet_from_name(sheet_name)
            .map_err(SheetError::write)?;
        let cursor = self.cursors.entry(sheet_name.to_string()).or_default();
        let styles = &self.styles;

        let offset = cursor.begin();
        let mut row = offset;

        if let Some(title) = title {
            let last = row.checked_add(title.rows - 1).ok_or_else(|| {
                SheetError::Write(format!("title region of {} rows overflows the sheet", title.rows))
            })?;
            let written = if last == row && last_col == 0 {
                worksheet.write_string_with_format(row, 0, &title.content, &styles.title)
            } else {
                worksheet.merge_range(row, 0, last, last_col, &title.content, &styles.title)
            };
            written.map_err(SheetError::write)?;
            row = last + 1;
        }

        if created {
            for (col, binding) in (0u16..).zip(bindings) {
                worksheet
                    .write_string_with_format(row, col, binding.column(), &styles.header)
                    .map_err(SheetError::write)?;
                let width = (binding.column().chars().count() as f64 + 2.0)
                    .max(self.settings.min_column_width);
                worksheet.set_column_width(col, width).map_err(SheetError::write)?;
            }
            row += 1;
        }

        let data_start = row;
        for record in records {
            for (col, binding) in (0u16..).zip(bindings) {
                let written = match binding.export(record, &self.settings.date_pattern) {
                    Some(text) => worksheet.write_string_with_format(row, col, text, &styles.body),
                    None => worksheet.write_blank(row, col, &styles.body),
                };
                written.map_err(SheetError::write)?;
            }
            row += 1;
        }

        if row > offset {
            cursor.advance(row - 1);
        }
        debug!(
            "sheet '{sheet_name}': batch {} wrote {} record(s) at row {offset}",
            cursor.invocations(),
            records.len()
        );

        Ok(BatchReport { offset, data_start, records: records.len(), created })
    }

    /// Serialize the workbook into `sink` and release it.
    ///
    /// A failure to flush the sink is reported, unless an earlier write
    /// already failed, in which case that error wins.
    pub fn flush<S: ExportSink + ?Sized>(
        mut self,
        sink: &mut S,
        file_name: &str,
    ) -> Result<ContentMetadata, SheetError> {
        let metadata = ContentMetadata::for_kind(self.kind, file_name);
        sink.set_content_type(metadata.content_type);
        sink.set_header("Content-disposition", &metadata.disposition);

        let written = self
            .workbook
            .save_to_buffer()
            .map_err(SheetError::write)
            .and_then(|bytes| sink.write_all(&bytes).map_err(SheetError::write));
        let released = sink.flush().map_err(|e| SheetError::Resource(e.to_string()));

        match (written, released) {
            (Ok(()), Ok(())) => Ok(metadata),
            (Err(primary), Err(release)) => {
                warn!("sink release failed after write error: {release}");
                Err(primary)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        }
    }
}
