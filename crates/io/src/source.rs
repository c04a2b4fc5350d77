// Row sources: the two ways a sheet's rows are pulled out of a document
//
// Legacy (.xls) documents are decoded in one go by calamine, so their rows
// come from an in-memory range. Modern (.xlsx) documents are read cell by
// cell from the worksheet XML and grouped into rows, with a bounded
// read-ahead of whole rows.

use std::collections::{HashMap, VecDeque};

use calamine::{CellType, Data, Range};

use crate::cell::RawCell;
use crate::error::SheetError;

/// One non-blank row, indexed by absolute sheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub index: u32,
    pub cells: Vec<RawCell>,
}

impl SheetRow {
    pub fn new(index: u32) -> Self {
        Self { index, cells: Vec::new() }
    }

    /// Cell at column position `col`; blank past the last stored cell.
    pub fn cell(&self, col: usize) -> &RawCell {
        self.cells.get(col).unwrap_or(&RawCell::Blank)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(RawCell::is_blank)
    }

    fn put(&mut self, col: u32, cell: RawCell) {
        let col = col as usize;
        if self.cells.len() <= col {
            self.cells.resize(col + 1, RawCell::Blank);
        }
        self.cells[col] = cell;
    }
}

/// A forward-only supply of non-blank rows, in sheet order.
pub trait RowSource {
    fn next_row(&mut self) -> Result<Option<SheetRow>, SheetError>;
}

/// Rows of a fully decoded sheet. Formula text wins over the cached value.
pub struct EagerRows {
    values: Range<Data>,
    formulas: Option<Range<String>>,
    next: u32,
    last_row: u32,
    last_col: u32,
}

impl EagerRows {
    pub fn new(values: Range<Data>, formulas: Option<Range<String>>) -> Self {
        let extents = [bounds(&values), formulas.as_ref().and_then(bounds)]
            .into_iter()
            .flatten()
            .reduce(|(s, e), (start, end)| {
                ((s.0.min(start.0), s.1.min(start.1)), (e.0.max(end.0), e.1.max(end.1)))
            });
        let (next, last_row, last_col) = match extents {
            Some((start, end)) => (start.0, end.0, end.1),
            // empty sheet: next > last_row stops immediately
            None => (1, 0, 0),
        };
        Self { values, formulas, next, last_row, last_col }
    }

    fn cell_at(&self, pos: (u32, u32)) -> RawCell {
        if let Some(text) = self
            .formulas
            .as_ref()
            .and_then(|f| f.get_value(pos))
            .filter(|text| !text.is_empty())
        {
            return RawCell::Formula(text.clone());
        }
        self.values.get_value(pos).map(RawCell::from).unwrap_or(RawCell::Blank)
    }
}

type Bounds = ((u32, u32), (u32, u32));

fn bounds<T: CellType>(range: &Range<T>) -> Option<Bounds> {
    Some((range.start()?, range.end()?))
}

impl RowSource for EagerRows {
    fn next_row(&mut self) -> Result<Option<SheetRow>, SheetError> {
        while self.next <= self.last_row {
            let index = self.next;
            self.next += 1;
            let mut row = SheetRow::new(index);
            for col in 0..=self.last_col {
                let cell = self.cell_at((index, col));
                if !cell.is_blank() {
                    row.put(col, cell);
                }
            }
            if !row.is_blank() {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}

/// A cell pulled from a streaming reader: (row, column, contents).
pub type PositionedCell = (u32, u32, RawCell);

/// Groups a stream of positioned cells into rows, reading up to
/// `cache_rows` non-blank rows ahead of the consumer.
pub struct StreamingRows<F> {
    next_cell: F,
    formulas: HashMap<(u32, u32), String>,
    pending: Option<PositionedCell>,
    cache: VecDeque<SheetRow>,
    cache_rows: usize,
    // the cell reader errors if polled again after reporting its end
    stream_end: bool,
    exhausted: bool,
}

impl<F> StreamingRows<F>
where
    F: FnMut() -> Result<Option<PositionedCell>, SheetError>,
{
    pub fn new(next_cell: F, formulas: HashMap<(u32, u32), String>, cache_rows: usize) -> Self {
        Self {
            next_cell,
            formulas,
            pending: None,
            cache: VecDeque::with_capacity(cache_rows.max(1)),
            cache_rows: cache_rows.max(1),
            stream_end: false,
            exhausted: false,
        }
    }

    fn take_cell(&mut self) -> Result<Option<PositionedCell>, SheetError> {
        if let Some(cell) = self.pending.take() {
            return Ok(Some(cell));
        }
        if self.stream_end {
            return Ok(None);
        }
        let cell = (self.next_cell)()?;
        self.stream_end = cell.is_none();
        Ok(cell)
    }

    fn place(&self, row: &mut SheetRow, (r, c, cell): PositionedCell) {
        match self.formulas.get(&(r, c)) {
            Some(text) => row.put(c, RawCell::Formula(text.clone())),
            None if !cell.is_blank() => row.put(c, cell),
            None => {}
        }
    }

    fn read_row(&mut self) -> Result<Option<SheetRow>, SheetError> {
        let Some(first) = self.take_cell()? else {
            return Ok(None);
        };
        let mut row = SheetRow::new(first.0);
        self.place(&mut row, first);
        while let Some(cell) = self.take_cell()? {
            if cell.0 != row.index {
                self.pending = Some(cell);
                break;
            }
            self.place(&mut row, cell);
        }
        Ok(Some(row))
    }

    fn fill(&mut self) -> Result<(), SheetError> {
        while !self.exhausted && self.cache.len() < self.cache_rows {
            match self.read_row()? {
                Some(row) if row.is_blank() => {}
                Some(row) => self.cache.push_back(row),
                None => self.exhausted = true,
            }
        }
        Ok(())
    }
}

impl<F> RowSource for StreamingRows<F>
where
    F: FnMut() -> Result<Option<PositionedCell>, SheetError>,
{
    fn next_row(&mut self) -> Result<Option<SheetRow>, SheetError> {
        if self.cache.is_empty() {
            self.fill()?;
        }
        Ok(self.cache.pop_front())
    }
}
