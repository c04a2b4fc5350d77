// Raw cell contents and their canonical text form
//
// Every cell handed to a field goes through `RawCell::normalize` first, so
// coercion only ever sees text. Normalization never fails.

use calamine::{Data, DataRef, ExcelDateTime};
use sheetbind_core::date::format_date;

/// A cell as read from the document, detached from the workbook's buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Blank,
    Error,
    Boolean(bool),
    Numeric(f64),
    Integer(i64),
    Date(ExcelDateTime),
    /// ISO 8601 date or duration text stored as-is (ods style).
    IsoText(String),
    /// Formula source text, without a leading `=`.
    Formula(String),
    Text(String),
}

impl RawCell {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Blank => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Canonical text form of the cell.
    ///
    /// Dates are rendered with `date_pattern`. Error and blank cells are empty.
    pub fn normalize(&self, date_pattern: &str) -> String {
        match self {
            Self::Blank | Self::Error => String::new(),
            Self::Boolean(b) => b.to_string(),
            Self::Numeric(n) => numeric_text(*n),
            Self::Integer(i) => i.to_string(),
            Self::Date(dt) => match dt.as_datetime() {
                Some(value) if dt.is_datetime() => format_date(&value, date_pattern),
                _ => numeric_text(dt.as_f64()),
            },
            Self::IsoText(s) | Self::Formula(s) | Self::Text(s) => s.clone(),
        }
    }
}

/// Decimal form of a numeric cell: integral values keep a trailing `.0`.
fn numeric_text(n: f64) -> String {
    format!("{n:?}")
}

impl From<&Data> for RawCell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Self::Blank,
            Data::Error(_) => Self::Error,
            Data::Bool(b) => Self::Boolean(*b),
            Data::Float(f) => Self::Numeric(*f),
            Data::Int(i) => Self::Integer(*i),
            Data::DateTime(dt) => Self::Date(*dt),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Self::IsoText(s.clone()),
            Data::String(s) => Self::Text(s.clone()),
        }
    }
}

impl From<&DataRef<'_>> for RawCell {
    fn from(data: &DataRef<'_>) -> Self {
        match data {
            DataRef::Empty => Self::Blank,
            DataRef::Error(_) => Self::Error,
            DataRef::Bool(b) => Self::Boolean(*b),
            DataRef::Float(f) => Self::Numeric(*f),
            DataRef::Int(i) => Self::Integer(*i),
            DataRef::DateTime(dt) => Self::Date(*dt),
            DataRef::DateTimeIso(s) | DataRef::DurationIso(s) => Self::IsoText(s.clone()),
            DataRef::String(s) => Self::Text(s.clone()),
            DataRef::SharedString(s) => Self::Text((*s).to_string()),
        }
    }
}
