//! `sheetbind-io`: reading records out of spreadsheet documents and
//! writing them back in batches.

pub mod cell;
pub mod error;
pub mod export;
pub mod reader;
pub mod source;
pub mod styles;
pub mod writer;

pub use cell::RawCell;
pub use error::SheetError;
pub use export::{ContentMetadata, ExportSink, FileSink, MemorySink};
pub use reader::{Document, HeaderBinding, Records, SheetReader};
pub use source::{RowSource, SheetRow};
pub use styles::SheetStyles;
pub use writer::{BatchReport, TitleRegion, WriteCursor, WriterSession};
