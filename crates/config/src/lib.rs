// Configuration loading

pub mod settings;

pub use settings::{Alignment, CellStyle, ReaderSettings, Settings, WriterSettings};
