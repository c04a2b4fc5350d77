// Export destinations and the response metadata attached to them

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use sheetbind_core::DocumentKind;

/// Content type and disposition for a finished document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMetadata {
    pub content_type: &'static str,
    /// Download name, extension included.
    pub file_name: String,
    pub disposition: String,
}

impl ContentMetadata {
    /// `file_name` is given without extension; the kind's extension is
    /// appended and the name is form-urlencoded in the disposition.
    pub fn for_kind(kind: DocumentKind, file_name: &str) -> Self {
        let ext = kind.extension();
        let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
        Self {
            content_type: kind.content_type(),
            file_name: format!("{file_name}{ext}"),
            disposition: format!("attachment;filename={encoded}{ext}"),
        }
    }
}

/// A byte destination that can also carry response metadata.
pub trait ExportSink: Write {
    fn set_content_type(&mut self, content_type: &str);
    fn set_header(&mut self, name: &str, value: &str);
}

/// Collects the document and its headers in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub flushed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushed = true;
        Ok(())
    }
}

impl ExportSink for MemorySink {
    fn set_content_type(&mut self, content_type: &str) {
        self.content_type = Some(content_type.to_string());
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
}

/// Writes the document to a file. Metadata has nowhere to go and is dropped.
pub struct FileSink {
    out: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self { out: BufWriter::new(File::create(path)?) })
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl ExportSink for FileSink {
    fn set_content_type(&mut self, content_type: &str) {
        log::debug!("file sink ignores content type {content_type}");
    }

    fn set_header(&mut self, name: &str, _value: &str) {
        log::debug!("file sink ignores header {name}");
    }
}
