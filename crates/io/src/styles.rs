// Cell formats for exported sheets

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder};
use sheetbind_config::{Alignment, CellStyle, WriterSettings};

/// The three formats a written sheet uses.
#[derive(Debug, Clone)]
pub struct SheetStyles {
    pub title: Format,
    pub header: Format,
    pub body: Format,
}

impl SheetStyles {
    pub fn from_settings(settings: &WriterSettings) -> Self {
        Self {
            // merged title blocks are also centered vertically
            title: build_format(&settings.title).set_align(FormatAlign::VerticalCenter),
            header: build_format(&settings.header),
            body: build_format(&settings.body),
        }
    }
}

/// Build an xlsx Format from a configured cell style
fn build_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    if style.bold {
        format = format.set_bold();
    }
    format = format.set_font_size(style.font_size);

    format = match style.align {
        Alignment::General => format,
        Alignment::Left => format.set_align(FormatAlign::Left),
        Alignment::Center => format.set_align(FormatAlign::Center),
        Alignment::Right => format.set_align(FormatAlign::Right),
    };

    if let Some(rgb) = style.background_rgb() {
        format = format.set_background_color(rust_xlsxwriter::Color::RGB(rgb));
    }
    if style.border {
        format = format.set_border(FormatBorder::Thin);
    }
    if style.wrap {
        format = format.set_text_wrap();
    }

    format
}
