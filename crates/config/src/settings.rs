// Engine settings
// Loaded from ~/.config/sheetbind/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use sheetbind_core::date::DEFAULT_PATTERN as DEFAULT_DATE_PATTERN;

/// Horizontal alignment of a styled cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    General,
    Left,
    Center,
    Right,
}

/// Declarative cell style, turned into a writer format handle by the io crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellStyle {
    pub bold: bool,
    /// Font size in points
    pub font_size: f64,
    pub align: Alignment,
    /// Background fill as "#RRGGBB"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Thin border on all sides
    pub border: bool,
    pub wrap: bool,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            bold: false,
            font_size: 11.0,
            align: Alignment::General,
            background: None,
            border: false,
            wrap: false,
        }
    }
}

impl CellStyle {
    /// Parse `background` as a 0xRRGGBB value
    pub fn background_rgb(&self) -> Option<u32> {
        let hex = self.background.as_deref()?.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()
    }

    fn title() -> Self {
        Self {
            bold: true,
            font_size: 16.0,
            align: Alignment::Center,
            ..Default::default()
        }
    }

    fn header() -> Self {
        Self {
            bold: true,
            align: Alignment::Center,
            background: Some("#D9E1F2".to_string()),
            border: true,
            ..Default::default()
        }
    }
}

/// Reader defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Pattern used to render date-formatted numeric cells as text
    pub date_pattern: String,
    /// Overrides the record declaration's streaming read-ahead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_cache_size: Option<usize>,
    /// Overrides the record declaration's input buffer size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
            row_cache_size: None,
            buffer_size: None,
        }
    }
}

/// Writer defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    /// Pattern for exporting date fields that declare none
    pub date_pattern: String,
    /// Minimum column width in characters
    pub min_column_width: f64,
    pub title: CellStyle,
    pub header: CellStyle,
    pub body: CellStyle,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
            min_column_width: 10.0,
            title: CellStyle::title(),
            header: CellStyle::header(),
            body: CellStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reader: ReaderSettings,
    pub writer: WriterSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetbind");
        config_dir.join("settings.toml")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`; a missing or malformed file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, String> {
        toml::from_str(input).map_err(|e| e.to_string())
    }

    /// Save settings to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, text).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.reader.date_pattern, DEFAULT_DATE_PATTERN);
        assert!(settings.writer.header.bold);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = Settings::from_toml(
            r##"
[reader]
row_cache_size = 20

[writer]
date_pattern = "%d/%m/%Y"

[writer.title]
font_size = 20.0
background = "#FFEEDD"
"##,
        )
        .unwrap();
        assert_eq!(settings.reader.row_cache_size, Some(20));
        assert_eq!(settings.reader.buffer_size, None);
        assert_eq!(settings.writer.date_pattern, "%d/%m/%Y");
        assert_eq!(settings.writer.title.font_size, 20.0);
        assert!(!settings.writer.title.bold);
        assert_eq!(settings.writer.title.background_rgb(), Some(0xFFEEDD));
        assert_eq!(settings.writer.min_column_width, 10.0);
    }

    #[test]
    fn bad_background_is_ignored() {
        let style = CellStyle {
            background: Some("blue".into()),
            ..Default::default()
        };
        assert_eq!(style.background_rgb(), None);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let mut settings = Settings::default();
        settings.reader.buffer_size = Some(8192);
        settings.writer.body.wrap = true;
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[reader\nbroken").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(Settings::load_from(&dir.path().join("absent.toml")), Settings::default());
    }
}
