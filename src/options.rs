//! Per-request options, one explicit struct per domain.
//!
//! A converter only reads the struct for its own domain; the others are
//! carried along untouched, so one [`ConversionOptions`] value can be shared
//! by a whole mixed batch.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for the document converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOptions {
    /// Keep layout-bearing markup (heading styles, standalone HTML). Default: true.
    pub preserve_formatting: bool,

    /// Style source for styled outputs. A `.docx` supplies `word/styles.xml`
    /// for DOCX output; a `.css` file is linked into HTML output. Default: none.
    pub style_template: Option<PathBuf>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            preserve_formatting: true,
            style_template: None,
        }
    }
}

/// Options for the presentation converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationOptions {
    /// Default: true.
    pub preserve_formatting: bool,

    /// JPEG quality for raster output, 1–100. Default: 90.
    pub image_quality: u8,
}

impl Default for PresentationOptions {
    fn default() -> Self {
        Self {
            preserve_formatting: true,
            image_quality: 90,
        }
    }
}

/// Which worksheet of a workbook to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetSelector {
    /// Zero-based position.
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// Options for the spreadsheet converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetOptions {
    /// Worksheet to read from xlsx/xls/ods inputs. Default: the first.
    pub sheet: SheetSelector,

    /// Field delimiter for delimited text, applied on read and write.
    /// Default: `,` for csv and tab for tsv.
    pub delimiter: Option<u8>,

    /// WHATWG encoding label for delimited text and JSON. Default: `utf-8`.
    pub encoding: String,

    /// Emit a leading row-index column. Default: false.
    pub include_row_index: bool,
}

impl Default for SpreadsheetOptions {
    fn default() -> Self {
        Self {
            sheet: SheetSelector::default(),
            delimiter: None,
            encoding: "utf-8".to_string(),
            include_row_index: false,
        }
    }
}

/// The options carried by one conversion request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub document: DocumentOptions,
    pub presentation: PresentationOptions,
    pub spreadsheet: SpreadsheetOptions,
}

impl ConversionOptions {
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`ConversionOptions`].
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    options: ConversionOptions,
}

impl ConversionOptionsBuilder {
    /// Applies to both documents and presentations.
    pub fn preserve_formatting(mut self, v: bool) -> Self {
        self.options.document.preserve_formatting = v;
        self.options.presentation.preserve_formatting = v;
        self
    }

    pub fn style_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.document.style_template = Some(path.into());
        self
    }

    pub fn image_quality(mut self, q: u8) -> Self {
        self.options.presentation.image_quality = q;
        self
    }

    pub fn sheet(mut self, sheet: SheetSelector) -> Self {
        self.options.spreadsheet.sheet = sheet;
        self
    }

    pub fn sheet_name(self, name: impl Into<String>) -> Self {
        self.sheet(SheetSelector::Name(name.into()))
    }

    pub fn delimiter(mut self, d: u8) -> Self {
        self.options.spreadsheet.delimiter = Some(d);
        self
    }

    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.options.spreadsheet.encoding = label.into();
        self
    }

    pub fn include_row_index(mut self, v: bool) -> Self {
        self.options.spreadsheet.include_row_index = v;
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ConversionOptions, ConvertError> {
        let o = &self.options;
        if !(1..=100).contains(&o.presentation.image_quality) {
            return Err(ConvertError::InvalidConfig(format!(
                "Image quality must be 1–100, got {}",
                o.presentation.image_quality
            )));
        }
        if let Some(d) = o.spreadsheet.delimiter {
            if d == b'\n' || d == b'\r' || d == b'"' {
                return Err(ConvertError::InvalidConfig(format!(
                    "Delimiter {:?} cannot be used as a field separator",
                    d as char
                )));
            }
        }
        if encoding_rs::Encoding::for_label(o.spreadsheet.encoding.trim().as_bytes()).is_none() {
            return Err(ConvertError::InvalidConfig(format!(
                "Unknown encoding '{}'",
                o.spreadsheet.encoding
            )));
        }
        Ok(self.options)
    }
}

/// Parse a delimiter given on the command line (`,`, `;`, `tab`, `\t`).
pub fn parse_delimiter(s: &str) -> Result<u8, ConvertError> {
    match s {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(ConvertError::InvalidConfig(format!(
            "Delimiter must be a single ASCII character, got '{s}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let o = ConversionOptions::default();
        assert!(o.document.preserve_formatting);
        assert_eq!(o.document.style_template, None);
        assert_eq!(o.presentation.image_quality, 90);
        assert_eq!(o.spreadsheet.sheet, SheetSelector::Index(0));
        assert_eq!(o.spreadsheet.delimiter, None);
        assert_eq!(o.spreadsheet.encoding, "utf-8");
        assert!(!o.spreadsheet.include_row_index);
    }

    #[test]
    fn zero_quality_rejected() {
        assert!(ConversionOptions::builder().image_quality(0).build().is_err());
        assert!(ConversionOptions::builder().image_quality(100).build().is_ok());
    }

    #[test]
    fn unknown_encoding_rejected() {
        let err = ConversionOptions::builder()
            .encoding("klingon-8")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("klingon-8"));
        assert!(ConversionOptions::builder().encoding("latin1").build().is_ok());
    }

    #[test]
    fn quote_delimiter_rejected() {
        assert!(ConversionOptions::builder().delimiter(b'"').build().is_err());
        assert!(ConversionOptions::builder().delimiter(b';').build().is_ok());
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert!(parse_delimiter(";;").is_err());
    }
}
