//! Format identifiers, conversion domains and capability tables.
//!
//! A [`Format`] is the normalised form of a user-supplied token such as
//! `"MD"`, `".markdown"` or `"jpeg"`. Synonyms collapse to one variant, so
//! capability checks never compare raw strings.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Every file format docshift can read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Markdown,
    Docx,
    Doc,
    Pdf,
    Txt,
    Html,
    Odt,
    Rtf,
    Ppt,
    Pptx,
    Png,
    Jpeg,
    Csv,
    Tsv,
    Xlsx,
    Xls,
    Json,
    Ods,
}

impl Format {
    pub const ALL: [Format; 18] = [
        Format::Markdown,
        Format::Docx,
        Format::Doc,
        Format::Pdf,
        Format::Txt,
        Format::Html,
        Format::Odt,
        Format::Rtf,
        Format::Ppt,
        Format::Pptx,
        Format::Png,
        Format::Jpeg,
        Format::Csv,
        Format::Tsv,
        Format::Xlsx,
        Format::Xls,
        Format::Json,
        Format::Ods,
    ];

    /// Canonical token, used for derived output names.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Markdown => "md",
            Format::Docx => "docx",
            Format::Doc => "doc",
            Format::Pdf => "pdf",
            Format::Txt => "txt",
            Format::Html => "html",
            Format::Odt => "odt",
            Format::Rtf => "rtf",
            Format::Ppt => "ppt",
            Format::Pptx => "pptx",
            Format::Png => "png",
            Format::Jpeg => "jpg",
            Format::Csv => "csv",
            Format::Tsv => "tsv",
            Format::Xlsx => "xlsx",
            Format::Xls => "xls",
            Format::Json => "json",
            Format::Ods => "ods",
        }
    }

    /// All tokens that parse to this format, canonical first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Format::Markdown => &["md", "markdown"],
            Format::Html => &["html", "htm"],
            Format::Txt => &["txt", "text"],
            Format::Jpeg => &["jpg", "jpeg"],
            Format::Docx => &["docx"],
            Format::Doc => &["doc"],
            Format::Pdf => &["pdf"],
            Format::Odt => &["odt"],
            Format::Rtf => &["rtf"],
            Format::Ppt => &["ppt"],
            Format::Pptx => &["pptx"],
            Format::Png => &["png"],
            Format::Csv => &["csv"],
            Format::Tsv => &["tsv"],
            Format::Xlsx => &["xlsx"],
            Format::Xls => &["xls"],
            Format::Json => &["json"],
            Format::Ods => &["ods"],
        }
    }

    /// Parse a token: case-insensitive, optional leading dot, synonyms allowed.
    pub fn parse(token: &str) -> Option<Format> {
        let normalised = token.trim().trim_start_matches('.').to_ascii_lowercase();
        if normalised.is_empty() {
            return None;
        }
        Format::ALL
            .into_iter()
            .find(|f| f.aliases().contains(&normalised.as_str()))
    }

    /// Derive the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Format::parse)
    }

    /// Raster formats produce one file per page.
    pub fn is_raster(self) -> bool {
        matches!(self, Format::Png | Format::Jpeg)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::parse(s).ok_or_else(|| ConvertError::UnknownFormat {
            token: s.to_string(),
        })
    }
}

/// The three converter domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Document,
    Presentation,
    Spreadsheet,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Document, Domain::Presentation, Domain::Spreadsheet];

    pub fn name(self) -> &'static str {
        match self {
            Domain::Document => "document",
            Domain::Presentation => "presentation",
            Domain::Spreadsheet => "spreadsheet",
        }
    }

    pub fn capabilities(self) -> &'static Capabilities {
        match self {
            Domain::Document => &DOCUMENT,
            Domain::Presentation => &PRESENTATION,
            Domain::Spreadsheet => &SPREADSHEET,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Domain {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" | "doc" | "documents" => Ok(Domain::Document),
            "presentation" | "slides" | "presentations" => Ok(Domain::Presentation),
            "spreadsheet" | "sheet" | "spreadsheets" => Ok(Domain::Spreadsheet),
            other => Err(ConvertError::InvalidConfig(format!(
                "unknown domain '{other}' (expected document, presentation or spreadsheet)"
            ))),
        }
    }
}

/// The declared input and output formats of one converter domain.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub inputs: &'static [Format],
    pub outputs: &'static [Format],
}

impl Capabilities {
    pub fn accepts(&self, format: Format) -> bool {
        self.inputs.contains(&format)
    }

    pub fn produces(&self, format: Format) -> bool {
        self.outputs.contains(&format)
    }
}

static DOCUMENT: Capabilities = Capabilities {
    inputs: &[
        Format::Markdown,
        Format::Docx,
        Format::Doc,
        Format::Pdf,
        Format::Txt,
        Format::Html,
        Format::Odt,
        Format::Rtf,
    ],
    outputs: &[
        Format::Markdown,
        Format::Docx,
        Format::Pdf,
        Format::Txt,
        Format::Html,
        Format::Odt,
        Format::Rtf,
    ],
};

static PRESENTATION: Capabilities = Capabilities {
    inputs: &[Format::Ppt, Format::Pptx, Format::Pdf, Format::Html],
    outputs: &[
        Format::Ppt,
        Format::Pptx,
        Format::Pdf,
        Format::Html,
        Format::Png,
        Format::Jpeg,
    ],
};

static SPREADSHEET: Capabilities = Capabilities {
    inputs: &[
        Format::Csv,
        Format::Xlsx,
        Format::Xls,
        Format::Json,
        Format::Tsv,
        Format::Ods,
    ],
    outputs: &[
        Format::Csv,
        Format::Xlsx,
        Format::Xls,
        Format::Json,
        Format::Tsv,
        Format::Html,
        Format::Markdown,
        Format::Ods,
    ],
};
