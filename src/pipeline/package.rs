//! OOXML packages: zip containers of XML parts.
//!
//! Every entry is written with the zip epoch (1980-01-01) as its timestamp,
//! so converting the same input twice yields byte-identical files.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

fn zip_err(e: zip::result::ZipError) -> std::io::Error {
    std::io::Error::other(e)
}

/// Write `parts` (name, content) to a new package at `target`, in order.
pub fn write_package(target: &Path, parts: &[(&str, String)]) -> std::io::Result<()> {
    let file = File::create(target)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for (name, content) in parts {
        zip.start_file(*name, options).map_err(zip_err)?;
        zip.write_all(content.as_bytes())?;
    }
    let mut writer = zip.finish().map_err(zip_err)?;
    writer.flush()
}

/// Read one part of a package as UTF-8 text. `Ok(None)` when the part is absent.
pub fn read_part(source: &Path, name: &str) -> std::io::Result<Option<String>> {
    let file = File::open(source)?;
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(zip_err(e)),
    };
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(Some(content))
}

/// Whether `c` is allowed in an XML 1.0 document (the `Char` production).
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Escape text for use inside an XML element or attribute.
///
/// Characters XML cannot carry at all (C0 controls other than tab and line
/// breaks, U+FFFE, U+FFFF) are dropped.
pub fn xml_escape(text: &str) -> String {
    if text.chars().all(is_xml_char) {
        return quick_xml::escape::escape(text).into_owned();
    }
    let clean: String = text.chars().filter(|&c| is_xml_char(c)).collect();
    quick_xml::escape::escape(clean.as_str()).into_owned()
}
