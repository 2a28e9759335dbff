//! The native table model behind every spreadsheet conversion.
//!
//! Any readable input (csv, tsv, json, xlsx, xls, ods) is loaded into a
//! [`Table`]: a header row plus rows of JSON values. Cell types are kept
//! where the source has them (numbers, booleans) and inferred for
//! delimited text.

use crate::error::ConvertError;
use crate::format::Format;
use crate::options::{SheetSelector, SpreadsheetOptions};
use crate::pipeline::markdown::escape_html;
use crate::pipeline::{read_error, xlsx};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Header plus rows. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Pad short rows with nulls; widen the header for long ones.
    fn normalise(mut self) -> Self {
        let width = self
            .rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(self.columns.len());
        for i in self.columns.len()..width {
            self.columns.push(format!("Unnamed: {i}"));
        }
        for row in &mut self.rows {
            row.resize(width, Value::Null);
        }
        self
    }

    fn with_numbered_columns(mut self) -> Self {
        for (i, c) in self.columns.iter_mut().enumerate() {
            *c = i.to_string();
        }
        self
    }

    /// Copy with a leading unnamed index column counting from 0.
    fn with_row_index(&self) -> Table {
        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(String::new());
        columns.extend(self.columns.iter().cloned());
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut r = Vec::with_capacity(row.len() + 1);
                r.push(Value::from(i));
                r.extend(row.iter().cloned());
                r
            })
            .collect();
        Table { columns, rows }
    }
}

fn encoding_for(label: &str) -> &'static Encoding {
    Encoding::for_label(label.trim().as_bytes()).unwrap_or(UTF_8)
}

fn default_delimiter(format: Format) -> u8 {
    if format == Format::Tsv {
        b'\t'
    } else {
        b','
    }
}

/// Text cell → typed value, the way a dataframe reader would infer it.
fn infer(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match trimmed {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

/// Cell → text, as written into delimited and markup outputs.
fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Reading ──────────────────────────────────────────────────────────────

fn decode(bytes: &[u8], path: &Path, format: Format, label: &str) -> Result<String, ConvertError> {
    let encoding = encoding_for(label);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ConvertError::malformed(
            path,
            format,
            format!("content is not valid {}", used.name()),
        ));
    }
    Ok(text.into_owned())
}

fn read_delimited(text: &str, path: &Path, format: Format, delimiter: u8) -> Result<Table, ConvertError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| ConvertError::malformed(path, format, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.is_empty() || text.trim().is_empty() {
        return Err(ConvertError::malformed(path, format, "no columns to parse"));
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ConvertError::malformed(path, format, e))?;
        rows.push(record.iter().map(infer).collect());
    }
    Ok(Table { columns, rows }.normalise())
}

fn read_json(text: &str, path: &Path) -> Result<Table, ConvertError> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| ConvertError::malformed(path, Format::Json, e))?;
    match root {
        Value::Array(items) => {
            if items.iter().all(Value::is_object) {
                Ok(records_to_table(items))
            } else if items.iter().all(Value::is_array) {
                let rows: Vec<Vec<Value>> = items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Array(r) => Some(r),
                        _ => None,
                    })
                    .collect();
                Ok(Table {
                    columns: Vec::new(),
                    rows,
                }
                .normalise()
                .with_numbered_columns())
            } else {
                Err(ConvertError::malformed(
                    path,
                    Format::Json,
                    "array must hold only objects or only arrays",
                ))
            }
        }
        Value::Object(columns) => columns_to_table(columns, path),
        _ => Err(ConvertError::malformed(
            path,
            Format::Json,
            "expected an array of records or an object of columns",
        )),
    }
}

fn records_to_table(items: Vec<Value>) -> Table {
    let mut columns: Vec<String> = Vec::new();
    for item in &items {
        if let Value::Object(map) = item {
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    let rows = items
        .into_iter()
        .map(|item| match item {
            Value::Object(mut map) => columns
                .iter()
                .map(|c| map.remove(c).unwrap_or(Value::Null))
                .collect(),
            _ => vec![Value::Null; columns.len()],
        })
        .collect();
    Table { columns, rows }
}

/// `{"col": {"0": v, "1": v}}` or `{"col": [v, v]}`.
fn columns_to_table(columns: Map<String, Value>, path: &Path) -> Result<Table, ConvertError> {
    let mut index: Vec<String> = Vec::new();
    for values in columns.values() {
        match values {
            Value::Object(cells) => {
                for key in cells.keys() {
                    if !index.contains(key) {
                        index.push(key.clone());
                    }
                }
            }
            Value::Array(cells) => {
                for i in index.len()..cells.len() {
                    index.push(i.to_string());
                }
            }
            _ => {
                return Err(ConvertError::malformed(
                    path,
                    Format::Json,
                    "column values must be objects or arrays",
                ))
            }
        }
    }
    let names: Vec<String> = columns.keys().cloned().collect();
    let mut rows = vec![Vec::with_capacity(names.len()); index.len()];
    for values in columns.into_values() {
        match values {
            Value::Object(mut cells) => {
                for (row, key) in rows.iter_mut().zip(&index) {
                    row.push(cells.remove(key).unwrap_or(Value::Null));
                }
            }
            Value::Array(cells) => {
                let mut cells = cells.into_iter();
                for row in rows.iter_mut() {
                    row.push(cells.next().unwrap_or(Value::Null));
                }
            }
            _ => {}
        }
    }
    Ok(Table {
        columns: names,
        rows,
    })
}

fn calamine_value(cell: &calamine::Data) -> Value {
    use calamine::Data;
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Value::from(*f as i64)
            } else {
                Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn read_workbook(path: &Path, format: Format, sheet: &SheetSelector) -> Result<Table, ConvertError> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook =
        open_workbook_auto(path).map_err(|e| ConvertError::malformed(path, format, e))?;
    let names = workbook.sheet_names();
    let name = match sheet {
        SheetSelector::Index(i) => names.get(*i).cloned().ok_or_else(|| {
            ConvertError::malformed(
                path,
                format,
                format!("workbook has {} sheet(s), no sheet at index {i}", names.len()),
            )
        })?,
        SheetSelector::Name(n) => names.iter().find(|s| *s == n).cloned().ok_or_else(|| {
            ConvertError::malformed(
                path,
                format,
                format!("no sheet named '{n}' (sheets: {})", names.join(", ")),
            )
        })?,
    };
    debug!("Reading sheet '{}'", name);
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| ConvertError::malformed(path, format, e))?;

    let mut rows = range.rows();
    let columns = match rows.next() {
        Some(header) => header.iter().map(|c| display(&calamine_value(c))).collect(),
        None => Vec::new(),
    };
    let rows = rows.map(|r| r.iter().map(calamine_value).collect()).collect();
    Ok(Table { columns, rows }.normalise())
}

/// Load `path` as a table.
pub fn read(path: &Path, format: Format, options: &SpreadsheetOptions) -> Result<Table, ConvertError> {
    match format {
        Format::Csv | Format::Tsv => {
            let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;
            let text = decode(&bytes, path, format, &options.encoding)?;
            let delimiter = options.delimiter.unwrap_or_else(|| default_delimiter(format));
            read_delimited(&text, path, format, delimiter)
        }
        Format::Json => {
            let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;
            let text = decode(&bytes, path, format, &options.encoding)?;
            read_json(&text, path)
        }
        Format::Xlsx | Format::Xls | Format::Ods => read_workbook(path, format, &options.sheet),
        other => Err(ConvertError::Internal(format!("{other} is not a tabular input"))),
    }
}

// ── Writing ──────────────────────────────────────────────────────────────

/// Encode text for output. encoding_rs only encodes to UTF-8 for the
/// UTF-16 labels, so those are written by hand.
fn encode(text: &str, label: &str) -> Vec<u8> {
    let encoding = encoding_for(label);
    if encoding == UTF_8 {
        text.as_bytes().to_vec()
    } else if encoding == UTF_16LE {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    } else if encoding == UTF_16BE {
        text.encode_utf16().flat_map(u16::to_be_bytes).collect()
    } else {
        let (bytes, _, unmappable) = encoding.encode(text);
        if unmappable {
            warn!(
                "Some characters cannot be represented in {}; written as numeric references",
                encoding.name()
            );
        }
        bytes.into_owned()
    }
}

fn to_delimited(table: &Table, delimiter: u8) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(display))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Array of records, pretty-printed with a 4-space indent.
pub fn to_json(table: &Table) -> Result<String, serde_json::Error> {
    let records: Vec<Map<String, Value>> = table
        .rows
        .iter()
        .map(|row| table.columns.iter().cloned().zip(row.iter().cloned()).collect())
        .collect();
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn to_html(table: &Table) -> String {
    let mut out = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n");
    out.push_str("    <tr style=\"text-align: right;\">\n");
    for c in &table.columns {
        out.push_str(&format!("      <th>{}</th>\n", escape_html(c)));
    }
    out.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for row in &table.rows {
        out.push_str("    <tr>\n");
        for v in row {
            out.push_str(&format!("      <td>{}</td>\n", escape_html(&display(v))));
        }
        out.push_str("    </tr>\n");
    }
    out.push_str("  </tbody>\n</table>\n");
    out
}

pub fn to_markdown(table: &Table) -> String {
    let cell = |s: String| s.replace('|', "\\|").replace('\n', " ");
    let mut out = format!(
        "| {} |\n| {} |\n",
        table
            .columns
            .iter()
            .map(|c| cell(c.clone()))
            .collect::<Vec<_>>()
            .join(" | "),
        vec!["---"; table.columns.len()].join(" | ")
    );
    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(|v| cell(display(v))).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

/// Write `table` to `path` as `format`.
pub fn write(
    table: &Table,
    path: &Path,
    format: Format,
    options: &SpreadsheetOptions,
) -> Result<(), ConvertError> {
    let indexed;
    let table = if options.include_row_index && !matches!(format, Format::Json | Format::Markdown) {
        indexed = table.with_row_index();
        &indexed
    } else {
        table
    };
    let write_bytes = |bytes: Vec<u8>| std::fs::write(path, bytes).map_err(|e| ConvertError::write(path, e));

    match format {
        Format::Csv | Format::Tsv => {
            let delimiter = options.delimiter.unwrap_or_else(|| default_delimiter(format));
            let text = to_delimited(table, delimiter)
                .map_err(|e| ConvertError::write(path, std::io::Error::other(e)))?;
            write_bytes(encode(&text, &options.encoding))
        }
        Format::Json => {
            let text = to_json(table).map_err(|e| ConvertError::write(path, std::io::Error::other(e)))?;
            write_bytes(text.into_bytes())
        }
        Format::Html => write_bytes(to_html(table).into_bytes()),
        Format::Markdown => write_bytes(encode(&to_markdown(table), &options.encoding)),
        Format::Xlsx => {
            xlsx::write(path, &table.columns, &table.rows).map_err(|e| ConvertError::write(path, e))
        }
        other => Err(ConvertError::Internal(format!("{other} is not a tabular output"))),
    }
}

/// Read `input` and write it back out as `to`.
pub fn convert(
    input: &Path,
    from: Format,
    output: &Path,
    to: Format,
    options: &SpreadsheetOptions,
) -> Result<(), ConvertError> {
    let table = read(input, from, options)?;
    debug!(
        "Loaded {} column(s) × {} row(s)",
        table.columns.len(),
        table.rows.len()
    );
    write(&table, output, to, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Table {
        Table {
            columns: vec!["name".into(), "qty".into()],
            rows: vec![vec![json!("apple"), json!(3)], vec![json!("pear"), json!(1.5)]],
        }
    }

    #[test]
    fn delimited_cells_are_typed() {
        let t = read_delimited("a,b,c\n1,x,true\n2.5,,False\n", Path::new("t.csv"), Format::Csv, b',').unwrap();
        assert_eq!(t.columns, vec!["a", "b", "c"]);
        assert_eq!(t.rows[0], vec![json!(1), json!("x"), json!(true)]);
        assert_eq!(t.rows[1], vec![json!(2.5), Value::Null, json!(false)]);
    }

    #[test]
    fn ragged_rows_are_padded() {
        let t = read_delimited("a,b\n1\n1,2,3\n", Path::new("t.csv"), Format::Csv, b',').unwrap();
        assert_eq!(t.columns, vec!["a", "b", "Unnamed: 2"]);
        assert_eq!(t.rows[0], vec![json!(1), Value::Null, Value::Null]);
    }

    #[test]
    fn empty_delimited_input_is_malformed() {
        let err = read_delimited("", Path::new("e.csv"), Format::Csv, b',').unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput { .. }));
    }

    #[test]
    fn json_records_keep_key_order() {
        let t = read_json(r#"[{"z": 1, "a": 2}, {"a": 3, "m": true}]"#, Path::new("r.json")).unwrap();
        assert_eq!(t.columns, vec!["z", "a", "m"]);
        assert_eq!(t.rows[1], vec![Value::Null, json!(3), json!(true)]);
    }

    #[test]
    fn json_columns_orientation() {
        let t = read_json(r#"{"a": {"0": 1, "1": 2}, "b": ["x", "y"]}"#, Path::new("c.json")).unwrap();
        assert_eq!(t.columns, vec!["a", "b"]);
        assert_eq!(t.rows, vec![vec![json!(1), json!("x")], vec![json!(2), json!("y")]]);
    }

    #[test]
    fn json_scalar_is_malformed() {
        let err = read_json("42", Path::new("n.json")).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput { .. }));
    }

    #[test]
    fn json_output_is_records_with_four_space_indent() {
        assert_eq!(
            to_json(&sample()).unwrap(),
            "[\n    {\n        \"name\": \"apple\",\n        \"qty\": 3\n    },\n    {\n        \"name\": \"pear\",\n        \"qty\": 1.5\n    }\n]"
        );
    }

    #[test]
    fn markdown_pipe_table() {
        assert_eq!(
            to_markdown(&sample()),
            "| name | qty |\n| --- | --- |\n| apple | 3 |\n| pear | 1.5 |\n"
        );
    }

    #[test]
    fn html_table_with_index() {
        let html = to_html(&sample().with_row_index());
        assert!(html.starts_with("<table border=\"1\" class=\"dataframe\">"));
        assert!(html.contains("<th></th>"));
        assert!(html.contains("<td>0</td>"));
    }

    #[test]
    fn delimited_round_trip_with_semicolons() {
        let text = to_delimited(&sample(), b';').unwrap();
        assert_eq!(text, "name;qty\napple;3\npear;1.5\n");
        let back = read_delimited(&text, Path::new("x.csv"), Format::Csv, b';').unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn latin1_encoding_round_trip() {
        let bytes = encode("café", "latin1");
        assert_eq!(bytes, b"caf\xe9");
        assert_eq!(decode(&bytes, Path::new("x"), Format::Csv, "latin1").unwrap(), "café");
    }

    #[test]
    fn utf16_is_encoded_by_hand() {
        assert_eq!(encode("hi", "utf-16le"), vec![b'h', 0, b'i', 0]);
        assert_eq!(encode("hi", "utf-16be"), vec![0, b'h', 0, b'i']);
    }

    #[test]
    fn csv_to_xlsx_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("in.csv");
        let xlsx_path = dir.path().join("out.xlsx");
        std::fs::write(&csv_path, "name,qty\napple,3\npear,1.5\n").unwrap();
        let opts = SpreadsheetOptions::default();
        convert(&csv_path, Format::Csv, &xlsx_path, Format::Xlsx, &opts).unwrap();
        let back = read(&xlsx_path, Format::Xlsx, &opts).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn missing_sheet_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.xlsx");
        xlsx::write(&path, &["a".into()], &[vec![json!(1)]]).unwrap();
        let opts = SpreadsheetOptions {
            sheet: SheetSelector::Name("Totals".into()),
            ..SpreadsheetOptions::default()
        };
        let err = read(&path, Format::Xlsx, &opts).unwrap_err();
        assert!(err.to_string().contains("Totals"), "got: {err}");
    }
}
