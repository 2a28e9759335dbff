//! Minimal XLSX writer: one worksheet, inline strings.

use crate::pipeline::package::{write_package, xml_escape};
use serde_json::Value;
use std::path::Path;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

pub const SHEET_NAME: &str = "Sheet1";

/// Spreadsheet column letters: 0 → A, 25 → Z, 26 → AA.
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn cell_xml(reference: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(*b)),
        Value::Number(n) => format!(r#"<c r="{reference}"><v>{n}</v></c>"#),
        Value::String(s) => inline_string(reference, s),
        other => inline_string(reference, &other.to_string()),
    }
}

fn inline_string(reference: &str, text: &str) -> String {
    format!(
        r#"<c r="{reference}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        xml_escape(text)
    )
}

/// `xl/worksheets/sheet1.xml` for a header row followed by `rows`.
pub fn sheet_xml(header: &[String], rows: &[Vec<Value>]) -> String {
    let mut data = String::new();
    let header_row = header.iter().map(|h| Value::String(h.clone())).collect::<Vec<_>>();
    for (r, row) in std::iter::once(&header_row).chain(rows.iter()).enumerate() {
        data.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(c), r + 1);
            data.push_str(&cell_xml(&reference, value));
        }
        data.push_str("</row>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{data}</sheetData></worksheet>"#
    )
}

pub fn write(target: &Path, header: &[String], rows: &[Vec<Value>]) -> std::io::Result<()> {
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{SHEET_NAME}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    );
    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(header, rows)),
    ];
    write_package(target, &parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_letters() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn cells_keep_their_types() {
        let xml = sheet_xml(
            &["name".into(), "n".into(), "ok".into()],
            &[vec![json!("a&b"), json!(3), json!(true)], vec![json!(null), json!(1.5), json!(false)]],
        );
        assert!(xml.contains(r#"<c r="A2" t="inlineStr"><is><t xml:space="preserve">a&amp;b</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B2"><v>3</v></c>"#));
        assert!(xml.contains(r#"<c r="C2" t="b"><v>1</v></c>"#));
        assert!(!xml.contains(r#"r="A3""#));
        assert!(xml.contains(r#"<c r="B3"><v>1.5</v></c>"#));
    }

    #[test]
    fn written_workbook_is_readable() {
        use calamine::{open_workbook_auto, Data, Reader};
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.xlsx");
        write(&path, &["a".into(), "b".into()], &[vec![json!("x"), json!(2)]]).unwrap();

        let mut wb = open_workbook_auto(&path).unwrap();
        assert_eq!(wb.sheet_names(), vec![SHEET_NAME.to_string()]);
        let range = wb.worksheet_range(SHEET_NAME).unwrap();
        let rows: Vec<&[Data]> = range.rows().collect();
        assert_eq!(rows[0][0], Data::String("a".into()));
        assert_eq!(rows[1][0], Data::String("x".into()));
        assert_eq!(rows[1][1], Data::Float(2.0));
    }

    #[test]
    fn control_characters_do_not_reach_the_sheet() {
        use crate::pipeline::package::read_part;
        use calamine::{open_workbook_auto, Data, Reader};
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.xlsx");
        write(&path, &["note\u{b}".into()], &[vec![json!("bell\u{7}here")]]).unwrap();

        let sheet = read_part(&path, "xl/worksheets/sheet1.xml").unwrap().unwrap();
        assert!(!sheet.contains('\u{7}'));
        assert!(!sheet.contains('\u{b}'));

        let mut wb = open_workbook_auto(&path).unwrap();
        let range = wb.worksheet_range(SHEET_NAME).unwrap();
        let rows: Vec<&[Data]> = range.rows().collect();
        assert_eq!(rows[0][0], Data::String("note".into()));
        assert_eq!(rows[1][0], Data::String("bellhere".into()));
    }
}
