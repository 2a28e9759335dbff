//! Smoke tests for the `docshift` binary.
#![cfg(feature = "cli")]

use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn docshift() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_docshift"));
    // Keep probes from finding whatever happens to be installed.
    cmd.env("DOCSHIFT_PANDOC", "/nonexistent/pandoc")
        .env("DOCSHIFT_SOFFICE", "/nonexistent/soffice")
        .env("DOCSHIFT_PDF2HTMLEX", "/nonexistent/pdf2htmlEX")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn convert_writes_next_to_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("prices.csv");
    fs::write(&input, "item,price\ntea,2\n").unwrap();

    let status = docshift()
        .args(["-q", "convert"])
        .arg(&input)
        .args(["--to", "markdown"])
        .status()
        .unwrap();

    assert!(status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("prices.md")).unwrap(),
        "| item | price |\n| --- | --- |\n| tea | 2 |\n"
    );
}

#[test]
fn convert_reports_json() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.md");
    fs::write(&input, "# Hi\n").unwrap();

    let out = docshift()
        .arg("convert")
        .arg(&input)
        .args(["--to", "html", "--json"])
        .output()
        .unwrap();

    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["route"], "direct");
    assert_eq!(value["format"], "html");
}

#[test]
fn missing_tool_fails_with_its_name() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.md");
    fs::write(&input, "# Hi\n").unwrap();

    let out = docshift()
        .arg("convert")
        .arg(&input)
        .args(["--to", "rtf"])
        .output()
        .unwrap();

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("pandoc"));
}

#[test]
fn batch_exits_non_zero_when_an_item_fails() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("a.csv");
    fs::write(&good, "k,v\n1,2\n").unwrap();
    let out_dir = dir.path().join("out");

    let out = docshift()
        .args(["batch", "--no-progress", "--to", "json", "--out-dir"])
        .arg(&out_dir)
        .arg(&good)
        .arg(dir.path().join("missing.csv"))
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    assert!(out_dir.join("a.json").exists());
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing.csv"));
}

#[test]
fn formats_lists_every_domain() {
    let out = docshift().args(["formats", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    for domain in ["document", "presentation", "spreadsheet"] {
        assert!(value[domain]["inputs"].is_array(), "{domain}");
    }
    assert!(value["spreadsheet"]["outputs"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("xlsx")));
}

#[test]
fn doctor_reports_missing_tools() {
    let out = docshift().args(["doctor", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let missing: Vec<&str> = value["missing"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["tool"].as_str())
        .collect();
    assert!(missing.contains(&"pandoc"));
    assert!(missing.contains(&"office_suite"));
}
