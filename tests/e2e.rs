//! End-to-end tests against the real external tools.
//!
//! Gated behind `DOCSHIFT_E2E` so they do not run in CI unless requested.
//! Each test also skips itself when a tool it needs is not installed.
//!
//! Run with:
//!   DOCSHIFT_E2E=1 cargo test --test e2e -- --nocapture

use docshift::{
    ConversionOptions, ConversionRequest, ConverterFactory, EngineConfig, Format, RouteKind, Tool,
};
use std::fs;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip unless `DOCSHIFT_E2E` is set and every listed tool answered its probe.
macro_rules! e2e_skip_unless_ready {
    ($factory:expr, $($tool:expr),+) => {{
        if std::env::var("DOCSHIFT_E2E").is_err() {
            println!("SKIP: set DOCSHIFT_E2E=1 to run e2e tests");
            return;
        }
        let tools = $factory.toolbox().availability().await;
        $(
            if !tools.is_available($tool) {
                println!("SKIP: {} not installed ({})", $tool, $tool.install_hint());
                return;
            }
        )+
    }};
}

fn factory() -> ConverterFactory {
    let config = EngineConfig::from_env().expect("DOCSHIFT_* variables must be valid");
    ConverterFactory::new(config)
}

/// Sorted file names directly inside `dir`, hidden entries included.
fn listing(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

const REPORT: &str = "# Quarterly report\n\nRevenue grew in every region.\n\n## Outlook\n\nSteady.\n";

// ── Office suite ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn markdown_to_pdf_through_docx() {
    let f = factory();
    e2e_skip_unless_ready!(f, Tool::OfficeSuite);

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("report.md");
    fs::write(&input, REPORT).unwrap();

    let req = ConversionRequest::new(&input, Format::Pdf);
    let out = f.converter_for(&req).convert(&req).await.unwrap();

    assert_eq!(out.route, RouteKind::Chain);
    let bytes = fs::read(out.path()).unwrap();
    assert!(bytes.starts_with(b"%PDF"), "not a PDF");
}

#[tokio::test]
async fn spreadsheet_to_legacy_xls() {
    let f = factory();
    e2e_skip_unless_ready!(f, Tool::OfficeSuite);

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("grid.csv");
    fs::write(&input, "x,y\n1,2\n3,4\n").unwrap();

    let req = ConversionRequest::new(&input, Format::Xls);
    let xls = f.converter_for(&req).convert(&req).await.unwrap();

    // Read it back natively.
    let back = ConversionRequest::new(xls.path(), Format::Csv).output(dir.path().join("back.csv"));
    let out = f.converter_for(&back).convert(&back).await.unwrap();
    assert_eq!(fs::read_to_string(out.path()).unwrap(), "x,y\n1,2\n3,4\n");
}

// ── PDF engine ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_text_and_page_images() {
    let f = factory();
    e2e_skip_unless_ready!(f, Tool::OfficeSuite, Tool::Pdfium);

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("report.md");
    fs::write(&input, REPORT).unwrap();
    let req = ConversionRequest::new(&input, Format::Pdf);
    let pdf = f.converter_for(&req).convert(&req).await.unwrap();

    let text = ConversionRequest::new(pdf.path(), Format::Txt);
    let out = f.converter_for(&text).convert(&text).await.unwrap();
    let extracted = fs::read_to_string(out.path()).unwrap();
    println!("{extracted}");
    assert!(extracted.contains("Quarterly report"));
    assert!(extracted.contains("Revenue grew"));

    let options = ConversionOptions::builder().image_quality(60).build().unwrap();
    let images = ConversionRequest::new(pdf.path(), Format::Jpeg).options(options);
    let out = f.converter_for(&images).convert(&images).await.unwrap();
    let files = out.artifact.files();
    assert!(!files.is_empty());
    for file in files {
        let img = image::open(file).unwrap();
        assert!(img.width() > 0 && img.height() > 0);
    }
}

#[tokio::test]
async fn slides_to_png() {
    let f = factory();
    e2e_skip_unless_ready!(f, Tool::Pandoc, Tool::OfficeSuite, Tool::Pdfium);

    let dir = TempDir::new().unwrap();
    let html = dir.path().join("deck.html");
    fs::write(
        &html,
        "<html><body><h1>One</h1><p>first</p><h1>Two</h1><p>second</p></body></html>",
    )
    .unwrap();

    let to_pptx = ConversionRequest::new(&html, Format::Pptx);
    let deck = f.converter_for(&to_pptx).convert(&to_pptx).await.unwrap();
    assert_eq!(deck.route, RouteKind::Generic);

    let to_png = ConversionRequest::new(deck.path(), Format::Png);
    let out = f.converter_for(&to_png).convert(&to_png).await.unwrap();
    assert_eq!(out.route, RouteKind::Chain);
    assert!(out.path().is_dir());
    assert!(out.artifact.files().len() >= 2);

    // The intermediate PDF never reaches the output directory.
    assert_eq!(listing(dir.path()), vec!["deck.html", "deck.png", "deck.pptx"]);
    for page in listing(out.path()) {
        assert!(!page.ends_with(".pdf"), "{page}");
    }
}

// ── pdf2htmlEX ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_to_html_renders_pages() {
    let f = factory();
    e2e_skip_unless_ready!(f, Tool::OfficeSuite, Tool::PdfToHtml);

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("report.md");
    fs::write(&input, REPORT).unwrap();
    let req = ConversionRequest::new(&input, Format::Pdf);
    let pdf = f.converter_for(&req).convert(&req).await.unwrap();

    let html = ConversionRequest::new(pdf.path(), Format::Html);
    let out = f
        .converter(docshift::Domain::Presentation)
        .convert(&html)
        .await
        .unwrap();
    assert_eq!(out.route, RouteKind::Direct);
    assert!(fs::read_to_string(out.path()).unwrap().contains("<html"));
}
