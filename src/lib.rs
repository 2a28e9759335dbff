//! # docshift
//!
//! Convert documents, presentations and spreadsheets between formats,
//! natively where possible and through external tools where not.
//!
//! ## How a conversion is routed
//!
//! ```text
//! (input, target)
//!  │
//!  ├─ 1. Direct   a handler for the exact pair (native Rust, or one tool)
//!  ├─ 2. Chain    two handlers through an intermediate format
//!  ├─ 3. Generic  pandoc (documents, slides) or LibreOffice (spreadsheets)
//!  └─ 4. Error    CapabilityUnavailable, naming the tools that are missing
//! ```
//!
//! Markdown, HTML, plain text, DOCX and every tabular format are handled in
//! process. PDF text and page images come from pdfium. Legacy office formats
//! go through a headless LibreOffice, and PDF → HTML through pdf2htmlEX.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docshift::{ConversionRequest, ConverterFactory, EngineConfig, Format};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = ConverterFactory::new(EngineConfig::from_env()?);
//!     let request = ConversionRequest::new("notes.md", Format::Docx);
//!     let output = factory.converter_for(&request).convert(&request).await?;
//!     eprintln!("{} via {} in {}ms", output.path().display(), output.route, output.duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docshift` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docshift = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod converter;
pub mod error;
pub mod factory;
pub mod format;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod route;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::BatchConverter;
pub use config::{EngineConfig, EngineConfigBuilder};
pub use convert::{convert, convert_sync};
pub use converter::{ConversionRequest, Converter};
pub use error::{ConvertError, Direction, ErrorKind, Stage};
pub use factory::{ConverterFactory, FormatKey};
pub use format::{Capabilities, Domain, Format};
pub use options::{
    ConversionOptions, ConversionOptionsBuilder, DocumentOptions, PresentationOptions,
    SheetSelector, SpreadsheetOptions,
};
pub use output::{Artifact, BatchFailure, BatchOutput, BatchSuccess, ConversionOutput};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use route::{Handler, Route, RouteKind};
pub use tools::{MissingDependency, Tool, ToolAvailability, ToolLocation, Toolbox};
