//! CLI binary for docshift.
//!
//! A thin shim over the library crate that maps CLI flags onto
//! `EngineConfig` and `ConversionOptions` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docshift::{
    BatchConverter, BatchProgressCallback, ConversionOptions, ConversionRequest,
    ConverterFactory, Domain, EngineConfig, Format, ProgressCallback, SheetSelector, Tool,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for `docshift batch`: one bar plus a log line per item.
/// Items finish out of order, so start times are keyed by input path.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<PathBuf, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed(&self, input: &Path) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(input))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} file(s)…"))
        ));
    }

    fn on_item_start(&self, input: &Path) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(input.to_path_buf(), Instant::now());
        }
        self.bar.set_message(display_name(input));
    }

    fn on_item_complete(&self, input: &Path, output: &Path) {
        let secs = self.elapsed(input);
        self.bar.println(format!(
            "  {} {}  →  {}  {}",
            green("✓"),
            display_name(input),
            dim(&output.display().to_string()),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, input: &Path, error: &str) {
        let secs = self.elapsed(input);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            display_name(input),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        self.bar.finish_and_clear();
        let total = succeeded + failed;
        if failed == 0 {
            eprintln!(
                "{} {} file(s) converted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} file(s) converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown to Word, output next to the input
  docshift convert notes.md --to docx

  # Explicit output path and a reference style sheet
  docshift convert notes.md --to docx -o out/notes.docx --style-template house.docx

  # Second worksheet of a workbook to CSV with semicolons
  docshift convert ledger.xlsx --to csv --sheet 1 --delimiter ';'

  # Every slide of a deck as PNG
  docshift convert deck.pptx --to png

  # A folder of CSV files to JSON
  docshift batch data/*.csv --to json --out-dir json/

  # What is installed, and what is missing
  docshift doctor

ROUTING:
  1. direct   a handler for the exact pair
  2. chain    two handlers through an intermediate format
  3. generic  pandoc (documents, slides) or LibreOffice (spreadsheets)
  Otherwise the conversion fails and names the missing tools.

ENVIRONMENT VARIABLES:
  DOCSHIFT_TOOL_TIMEOUT   Seconds an external tool may run (default 120)
  DOCSHIFT_PROBE_TIMEOUT  Seconds a --version probe may take (default 10)
  DOCSHIFT_CONCURRENCY    Batch items converted at once (default 4)
  DOCSHIFT_DPI            Raster resolution for page images (default 150)
  DOCSHIFT_PANDOC         pandoc executable
  DOCSHIFT_SOFFICE        LibreOffice executable
  DOCSHIFT_PDF2HTMLEX     pdf2htmlEX executable
  DOCSHIFT_TEMP_DIR       Root for chain intermediates
  PDFIUM_LIB_PATH         pdfium shared library or its directory
  RUST_LOG                Overrides the log filter
"#;

/// Convert documents, presentations and spreadsheets between formats.
#[derive(Parser, Debug)]
#[command(
    name = "docshift",
    version,
    about = "Convert documents, presentations and spreadsheets between formats",
    long_about = "Convert documents, presentations and spreadsheets between formats. \
Markdown, HTML, text, DOCX and tabular formats are handled natively; legacy office \
formats, RTF/ODT and PDF rendering go through LibreOffice, pandoc, pdf2htmlEX and pdfium \
when they are installed.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    engine: EngineArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSHIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSHIFT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one file.
    Convert {
        /// File to convert.
        input: PathBuf,

        /// Target format (e.g. docx, markdown, png, json).
        #[arg(short, long)]
        to: Format,

        /// Output path. Default: <input stem>.<ext> next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input format, when the extension is missing or misleading.
        #[arg(long)]
        from: Option<Format>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Convert many files into one directory.
    Batch {
        /// Files to convert.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target format.
        #[arg(short, long)]
        to: Format,

        /// Directory receiving <stem>.<ext> for every input.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Disable progress bar.
        #[arg(long, env = "DOCSHIFT_NO_PROGRESS")]
        no_progress: bool,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// List the formats each converter reads and writes.
    Formats {
        #[arg(long)]
        json: bool,
    },

    /// Probe external tools and list what is unreachable without them.
    Doctor {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Seconds an external tool may run before it is killed.
    #[arg(long, global = true, env = "DOCSHIFT_TOOL_TIMEOUT", default_value_t = 120)]
    tool_timeout: u64,

    /// Seconds a tool probe may take.
    #[arg(long, global = true, env = "DOCSHIFT_PROBE_TIMEOUT", default_value_t = 10)]
    probe_timeout: u64,

    /// Batch items converted at once.
    #[arg(short, long, global = true, env = "DOCSHIFT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Raster resolution for page images (72–600).
    #[arg(long, global = true, env = "DOCSHIFT_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// pandoc executable.
    #[arg(long, global = true, env = "DOCSHIFT_PANDOC")]
    pandoc: Option<PathBuf>,

    /// LibreOffice executable.
    #[arg(long, global = true, env = "DOCSHIFT_SOFFICE")]
    soffice: Option<PathBuf>,

    /// pdf2htmlEX executable.
    #[arg(long, global = true, env = "DOCSHIFT_PDF2HTMLEX")]
    pdf2htmlex: Option<PathBuf>,

    /// pdfium shared library, or the directory holding it.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// Root for chain intermediates.
    #[arg(long, global = true, env = "DOCSHIFT_TEMP_DIR")]
    temp_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OptionArgs {
    /// Plain paragraphs in DOCX and an HTML fragment instead of a page.
    #[arg(long)]
    no_preserve_formatting: bool,

    /// DOCX whose styles are copied into generated DOCX files.
    #[arg(long)]
    style_template: Option<PathBuf>,

    /// JPEG quality for page images (1–100).
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    image_quality: u8,

    /// Worksheet to read: a zero-based index or a sheet name.
    #[arg(long)]
    sheet: Option<String>,

    /// Field delimiter for csv/tsv: a single character or `tab`.
    #[arg(long, value_parser = parse_delimiter_arg)]
    delimiter: Option<u8>,

    /// Text encoding for delimited and JSON files.
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// Write a leading row-index column.
    #[arg(long)]
    include_index: bool,
}

fn parse_delimiter_arg(s: &str) -> std::result::Result<u8, String> {
    docshift::options::parse_delimiter(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are hidden while the batch progress bar is drawing.
    let show_progress = match &cli.command {
        Command::Batch { no_progress, .. } => !cli.quiet && !no_progress,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli.engine).context("Invalid configuration")?;
    let factory = ConverterFactory::new(config);

    match cli.command {
        Command::Convert {
            input,
            to,
            output,
            from,
            json,
            options,
        } => {
            let options = build_options(&options).context("Invalid conversion options")?;
            let mut request = ConversionRequest::new(&input, to).options(options);
            if let Some(out) = output {
                request = request.output(out);
            }
            if let Some(from) = from {
                request = request.input_format(from);
            }

            let result = factory
                .converter_for(&request)
                .convert(&request)
                .await
                .with_context(|| format!("Failed to convert {}", input.display()))?;

            if json {
                let text =
                    serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
                println!("{text}");
            } else if !cli.quiet {
                eprintln!(
                    "{} {}  {}",
                    green("✔"),
                    bold(&result.path().display().to_string()),
                    dim(&format!("{} route, {}ms", result.route, result.duration_ms)),
                );
                for file in result.artifact.files().iter().skip(1) {
                    eprintln!("   {}", dim(&file.display().to_string()));
                }
            }
        }

        Command::Batch {
            inputs,
            to,
            out_dir,
            options,
            ..
        } => {
            let options = build_options(&options).context("Invalid conversion options")?;
            let probe = ConversionRequest::new(inputs[0].clone(), to);
            let mut runner = BatchConverter::new(
                factory.converter_for(&probe),
                factory.config().batch_concurrency,
            );
            if show_progress {
                let cb: ProgressCallback = CliProgressCallback::new();
                runner = runner.with_progress(cb);
            }

            let result = runner.convert_batch(&inputs, to, &out_dir, &options).await;

            if !cli.quiet && !show_progress {
                eprintln!(
                    "Converted {}/{} file(s)",
                    result.succeeded.len(),
                    result.total()
                );
            }
            if !result.failed.is_empty() {
                eprintln!("{}", bold("Failed:"));
                for failure in &result.failed {
                    eprintln!(
                        "  {} {}  {}",
                        red("✗"),
                        failure.input.display(),
                        red(&failure.error.to_string())
                    );
                }
                std::process::exit(1);
            }
        }

        Command::Formats { json } => print_formats(json)?,

        Command::Doctor { json } => {
            let availability = factory.toolbox().availability().await;
            let report = availability.missing_dependency_report();
            if json {
                let value = json!({
                    "tools": availability,
                    "missing": report,
                });
                let text =
                    serde_json::to_string_pretty(&value).context("Failed to serialise report")?;
                println!("{text}");
            } else {
                println!("{}", bold("External tools"));
                for tool in Tool::ALL {
                    match availability.location(tool) {
                        Some(loc) => {
                            let place = loc
                                .program
                                .as_ref()
                                .map(|p| p.display().to_string())
                                .unwrap_or_else(|| "system library".to_string());
                            println!("  {} {:<12} {}", green("✓"), tool.name(), dim(&place));
                        }
                        None => println!(
                            "  {} {:<12} {}",
                            red("✗"),
                            tool.name(),
                            dim(tool.install_hint())
                        ),
                    }
                }
                for missing in &report {
                    if missing.affects.is_empty() {
                        continue;
                    }
                    println!();
                    println!("{}", bold(&format!("Unavailable without {}", missing.tool)));
                    for pair in &missing.affects {
                        println!("  {pair}");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Map engine flags to `EngineConfig`.
fn build_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder()
        .tool_timeout_secs(args.tool_timeout)
        .probe_timeout_secs(args.probe_timeout)
        .batch_concurrency(args.concurrency)
        .raster_dpi(args.dpi);

    for (tool, program) in [
        (Tool::Pandoc, &args.pandoc),
        (Tool::OfficeSuite, &args.soffice),
        (Tool::PdfToHtml, &args.pdf2htmlex),
    ] {
        if let Some(p) = program {
            builder = builder.tool_program(tool, p);
        }
    }
    if let Some(ref lib) = args.pdfium {
        builder = builder.pdfium_library(lib);
    }
    if let Some(ref dir) = args.temp_dir {
        builder = builder.temp_dir(dir);
    }

    Ok(builder.build()?)
}

/// Map option flags to `ConversionOptions`.
fn build_options(args: &OptionArgs) -> Result<ConversionOptions> {
    let mut builder = ConversionOptions::builder()
        .preserve_formatting(!args.no_preserve_formatting)
        .image_quality(args.image_quality)
        .encoding(args.encoding.clone())
        .include_row_index(args.include_index);

    if let Some(ref template) = args.style_template {
        builder = builder.style_template(template);
    }
    if let Some(ref sheet) = args.sheet {
        builder = builder.sheet(parse_sheet(sheet));
    }
    if let Some(d) = args.delimiter {
        builder = builder.delimiter(d);
    }

    Ok(builder.build()?)
}

/// A bare number selects by position, anything else by name.
fn parse_sheet(s: &str) -> SheetSelector {
    match s.trim().parse::<usize>() {
        Ok(i) => SheetSelector::Index(i),
        Err(_) => SheetSelector::Name(s.to_string()),
    }
}

fn print_formats(as_json: bool) -> Result<()> {
    if as_json {
        let mut map = serde_json::Map::new();
        for domain in Domain::ALL {
            map.insert(
                domain.name().to_string(),
                serde_json::to_value(domain.capabilities())
                    .context("Failed to serialise capabilities")?,
            );
        }
        let text = serde_json::to_string_pretty(&map).context("Failed to serialise formats")?;
        println!("{text}");
        return Ok(());
    }

    let list = |formats: &[Format]| {
        formats
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join(", ")
    };
    for domain in Domain::ALL {
        let caps = domain.capabilities();
        println!("{}", bold(domain.name()));
        println!("  {}  {}", dim("reads "), list(caps.inputs));
        println!("  {}  {}", dim("writes"), list(caps.outputs));
    }
    Ok(())
}
