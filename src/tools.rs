//! External tool availability.
//!
//! docshift leans on four outside capabilities: pandoc, a headless office
//! suite, pdf2htmlEX and the pdfium library. Whether each one is usable is
//! decided once per [`Toolbox`] and then read without locking.
//!
//! ```text
//! Toolbox::availability()
//!   └─ OnceCell::get_or_init ─▶ ToolAvailability::probe(config)
//!         ├─ pandoc       <program> --version
//!         ├─ libreoffice  soffice --version, then libreoffice --version
//!         ├─ pdf2htmlEX   <program> --version
//!         └─ pdfium       bind shared library (spawn_blocking)
//! ```

use crate::config::EngineConfig;
use crate::format::{Domain, Format};
use crate::pipeline::pdf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// An external capability a handler may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// General-purpose document converter.
    Pandoc,
    /// LibreOffice running headless.
    OfficeSuite,
    /// PDF to HTML renderer.
    PdfToHtml,
    /// PDF engine used for text extraction and rasterisation.
    Pdfium,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Pandoc, Tool::OfficeSuite, Tool::PdfToHtml, Tool::Pdfium];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Pandoc => "pandoc",
            Tool::OfficeSuite => "libreoffice",
            Tool::PdfToHtml => "pdf2htmlEX",
            Tool::Pdfium => "pdfium",
        }
    }

    /// Program names tried, in order, when no override is configured.
    pub fn default_programs(self) -> &'static [&'static str] {
        match self {
            Tool::Pandoc => &["pandoc"],
            Tool::OfficeSuite => &["soffice", "libreoffice"],
            Tool::PdfToHtml => &["pdf2htmlEX"],
            Tool::Pdfium => &[],
        }
    }

    pub fn install_hint(self) -> &'static str {
        match self {
            Tool::Pandoc => "https://pandoc.org/installing.html",
            Tool::OfficeSuite => "https://www.libreoffice.org/download/",
            Tool::PdfToHtml => "https://github.com/pdf2htmlEX/pdf2htmlEX",
            Tool::Pdfium => "set PDFIUM_LIB_PATH to a libpdfium build",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How to reach a tool that answered its probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolLocation {
    /// Executable to spawn, or the shared library path for pdfium
    /// (`None` there means the system library).
    pub program: Option<PathBuf>,
}

impl ToolLocation {
    pub fn program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    pub fn system_library() -> Self {
        Self { program: None }
    }
}

/// Immutable snapshot of which tools are present.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolAvailability {
    entries: BTreeMap<Tool, Option<ToolLocation>>,
}

/// One absent tool and the conversions that are unreachable without it.
#[derive(Debug, Clone, Serialize)]
pub struct MissingDependency {
    pub tool: Tool,
    pub install_hint: &'static str,
    pub affects: Vec<AffectedConversion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedConversion {
    pub domain: Domain,
    pub from: Format,
    pub to: Format,
}

impl fmt::Display for AffectedConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}→{}", self.domain, self.from, self.to)
    }
}

impl ToolAvailability {
    /// Every tool absent. Native handlers still work.
    pub fn none() -> Self {
        Self::from_entries(Tool::ALL.into_iter().map(|t| (t, None)))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (Tool, Option<ToolLocation>)>) -> Self {
        let mut map: BTreeMap<Tool, Option<ToolLocation>> =
            Tool::ALL.into_iter().map(|t| (t, None)).collect();
        map.extend(entries);
        Self { entries: map }
    }

    /// Copy of `self` with `tool` marked present at `location`.
    pub fn with(mut self, tool: Tool, location: ToolLocation) -> Self {
        self.entries.insert(tool, Some(location));
        self
    }

    pub fn is_available(&self, tool: Tool) -> bool {
        self.location(tool).is_some()
    }

    pub fn location(&self, tool: Tool) -> Option<&ToolLocation> {
        self.entries.get(&tool).and_then(Option::as_ref)
    }

    /// Executable to spawn for `tool`, when it is present.
    pub fn program(&self, tool: Tool) -> Option<&Path> {
        self.location(tool).and_then(|l| l.program.as_deref())
    }

    pub fn missing(&self) -> Vec<Tool> {
        Tool::ALL
            .into_iter()
            .filter(|t| !self.is_available(*t))
            .collect()
    }

    /// Each absent tool with the conversion pairs it would have enabled.
    pub fn missing_dependency_report(&self) -> Vec<MissingDependency> {
        self.missing()
            .into_iter()
            .map(|tool| MissingDependency {
                tool,
                install_hint: tool.install_hint(),
                affects: crate::route::pairs_needing(tool, self)
                    .into_iter()
                    .map(|(domain, from, to)| AffectedConversion { domain, from, to })
                    .collect(),
            })
            .collect()
    }

    /// Probe every tool. Never fails: an unreachable tool is recorded as absent.
    pub async fn probe(config: &EngineConfig) -> Self {
        let timeout = config.probe_timeout();
        let mut entries = Vec::with_capacity(Tool::ALL.len());

        for tool in [Tool::Pandoc, Tool::OfficeSuite, Tool::PdfToHtml] {
            let candidates: Vec<PathBuf> = match config.program_for(tool) {
                Some(p) => vec![p.to_path_buf()],
                None => tool
                    .default_programs()
                    .iter()
                    .map(PathBuf::from)
                    .collect(),
            };
            let mut found = None;
            for candidate in candidates {
                if probe_program(&candidate, timeout).await {
                    found = Some(ToolLocation::program(candidate));
                    break;
                }
            }
            debug!("Probe {}: {}", tool, if found.is_some() { "present" } else { "absent" });
            entries.push((tool, found));
        }

        let library = config.pdfium_library.clone();
        let pdfium = tokio::task::spawn_blocking(move || pdf::bind(library.as_deref()).map(|_| library))
            .await
            .ok()
            .and_then(Result::ok)
            .map(|library| match library {
                Some(path) => ToolLocation::program(path),
                None => ToolLocation::system_library(),
            });
        debug!(
            "Probe {}: {}",
            Tool::Pdfium,
            if pdfium.is_some() { "present" } else { "absent" }
        );
        entries.push((Tool::Pdfium, pdfium));

        let availability = Self::from_entries(entries);
        for missing in availability.missing_dependency_report() {
            warn!(
                "{} not found; {} conversion(s) unavailable ({})",
                missing.tool,
                missing.affects.len(),
                missing.install_hint
            );
        }
        availability
    }
}

/// Spawn `<program> --version` with stdio discarded. Any exit status counts
/// as present; a spawn failure or a timeout counts as absent.
async fn probe_program(program: &Path, timeout: Duration) -> bool {
    let mut cmd = Command::new(program);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.status()).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Probe of '{}' failed to spawn: {}", program.display(), e);
            false
        }
        Err(_) => {
            debug!("Probe of '{}' timed out", program.display());
            false
        }
    }
}

/// Owns the probe result for one engine.
///
/// Probing happens at most once, on first use. [`Toolbox::refresh`] takes
/// `&mut self`, so a re-probe can never overlap readers.
#[derive(Debug)]
pub struct Toolbox {
    config: EngineConfig,
    cell: tokio::sync::OnceCell<ToolAvailability>,
}

impl Toolbox {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cell: tokio::sync::OnceCell::new(),
        }
    }

    /// A toolbox whose availability is fixed up front and never probed.
    pub fn with_availability(config: EngineConfig, availability: ToolAvailability) -> Self {
        Self {
            config,
            cell: tokio::sync::OnceCell::new_with(Some(availability)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn availability(&self) -> &ToolAvailability {
        self.cell
            .get_or_init(|| ToolAvailability::probe(&self.config))
            .await
    }

    /// Discard the cached snapshot and probe again.
    ///
    /// Only reachable on a toolbox nothing else shares; a
    /// [`ConverterFactory`](crate::ConverterFactory) is rebuilt with
    /// [`refresh_tools`](crate::ConverterFactory::refresh_tools) instead.
    pub async fn refresh(&mut self) -> &ToolAvailability {
        self.cell = tokio::sync::OnceCell::new();
        self.availability().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_marks_every_tool_missing() {
        let a = ToolAvailability::none();
        assert_eq!(a.missing(), Tool::ALL.to_vec());
        assert!(!a.is_available(Tool::Pandoc));
    }

    #[test]
    fn with_marks_tool_present() {
        let a = ToolAvailability::none().with(Tool::Pandoc, ToolLocation::program("/usr/bin/pandoc"));
        assert!(a.is_available(Tool::Pandoc));
        assert_eq!(a.program(Tool::Pandoc), Some(Path::new("/usr/bin/pandoc")));
        assert!(!a.missing().contains(&Tool::Pandoc));
    }

    #[test]
    fn system_pdfium_is_present_without_program() {
        let a = ToolAvailability::none().with(Tool::Pdfium, ToolLocation::system_library());
        assert!(a.is_available(Tool::Pdfium));
        assert_eq!(a.program(Tool::Pdfium), None);
    }

    #[test]
    fn report_lists_affected_pairs() {
        let report = ToolAvailability::none().missing_dependency_report();
        let pandoc = report.iter().find(|m| m.tool == Tool::Pandoc).unwrap();
        assert!(pandoc.affects.iter().any(|a| a.from == Format::Markdown && a.to == Format::Rtf));
        let office = report.iter().find(|m| m.tool == Tool::OfficeSuite).unwrap();
        assert!(office.affects.iter().any(|a| a.from == Format::Pptx && a.to == Format::Pdf));
    }

    #[tokio::test]
    async fn probe_of_missing_program_is_absent() {
        let present = probe_program(
            Path::new("/definitely/not/a/real/docshift-tool"),
            Duration::from_secs(2),
        )
        .await;
        assert!(!present);
    }

    #[tokio::test]
    async fn fixed_availability_is_not_probed() {
        let toolbox = Toolbox::with_availability(
            EngineConfig::default(),
            ToolAvailability::none().with(Tool::Pandoc, ToolLocation::program("pandoc")),
        );
        assert!(toolbox.availability().await.is_available(Tool::Pandoc));
        assert!(!toolbox.availability().await.is_available(Tool::OfficeSuite));
    }

    #[tokio::test]
    async fn refresh_replaces_the_snapshot() {
        let config = EngineConfig::builder()
            .probe_timeout_secs(2)
            .tool_program(Tool::Pandoc, "/definitely/not/a/real/pandoc")
            .build()
            .unwrap();
        let mut toolbox = Toolbox::with_availability(
            config,
            ToolAvailability::none().with(Tool::Pandoc, ToolLocation::program("pandoc")),
        );
        assert!(toolbox.availability().await.is_available(Tool::Pandoc));
        assert!(!toolbox.refresh().await.is_available(Tool::Pandoc));
    }
}
