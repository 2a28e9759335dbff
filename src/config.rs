//! Engine-wide configuration.
//!
//! Everything that is not specific to one request lives in [`EngineConfig`]:
//! timeouts for external tools, batch concurrency, raster settings and the
//! program paths used to invoke each tool. Build it through
//! [`EngineConfig::builder()`] or read it from the environment with
//! [`EngineConfig::from_env()`].

use crate::error::ConvertError;
use crate::tools::Tool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration shared by every converter a factory builds.
///
/// # Example
/// ```rust
/// use docshift::{EngineConfig, Tool};
///
/// let config = EngineConfig::builder()
///     .tool_timeout_secs(60)
///     .batch_concurrency(8)
///     .tool_program(Tool::OfficeSuite, "/opt/libreoffice/program/soffice")
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_concurrency, 8);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock limit for one external tool invocation, in seconds. Default: 120.
    ///
    /// The child process is killed when the limit is hit and the conversion
    /// fails with [`ConvertError::ToolTimeout`].
    pub tool_timeout_secs: u64,

    /// Limit for one `--version` availability probe, in seconds. Default: 10.
    pub probe_timeout_secs: u64,

    /// Number of batch items converted at the same time. Default: 4.
    pub batch_concurrency: usize,

    /// Resolution used when rasterising PDF pages to PNG/JPEG. Range: 72–600. Default: 150.
    pub raster_dpi: u32,

    /// Cap on either dimension of a rendered page, in pixels. Default: 4000.
    ///
    /// Applied after the DPI scale, so a poster-sized page never allocates
    /// an unbounded bitmap.
    pub max_rendered_pixels: u32,

    /// Path to the pdfium shared library, or the directory holding it.
    /// Default: the system library search path.
    pub pdfium_library: Option<PathBuf>,

    /// Program overrides per tool. Tools without an entry use their default
    /// program names (`pandoc`, `soffice`/`libreoffice`, `pdf2htmlEX`).
    pub tool_programs: BTreeMap<Tool, PathBuf>,

    /// Root for chain intermediates. Default: the staging directory next to
    /// the output.
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 120,
            probe_timeout_secs: 10,
            batch_concurrency: 4,
            raster_dpi: 150,
            max_rendered_pixels: 4000,
            pdfium_library: None,
            tool_programs: BTreeMap::new(),
            temp_dir: None,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read configuration from `DOCSHIFT_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `DOCSHIFT_TOOL_TIMEOUT` | `tool_timeout_secs` |
    /// | `DOCSHIFT_PROBE_TIMEOUT` | `probe_timeout_secs` |
    /// | `DOCSHIFT_CONCURRENCY` | `batch_concurrency` |
    /// | `DOCSHIFT_DPI` | `raster_dpi` |
    /// | `DOCSHIFT_PANDOC`, `DOCSHIFT_SOFFICE`, `DOCSHIFT_PDF2HTMLEX` | `tool_programs` |
    /// | `DOCSHIFT_TEMP_DIR` | `temp_dir` |
    /// | `PDFIUM_LIB_PATH` | `pdfium_library` |
    pub fn from_env() -> Result<Self, ConvertError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] but with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConvertError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut b = Self::builder();

        if let Some(v) = get("DOCSHIFT_TOOL_TIMEOUT") {
            b = b.tool_timeout_secs(parse_number("DOCSHIFT_TOOL_TIMEOUT", &v)?);
        }
        if let Some(v) = get("DOCSHIFT_PROBE_TIMEOUT") {
            b = b.probe_timeout_secs(parse_number("DOCSHIFT_PROBE_TIMEOUT", &v)?);
        }
        if let Some(v) = get("DOCSHIFT_CONCURRENCY") {
            b = b.batch_concurrency(parse_number("DOCSHIFT_CONCURRENCY", &v)?);
        }
        if let Some(v) = get("DOCSHIFT_DPI") {
            b = b.raster_dpi(parse_number("DOCSHIFT_DPI", &v)?);
        }
        for (key, tool) in [
            ("DOCSHIFT_PANDOC", Tool::Pandoc),
            ("DOCSHIFT_SOFFICE", Tool::OfficeSuite),
            ("DOCSHIFT_PDF2HTMLEX", Tool::PdfToHtml),
        ] {
            if let Some(v) = get(key) {
                b = b.tool_program(tool, v);
            }
        }
        if let Some(v) = get("DOCSHIFT_TEMP_DIR") {
            b = b.temp_dir(v);
        }
        if let Some(v) = get("PDFIUM_LIB_PATH") {
            b = b.pdfium_library(v);
        }
        b.build()
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// The configured program for `tool`, if overridden.
    pub fn program_for(&self, tool: Tool) -> Option<&Path> {
        self.tool_programs.get(&tool).map(PathBuf::as_path)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConvertError> {
    value.trim().parse().map_err(|_| {
        ConvertError::InvalidConfig(format!("{key} must be a positive number, got '{value}'"))
    })
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.config.batch_concurrency = n.max(1);
        self
    }

    pub fn raster_dpi(mut self, dpi: u32) -> Self {
        self.config.raster_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    /// Invoke `tool` through `program` instead of its default name.
    pub fn tool_program(mut self, tool: Tool, program: impl Into<PathBuf>) -> Self {
        self.config.tool_programs.insert(tool, program.into());
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, ConvertError> {
        let c = &self.config;
        if c.tool_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Tool timeout must be ≥ 1 second".into(),
            ));
        }
        if c.probe_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Probe timeout must be ≥ 1 second".into(),
            ));
        }
        if c.raster_dpi < 72 || c.raster_dpi > 600 {
            return Err(ConvertError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.raster_dpi
            )));
        }
        if c.tool_programs.contains_key(&Tool::Pdfium) {
            return Err(ConvertError::InvalidConfig(
                "pdfium is a library; set pdfium_library instead of a program".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.tool_timeout_secs, 120);
        assert_eq!(c.probe_timeout_secs, 10);
        assert_eq!(c.batch_concurrency, 4);
        assert_eq!(c.raster_dpi, 150);
        assert!(c.tool_programs.is_empty());
    }

    #[test]
    fn builder_clamps_dpi_and_concurrency() {
        let c = EngineConfig::builder()
            .raster_dpi(1200)
            .batch_concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.raster_dpi, 600);
        assert_eq!(c.batch_concurrency, 1);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = EngineConfig::builder().tool_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn pdfium_program_override_rejected() {
        let err = EngineConfig::builder()
            .tool_program(Tool::Pdfium, "/usr/bin/pdfium")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("pdfium_library"));
    }

    #[test]
    fn from_lookup_reads_variables() {
        let vars: HashMap<&str, &str> = [
            ("DOCSHIFT_TOOL_TIMEOUT", "30"),
            ("DOCSHIFT_CONCURRENCY", "2"),
            ("DOCSHIFT_SOFFICE", "/opt/lo/soffice"),
            ("PDFIUM_LIB_PATH", "/opt/pdfium/lib"),
            ("DOCSHIFT_DPI", ""),
        ]
        .into_iter()
        .collect();
        let c = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.tool_timeout_secs, 30);
        assert_eq!(c.batch_concurrency, 2);
        assert_eq!(c.raster_dpi, 150);
        assert_eq!(
            c.program_for(Tool::OfficeSuite),
            Some(Path::new("/opt/lo/soffice"))
        );
        assert_eq!(c.pdfium_library.as_deref(), Some(Path::new("/opt/pdfium/lib")));
    }

    #[test]
    fn from_lookup_rejects_garbage_numbers() {
        let err = EngineConfig::from_lookup(|k| {
            (k == "DOCSHIFT_CONCURRENCY").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("DOCSHIFT_CONCURRENCY"));
    }
}
