//! One converter per domain, all sharing a [`Toolbox`].
//!
//! ## Conversion flow
//!
//! ```text
//! ConversionRequest
//!  │
//!  ├─ 1. Open      input must exist and be readable
//!  ├─ 2. Validate  input/target against the domain's capability table
//!  ├─ 3. Resolve   direct → chain → generic (route::resolve)
//!  ├─ 4. Execute   handler(s) write into a staging dir next to the output
//!  └─ 5. Persist   one rename moves the finished artifact into place
//! ```
//!
//! A failure anywhere before step 5 drops the staging directory, so no
//! partial output is ever left at the destination.

use crate::error::{ConvertError, Direction};
use crate::format::{Capabilities, Domain, Format};
use crate::options::ConversionOptions;
use crate::output::{Artifact, ConversionOutput};
use crate::pipeline::staging::Staging;
use crate::pipeline::{self, Step};
use crate::route::{self, Route};
use crate::tools::Toolbox;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A single conversion request.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub target: Format,
    /// Defaults to `<input stem>.<target ext>` next to the input.
    pub output: Option<PathBuf>,
    /// Overrides the format derived from the input extension.
    pub input_format: Option<Format>,
    pub options: ConversionOptions,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>, target: Format) -> Self {
        Self {
            input: input.into(),
            target,
            output: None,
            input_format: None,
            options: ConversionOptions::default(),
        }
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn input_format(mut self, format: Format) -> Self {
        self.input_format = Some(format);
        self
    }

    pub fn options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }
}

/// `<stem>.<target ext>` in the input's directory.
pub fn default_output(input: &Path, target: Format) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "output".into());
    let mut name = stem;
    name.push(".");
    name.push(target.extension());
    input.with_file_name(name)
}

/// Converts between the formats of one [`Domain`].
#[derive(Debug)]
pub struct Converter {
    domain: Domain,
    toolbox: Arc<Toolbox>,
}

impl Converter {
    pub fn new(domain: Domain, toolbox: Arc<Toolbox>) -> Self {
        Self { domain, toolbox }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        self.domain.capabilities()
    }

    pub fn supported_input_formats(&self) -> &'static [Format] {
        self.capabilities().inputs
    }

    pub fn supported_output_formats(&self) -> &'static [Format] {
        self.capabilities().outputs
    }

    /// Whether the capability table declares both ends of the pair.
    /// Says nothing about tool availability.
    pub fn declares(&self, from: Format, to: Format) -> bool {
        let caps = self.capabilities();
        caps.accepts(from) && caps.produces(to)
    }

    fn check_formats(&self, from: Format, to: Format) -> Result<(), ConvertError> {
        let caps = self.capabilities();
        if !caps.accepts(from) {
            return Err(ConvertError::UnsupportedFormat {
                format: from.to_string(),
                domain: self.domain,
                direction: Direction::Input,
            });
        }
        if !caps.produces(to) {
            return Err(ConvertError::UnsupportedFormat {
                format: to.to_string(),
                domain: self.domain,
                direction: Direction::Output,
            });
        }
        Ok(())
    }

    /// The route `convert` would take for this pair right now.
    pub async fn route(&self, from: Format, to: Format) -> Result<Route, ConvertError> {
        self.check_formats(from, to)?;
        route::resolve(self.domain, from, to, self.toolbox.availability().await)
    }

    fn input_format(&self, request: &ConversionRequest) -> Result<Format, ConvertError> {
        if let Some(f) = request.input_format {
            return Ok(f);
        }
        Format::from_path(&request.input).ok_or_else(|| ConvertError::UnsupportedFormat {
            format: request
                .input
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "(no extension)".to_string()),
            domain: self.domain,
            direction: Direction::Input,
        })
    }

    /// Convert one file.
    ///
    /// # Errors
    /// Every failure is fatal for this request; see [`ConvertError`].
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput, ConvertError> {
        let start = Instant::now();
        let input = request.input.as_path();

        // ── Step 1: Input must be readable ───────────────────────────────
        open_input(input).await?;

        // ── Step 2: Formats ──────────────────────────────────────────────
        let from = self.input_format(request)?;
        let to = request.target;
        self.check_formats(from, to)?;

        let output = request
            .output
            .clone()
            .unwrap_or_else(|| default_output(input, to));
        info!(
            "Converting {} ({} → {}) to {}",
            input.display(),
            from,
            to,
            output.display()
        );

        // ── Step 3: Route ────────────────────────────────────────────────
        let tools = self.toolbox.availability().await;
        let route = route::resolve(self.domain, from, to, tools)?;
        debug!("Route for {} → {}: {}", from, to, route);

        // ── Step 4: Execute into staging ─────────────────────────────────
        let config = self.toolbox.config();
        let staging = Staging::next_to(&output).await?;
        let file_name = output
            .file_name()
            .ok_or_else(|| ConvertError::InvalidConfig(format!("output '{}' has no file name", output.display())))?;
        let staged = staging.file(file_name);

        let step = Step {
            input,
            output: &staged,
            from,
            to,
            domain: self.domain,
            options: &request.options,
            config,
            tools,
            staging: &staging,
        };

        match route {
            Route::Direct(handler) => pipeline::run_handler(handler, &step).await?,
            Route::Generic(tool) => pipeline::run_generic(tool, &step).await?,
            Route::Chain {
                first,
                intermediate,
                second,
            } => {
                if let Some(root) = config.temp_dir.as_deref() {
                    tokio::fs::create_dir_all(root)
                        .await
                        .map_err(|e| ConvertError::write(root, e))?;
                }
                let scratch = staging.scratch(".chain-", config.temp_dir.as_deref())?;
                let mid = scratch
                    .path()
                    .join(default_output(input, intermediate).file_name().unwrap_or(file_name));
                debug!("Chain intermediate: {}", mid.display());

                let hop1 = Step {
                    output: &mid,
                    to: intermediate,
                    ..step
                };
                pipeline::run_handler(first, &hop1).await?;

                let hop2 = Step {
                    input: &mid,
                    from: intermediate,
                    ..step
                };
                pipeline::run_handler(second, &hop2).await?;
                // scratch drops here, removing the intermediate.
            }
        }

        if tokio::fs::symlink_metadata(&staged).await.is_err() {
            return Err(ConvertError::Internal(format!(
                "route {route} finished without producing '{}'",
                staged.display()
            )));
        }

        // ── Step 5: Persist ──────────────────────────────────────────────
        staging.persist(&staged, &output).await?;

        let artifact = if to.is_raster() {
            Artifact::Directory {
                members: list_members(&output).await?,
                path: output,
            }
        } else {
            Artifact::File { path: output }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Converted {} → {} via {} in {}ms",
            input.display(),
            artifact.path().display(),
            route.kind(),
            duration_ms
        );

        Ok(ConversionOutput {
            artifact,
            format: to,
            route: route.kind(),
            duration_ms,
        })
    }
}

async fn open_input(path: &Path) -> Result<(), ConvertError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| pipeline::read_error(path, e))?;
    let meta = file
        .metadata()
        .await
        .map_err(|e| pipeline::read_error(path, e))?;
    if !meta.is_file() {
        return Err(ConvertError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Files of a fan-out directory, in page order.
async fn list_members(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConvertError::write(dir, e))?;
    let mut members = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConvertError::write(dir, e))?
    {
        members.push(entry.path());
    }
    members.sort();
    Ok(members)
}
