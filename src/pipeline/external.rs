//! Running external tools as child processes.
//!
//! Every invocation gets a null stdin, piped stdout/stderr, `kill_on_drop`
//! and a wall-clock timeout. When the timeout fires the future holding the
//! child is dropped, which kills the process.

use crate::error::ConvertError;
use crate::tools::Tool;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error};

/// Longest stderr excerpt kept in [`ConvertError::ToolFailed`].
const STDERR_LIMIT: usize = 2000;

/// One prepared tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub tool: Tool,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(tool: Tool, program: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run to completion. Non-zero exit, spawn failure and timeout are all
    /// reported as external tool failures.
    pub async fn run(&self, timeout: Duration) -> Result<std::process::Output, ConvertError> {
        let start = Instant::now();
        debug!(
            "Running {}: {} {:?}",
            self.tool,
            self.program.display(),
            self.args
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let code = output.status.code().unwrap_or(-1);
                    let stderr: String = String::from_utf8_lossy(&output.stderr)
                        .trim()
                        .chars()
                        .take(STDERR_LIMIT)
                        .collect();
                    error!("{} exited with code {}: {}", self.tool, code, stderr);
                    return Err(ConvertError::ToolFailed {
                        tool: self.tool,
                        code,
                        stderr,
                    });
                }
                debug!(
                    "{} finished in {}ms",
                    self.tool,
                    start.elapsed().as_millis()
                );
                Ok(output)
            }
            Ok(Err(e)) => {
                error!("Failed to start {} ('{}'): {}", self.tool, self.program.display(), e);
                Err(ConvertError::ToolSpawn {
                    tool: self.tool,
                    source: e,
                })
            }
            Err(_) => {
                error!("{} timed out after {}s", self.tool, timeout.as_secs());
                Err(ConvertError::ToolTimeout {
                    tool: self.tool,
                    secs: timeout.as_secs(),
                })
            }
        }
    }
}

/// Fail with [`ConvertError::ToolOutputMissing`] unless `expected` exists.
pub async fn expect_output(tool: Tool, expected: &Path) -> Result<(), ConvertError> {
    match tokio::fs::metadata(expected).await {
        Ok(_) => Ok(()),
        Err(_) => Err(ConvertError::ToolOutputMissing {
            tool,
            expected: expected.to_path_buf(),
        }),
    }
}
