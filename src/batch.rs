//! Batch conversion: many inputs, one converter, per-item isolation.
//!
//! Items run concurrently, bounded by
//! [`EngineConfig::batch_concurrency`](crate::EngineConfig::batch_concurrency).
//! A failing item is recorded in [`BatchOutput::failed`] with its input path
//! and never stops the others. Results come back in completion order.

use crate::converter::{default_output, ConversionRequest, Converter};
use crate::error::ConvertError;
use crate::format::Format;
use crate::options::ConversionOptions;
use crate::output::{BatchFailure, BatchOutput, BatchSuccess, ConversionOutput};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct BatchConverter {
    converter: Arc<Converter>,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl BatchConverter {
    pub fn new(converter: Arc<Converter>, concurrency: usize) -> Self {
        Self {
            converter,
            concurrency: concurrency.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn converter(&self) -> &Arc<Converter> {
        &self.converter
    }

    /// Convert every input to `target`, writing `output_dir/<stem>.<ext>`.
    ///
    /// Never fails as a whole. An output directory that cannot be created
    /// shows up as a write failure on every item.
    pub async fn convert_batch(
        &self,
        inputs: &[PathBuf],
        target: Format,
        output_dir: &Path,
        options: &ConversionOptions,
    ) -> BatchOutput {
        let start = Instant::now();
        let total = inputs.len();
        info!(
            "Batch of {} item(s) → {} into {}",
            total,
            target,
            output_dir.display()
        );
        if let Some(ref cb) = self.progress {
            cb.on_batch_start(total);
        }

        let results: Vec<(PathBuf, Result<ConversionOutput, ConvertError>)> =
            stream::iter(inputs.iter().cloned().map(|input| {
                let output = output_path(&input, output_dir, target);
                let request = ConversionRequest::new(input.clone(), target)
                    .output(output)
                    .options(options.clone());
                let converter = Arc::clone(&self.converter);
                let progress = self.progress.clone();
                async move {
                    if let Some(ref cb) = progress {
                        cb.on_item_start(&input);
                    }
                    let result = converter.convert(&request).await;
                    if let Some(ref cb) = progress {
                        match &result {
                            Ok(out) => cb.on_item_complete(&input, out.path()),
                            Err(e) => cb.on_item_error(&input, &e.to_string()),
                        }
                    }
                    (input, result)
                }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut batch = BatchOutput::default();
        for (input, result) in results {
            match result {
                Ok(output) => batch.succeeded.push(BatchSuccess { input, output }),
                Err(error) => {
                    warn!("Batch item {} failed: {}", input.display(), error);
                    batch.failed.push(BatchFailure { input, error });
                }
            }
        }

        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(batch.succeeded.len(), batch.failed.len());
        }
        info!(
            "Batch finished in {}ms: {} succeeded, {} failed",
            start.elapsed().as_millis(),
            batch.succeeded.len(),
            batch.failed.len()
        );
        batch
    }
}

fn output_path(input: &Path, output_dir: &Path, target: Format) -> PathBuf {
    let name = default_output(input, target);
    match name.file_name() {
        Some(file) => output_dir.join(file),
        None => output_dir.join(format!("output.{}", target.extension())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::ErrorKind;
    use crate::format::Domain;
    use crate::progress::BatchProgressCallback;
    use crate::tools::{ToolAvailability, Toolbox};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn batch(domain: Domain) -> BatchConverter {
        let toolbox = Toolbox::with_availability(EngineConfig::default(), ToolAvailability::none());
        BatchConverter::new(Arc::new(Converter::new(domain, Arc::new(toolbox))), 2)
    }

    #[test]
    fn outputs_land_in_output_dir() {
        assert_eq!(
            output_path(Path::new("/in/a.csv"), Path::new("/out"), Format::Json),
            PathBuf::from("/out/a.json")
        );
    }

    #[derive(Default)]
    struct Counts {
        done: AtomicUsize,
        failed: AtomicUsize,
    }

    impl BatchProgressCallback for Counts {
        fn on_item_complete(&self, _input: &Path, _output: &Path) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_error(&self, _input: &Path, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn one_bad_item_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        let c = dir.path().join("c.csv");
        std::fs::write(&a, "x,y\n1,2\n").unwrap();
        std::fs::write(&c, "x,y\n3,4\n").unwrap();
        let out_dir = dir.path().join("out");

        let counts = Arc::new(Counts::default());
        let runner = batch(Domain::Spreadsheet).with_progress(counts.clone());
        let result = runner
            .convert_batch(
                &[a.clone(), b.clone(), c.clone()],
                Format::Json,
                &out_dir,
                &ConversionOptions::default(),
            )
            .await;

        assert_eq!(result.succeeded.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].input, b);
        assert_eq!(result.failed[0].error.kind(), ErrorKind::InputNotFound);
        assert!(out_dir.join("a.json").exists());
        assert!(out_dir.join("c.json").exists());
        assert_eq!(counts.done.load(Ordering::SeqCst), 2);
        assert_eq!(counts.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let result = batch(Domain::Document)
            .convert_batch(&[], Format::Html, dir.path(), &ConversionOptions::default())
            .await;
        assert_eq!(result.total(), 0);
    }
}
