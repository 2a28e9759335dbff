//! Progress events for batch conversions.
//!
//! Hand an [`Arc<dyn BatchProgressCallback>`] to
//! [`crate::BatchConverter::with_progress`] to hear about each item as the
//! batch runs. Items run concurrently, so events for different items may
//! arrive interleaved and from different threads.
//!
//! # Example
//!
//! ```rust
//! use docshift::BatchProgressCallback;
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_item_complete(&self, input: &Path, output: &Path) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("[{done}] {} -> {}", input.display(), output.display());
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

/// Receives batch events. Every method defaults to a no-op.
///
/// Implementations must be `Send + Sync`; guard shared mutable state with
/// atomics or a `Mutex`.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any item starts.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    fn on_item_start(&self, input: &Path) {
        let _ = input;
    }

    /// Called when an item converted. `output` is the artifact location.
    fn on_item_complete(&self, input: &Path, output: &Path) {
        let _ = (input, output);
    }

    /// Called when an item failed. The batch carries on.
    fn on_item_error(&self, input: &Path, error: &str) {
        let _ = (input, error);
    }

    /// Called once after every item has finished.
    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        started: AtomicUsize,
        completed: AtomicUsize,
        errors: Mutex<Vec<String>>,
        summary: Mutex<Option<(usize, usize)>>,
    }

    impl BatchProgressCallback for Recorder {
        fn on_item_start(&self, _input: &Path) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_complete(&self, _input: &Path, _output: &Path) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_error(&self, input: &Path, error: &str) {
            self.errors
                .lock()
                .unwrap()
                .push(format!("{}: {error}", input.display()));
        }

        fn on_batch_complete(&self, succeeded: usize, failed: usize) {
            *self.summary.lock().unwrap() = Some((succeeded, failed));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_item_start(Path::new("a.md"));
        cb.on_item_complete(Path::new("a.md"), Path::new("a.html"));
        cb.on_item_error(Path::new("b.md"), "missing");
        cb.on_batch_complete(1, 1);
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_item_start(Path::new("a.csv"));
        rec.on_item_complete(Path::new("a.csv"), Path::new("a.json"));
        rec.on_item_start(Path::new("b.csv"));
        rec.on_item_error(Path::new("b.csv"), "not found");
        rec.on_batch_complete(1, 1);

        assert_eq!(rec.started.load(Ordering::SeqCst), 2);
        assert_eq!(rec.completed.load(Ordering::SeqCst), 1);
        assert_eq!(rec.errors.lock().unwrap().as_slice(), ["b.csv: not found"]);
        assert_eq!(*rec.summary.lock().unwrap(), Some((1, 1)));
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_item_start(Path::new("x.pdf"));
    }
}
