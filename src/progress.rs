//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::DocFillConfigBuilder::progress_callback`] to receive
//! events while a document batch is being extracted.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docfill::{BatchProgressCallback, DocFillConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, file_name: &str) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}/{total} done ({file_name}, #{index})");
//!     }
//! }
//!
//! let config = DocFillConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch processor as it extracts each document.
///
/// Extractions run concurrently, so `on_document_*` may be called from
/// different tasks in any order. Implementations must protect shared
/// mutable state (`Mutex`, atomics). Every method defaults to a no-op.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any document is sent for extraction.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before the extraction request for a document.
    ///
    /// `index` is the 0-based upload position.
    fn on_document_start(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called when a document yielded a record.
    fn on_document_complete(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called when a document yielded no record.
    fn on_document_error(&self, index: usize, total: usize, file_name: &str, error: &str) {
        let _ = (index, total, file_name, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total: usize, extracted: usize) {
        let _ = (total, extracted);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DocFillConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        extracted: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_document_start(&self, _index: usize, _total: usize, _file_name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _index: usize, _total: usize, _file_name: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _index: usize, _total: usize, _file_name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, extracted: usize) {
            self.extracted.store(extracted, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start(0, 2, "a.jpg");
        cb.on_document_complete(0, 2, "a.jpg");
        cb.on_document_error(1, 2, "b.pdf", "timeout");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_through_arc_dyn() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_batch_start(3);
        cb.on_document_start(0, 3, "a.jpg");
        cb.on_document_complete(0, 3, "a.jpg");
        cb.on_document_start(1, 3, "b.jpg");
        cb.on_document_complete(1, 3, "b.jpg");
        cb.on_document_start(2, 3, "c.pdf");
        cb.on_document_error(2, 3, "c.pdf", "empty response");
        cb.on_batch_complete(3, 2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.extracted.load(Ordering::SeqCst), 2);
    }
}
