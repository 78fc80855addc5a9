//! Progress-callback trait for run and per-group events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to follow a
//! run as it segments the input and extracts each group.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docextract::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl PipelineProgressCallback for Counter {
//!     fn on_group_complete(&self, _group: usize, _total: usize, _doc_type: Option<&str>) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it works through one input.
///
/// Group events may fire concurrently when `concurrency > 1`, so
/// implementations must guard shared state. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Loader chosen and pages counted.
    fn on_run_start(&self, input: &str, total_pages: usize, loader: &str) {
        let _ = (input, total_pages, loader);
    }

    /// Segmentation and sanitization finished with `groups` candidates.
    fn on_segmented(&self, groups: usize) {
        let _ = groups;
    }

    /// Extraction for group `group` (1-based) is about to start.
    fn on_group_start(&self, group: usize, total: usize) {
        let _ = (group, total);
    }

    /// Group produced a document.
    fn on_group_complete(&self, group: usize, total: usize, doc_type: Option<&str>) {
        let _ = (group, total, doc_type);
    }

    /// Group failed; the run continues.
    fn on_group_error(&self, group: usize, total: usize, error: &str) {
        let _ = (group, total, error);
    }

    /// Run finished with `documents` documents (0 on failure).
    fn on_run_complete(&self, documents: usize, error: Option<&str>) {
        let _ = (documents, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
