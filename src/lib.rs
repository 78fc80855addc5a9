//! # edgequake-docextract
//!
//! Split files that hold several documents, classify each document against
//! a two-level taxonomy and extract its fields with LLMs.
//!
//! ## Why this crate?
//!
//! Scanned batches rarely contain one document per file: an ID card is
//! followed by a household registration page, an invoice by its contract.
//! This crate asks a model where one document ends and the next begins,
//! corrects the page references it gets back, and runs a schema-driven
//! extraction per document, so one file comes back as a list of typed records.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file / URL
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Select    native text, vision (OCR by the model) or tabular loader
//!  ├─ 3. Count     physical pages via pdfium (1 for non-paginated files)
//!  ├─ 4. Segment   eager split or lazy boundary detection (multi-page only)
//!  ├─ 5. Sanitize  clamp hallucinated pages, drop duplicates
//!  ├─ 6. Classify  category → document type → schema
//!  ├─ 7. Extract   concurrent per-document field extraction
//!  └─ 8. Output    {"documents": [...], "error": null}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docextract::{Pipeline, PipelineConfig, Taxonomy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / GEMINI_API_KEY / …
//!     let config = PipelineConfig::builder().concurrency(4).build()?;
//!     let pipeline = Pipeline::new(config, Taxonomy::builtin())?;
//!     let result = pipeline.run("scans/batch-01.pdf").await;
//!     for doc in &result.documents {
//!         println!("{:?}/{:?} on {} page(s)", doc.category, doc.doc_type, doc.debug.pages);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docextract` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docextract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod taxonomy;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_MODEL};
pub use document::{Content, DocumentGroup, Modality, Page, PageContent};
pub use error::{DocExtractError, InferenceError, LoaderError, SegmentError, SegmentationError};
pub use inference::{Classification, Inference, LlmInference};
pub use output::{BatchResult, DebugInfo, ExtractedDocument, FileResult, PipelineResult};
pub use pipeline::loader::{DocumentSource, FileSystemSource};
pub use pipeline::select::{LoaderKind, LoaderSelection};
pub use process::{process, process_from_bytes, process_sync, Pipeline};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use taxonomy::{Schema, SchemaField, Taxonomy, TaxonomyNode};
