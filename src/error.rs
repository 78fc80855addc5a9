//! Error types for the edgequake-docextract library.
//!
//! Failures are split by how far their damage reaches:
//!
//! * [`DocExtractError`] — **Fatal**: the run cannot produce anything
//!   (missing file, both segmentation modalities failed, no provider).
//!   The orchestrator turns it into `PipelineResult.error`.
//!
//! * [`SegmentError`] — **Non-fatal**: one document group failed to
//!   classify or extract. Sibling groups are unaffected; the failure is
//!   reported to progress callbacks and logged.
//!
//! * [`SegmentationError`] — the splitter's own result type. It carries a
//!   structured reason so the orchestrator can branch on a modality
//!   mismatch without inspecting message text.
//!
//! * [`InferenceError`] and [`LoaderError`] — what the two external
//!   collaborators (model and page loader) return to the pipeline.

use crate::document::Modality;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docextract library.
#[derive(Debug, Error)]
pub enum DocExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File does not exist: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The selected loader could not read the file's pages.
    #[error("Could not load '{path}' with the {loader} loader: {source}")]
    LoadFailed {
        path: PathBuf,
        loader: &'static str,
        #[source]
        source: LoaderError,
    },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Segmentation failed for the primary modality and, when enabled, the fallback.
    #[error("Segmentation failed: {0}")]
    SegmentationFailed(#[source] SegmentationError),

    /// Classifying a single-page document failed at the inference layer.
    #[error("Classification failed: {0}")]
    ClassificationFailed(#[source] InferenceError),

    /// Extraction of a single-page document timed out.
    #[error("Extraction timed out after {secs}s")]
    ExtractionTimeout { secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A taxonomy file is malformed or breaks the two-level shape.
    #[error("Invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why the segmentation engine could not produce document groups.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SegmentationError {
    /// The splitter needs content of one modality but the pages carry another.
    #[error("splitter expects {expected} content but pages are {found}")]
    ModalityMismatch { expected: Modality, found: Modality },

    /// Any other splitter failure.
    #[error("{0}")]
    Failed(String),
}

/// Failure returned by an [`crate::inference::Inference`] implementation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    /// The call did not return within the configured deadline.
    #[error("inference call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider rejected the request after all retries.
    #[error("inference API error after {retries} retries: {message}")]
    Api { retries: u32, message: String },

    /// The model answered but the answer is not the JSON we asked for.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// The service cannot handle content of this modality.
    #[error("{0} content is not supported by this inference service")]
    UnsupportedModality(Modality),
}

impl InferenceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, InferenceError::Timeout { .. })
    }
}

/// Failure while acquiring pages from a file.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    /// The PDF is encrypted and no (or a wrong) password was supplied.
    #[error("PDF is encrypted; provide the password with --password")]
    PasswordRequired,

    #[error("image error: {0}")]
    Image(String),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("pdfium unavailable: {0}")]
    Pdfium(String),

    #[error("file content is not text: {0}")]
    NotText(String),

    #[error("page {index} is out of range (file has {total})")]
    PageOutOfRange { index: usize, total: usize },
}

/// A non-fatal error for a single document group.
///
/// The run continues; the group is either reduced to its classification
/// (no data) or omitted, depending on the variant.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SegmentError {
    /// The group carried no usable classification label.
    #[error("Group {group}: not classified")]
    Unclassified { group: usize },

    /// The label names nothing in the taxonomy.
    #[error("Group {group}: unknown document type '{label}'")]
    UnknownLabel { group: usize, label: String },

    /// The extractor failed; the group is kept without data.
    #[error("Group {group}: extraction failed: {detail}")]
    ExtractionFailed { group: usize, detail: String },

    /// The extractor timed out; the group is omitted.
    #[error("Group {group}: extraction timed out after {secs}s")]
    Timeout { group: usize, secs: u64 },

    /// The group's pages could not be re-read; the group is omitted.
    #[error("Group {group}: pages unreadable: {detail}")]
    Unreadable { group: usize, detail: String },
}
