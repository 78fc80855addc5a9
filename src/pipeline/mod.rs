//! Pipeline stages for segmentation, classification and extraction.
//!
//! Each submodule implements one step. The orchestrator in
//! [`crate::process`] wires them together; nothing here knows about the
//! others' internals.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ select ──▶ loader ──▶ segment ──▶ sanitize ──▶ classify ──▶ extract
//! (path/URL) (probe)  (pages)    (groups)    (clamp)     (2 levels)   (fields)
//! ```
//!
//! 1. [`input`]    — canonicalise the path or URL to a local file, detect its kind
//! 2. [`select`]   — choose native-text, vision or tabular page acquisition
//! 3. [`loader`]   — the [`loader::DocumentSource`] seam; reads pages via
//!    [`render`] (pdfium), [`encode`] (base64 images) and [`sheet`] (calamine)
//! 4. [`segment`]  — eager split or lazy boundary detection into groups
//! 5. [`sanitize`] — repair out-of-range and duplicate page references
//! 6. [`classify`] — category, then document type, then the bound schema
//! 7. [`extract`]  — fill the schema and normalise the answer
//!
//! [`postprocess`] repairs raw model output before any JSON is parsed.

pub mod classify;
pub mod encode;
pub mod extract;
pub mod input;
pub mod loader;
pub mod postprocess;
pub mod render;
pub mod sanitize;
pub mod segment;
pub mod select;
pub mod sheet;
