//! The inference seam: every model call the pipeline makes goes through
//! [`Inference`].
//!
//! [`LlmInference`] is the production implementation on top of an
//! `edgequake_llm` provider. Tests substitute a scripted implementation so
//! the orchestrator can be exercised without network access.

mod llm;

pub use llm::{resolve_provider, LlmInference};

use crate::document::{Content, DocumentGroup, Modality, Page};
use crate::error::{InferenceError, SegmentationError};
use crate::taxonomy::{Schema, TaxonomyNode};
use async_trait::async_trait;
use serde_json::Value;

/// A label picked out of a candidate list.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Always the `name` of one of the candidates offered.
    pub label: String,
    pub confidence: Option<f64>,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Model-backed operations used by the pipeline.
#[async_trait]
pub trait Inference: Send + Sync {
    /// Pick the candidate that best describes `content`.
    ///
    /// `Ok(None)` means no candidate fits. Implementations must never return
    /// a label outside `candidates`.
    async fn classify(
        &self,
        content: &Content,
        candidates: &[&TaxonomyNode],
        modality: Modality,
    ) -> Result<Option<Classification>, InferenceError>;

    /// Fill `schema` from `content`. The returned value is raw model output
    /// (already parsed as JSON); the extractor adapter normalises it.
    async fn extract(
        &self,
        content: &Content,
        schema: &Schema,
        modality: Modality,
    ) -> Result<Value, InferenceError>;

    /// Split all pages of a file into labelled groups in one call.
    ///
    /// Page indices in the result are not trusted by the caller.
    async fn split(
        &self,
        pages: &[Page],
        candidates: &[&TaxonomyNode],
        modality: Modality,
    ) -> Result<Vec<DocumentGroup>, SegmentationError>;

    /// Whether `next` continues the document that `prev` belongs to.
    async fn same_document(
        &self,
        prev: &Page,
        next: &Page,
        modality: Modality,
    ) -> Result<bool, SegmentationError>;
}
