//! Two-level classification: category first, then document type.
//!
//! ```text
//! content ──► categories (incl. catch-all)
//!               │ none       → no category
//!               │ catch-all  → category only, stop
//!               │ leaf       → category only, stop
//!               ▼
//!             children of the category
//!               │ none       → category only
//!               ▼
//!             doc type + bound schema
//! ```
//!
//! Confidence is reported, never thresholded.

use crate::document::{Content, Modality};
use crate::error::InferenceError;
use crate::inference::Inference;
use crate::taxonomy::{Schema, Taxonomy, TaxonomyNode};
use tracing::debug;

/// One classification call's outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult<'t> {
    pub label: String,
    pub confidence: Option<f64>,
    /// `None` for categories and the catch-all.
    pub schema: Option<&'t Schema>,
}

/// Category and document type for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentClassification<'t> {
    pub category: Option<String>,
    pub doc_type: Option<String>,
    pub schema: Option<&'t Schema>,
    /// Confidence of the deepest level that matched.
    pub confidence: Option<f64>,
}

pub struct Classifier<'a> {
    taxonomy: &'a Taxonomy,
    inference: &'a dyn Inference,
}

impl<'a> Classifier<'a> {
    pub fn new(taxonomy: &'a Taxonomy, inference: &'a dyn Inference) -> Self {
        Self {
            taxonomy,
            inference,
        }
    }

    /// Classify `content` against `candidates`.
    pub async fn classify(
        &self,
        content: &Content,
        candidates: &[&'a TaxonomyNode],
        modality: Modality,
    ) -> Result<Option<ClassificationResult<'a>>, InferenceError> {
        let Some(hit) = self.inference.classify(content, candidates, modality).await? else {
            return Ok(None);
        };
        Ok(candidates
            .iter()
            .copied()
            .find(|c| c.name == hit.label)
            .map(|node| ClassificationResult {
                label: node.name.clone(),
                confidence: hit.confidence,
                schema: node.schema.as_ref(),
            }))
    }

    /// Run both stages for a whole document.
    pub async fn classify_document(
        &self,
        content: &Content,
        modality: Modality,
    ) -> Result<DocumentClassification<'a>, InferenceError> {
        let categories: Vec<&'a TaxonomyNode> = self.taxonomy.categories().iter().collect();
        let Some(category) = self.classify(content, &categories, modality).await? else {
            debug!("No category matched");
            return Ok(DocumentClassification::default());
        };

        let mut result = DocumentClassification {
            category: Some(category.label.clone()),
            confidence: category.confidence,
            ..Default::default()
        };

        let children: Vec<&'a TaxonomyNode> =
            self.taxonomy.children_of(&category.label).iter().collect();
        if self.taxonomy.is_catch_all(&category.label) || children.is_empty() {
            debug!("Category {} has no document types; stopping", category.label);
            return Ok(result);
        }

        match self.classify(content, &children, modality).await? {
            Some(doc_type) => {
                debug!("Classified as {}/{}", category.label, doc_type.label);
                result.doc_type = Some(doc_type.label);
                result.schema = doc_type.schema;
                result.confidence = doc_type.confidence;
            }
            None => debug!("No document type under {} matched", category.label),
        }
        Ok(result)
    }
}
