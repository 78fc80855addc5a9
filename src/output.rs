//! Output types returned by the pipeline.
//!
//! The JSON shape is a public contract consumed by the CLI and batch
//! wrappers:
//!
//! ```json
//! {"documents": [{"category": "identity", "docType": "national_id",
//!                 "data": {...}, "confidence": 0.93,
//!                 "_debug": {"loader": "vision", "vision": true, "pages": 1}}],
//!  "error": null}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loader and page provenance attached to each document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub loader: String,
    pub vision: bool,
    pub pages: usize,
}

/// One finished logical document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub category: Option<String>,
    #[serde(rename = "docType")]
    pub doc_type: Option<String>,
    pub data: Option<Map<String, Value>>,
    pub confidence: Option<f64>,
    #[serde(rename = "_debug")]
    pub debug: DebugInfo,
}

/// Top-level result of one run.
///
/// `error` is only ever set together with an empty `documents` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub documents: Vec<ExtractedDocument>,
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn success(documents: Vec<ExtractedDocument>) -> Self {
        Self {
            documents,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            documents: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Documents that carry extracted data.
    pub fn extracted(&self) -> impl Iterator<Item = &ExtractedDocument> {
        self.documents.iter().filter(|d| d.data.is_some())
    }
}

/// One entry of a multi-file run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub input: String,
    #[serde(flatten)]
    pub result: PipelineResult,
    pub duration_ms: u64,
}

/// Output of a multi-file run, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub results: Vec<FileResult>,
}
