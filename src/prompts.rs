//! Prompts for classification, extraction and splitting.
//!
//! Every instruction the model sees is defined here so the inference layer
//! only deals with transport, retries and parsing. Each prompt asks for a
//! single JSON object; [`crate::pipeline::postprocess`] repairs the usual
//! deviations (fences, prose, concatenated objects).

use crate::taxonomy::{Schema, TaxonomyNode};

/// System prompt for picking one label out of a candidate list.
pub const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are a document classification engine for scanned and digital administrative documents.

You receive the content of ONE document (text, page images, or both) and a list of candidate labels, each with a description.

Rules:
1. Choose exactly one label from the candidate list, copied verbatim.
2. If no candidate fits, answer with "label": null.
3. "confidence" is your probability that the label is correct, between 0 and 1.
4. Output ONLY a JSON object: {"label": "<name>" | null, "confidence": <number>}
5. Do NOT wrap the JSON in ``` fences and do NOT add commentary."#;

/// System prompt for filling a schema from document content.
pub const EXTRACT_SYSTEM_PROMPT: &str = r#"You are a precise data extraction engine for Vietnamese and international administrative documents.

You receive the content of ONE document and a JSON template. Each template key is a field to fill; its value describes the field.

Rules:
1. Return a JSON object with exactly the template's keys.
2. Copy values as they appear in the document, keeping diacritics. All values are strings.
3. Use null for fields that are absent or unreadable. Never invent values.
4. For list fields, return an array of objects shaped like the template's single example item.
5. Output ONLY the JSON object. Do NOT wrap it in ``` fences and do NOT add commentary."#;

/// System prompt for splitting a whole file into logical documents.
pub const SPLIT_SYSTEM_PROMPT: &str = r#"You are a document splitting engine. A single file may contain several logical documents (for example an ID card scan followed by an invoice and a contract).

You receive every page of the file, in order, and a list of document types.

Rules:
1. Group the pages into logical documents. Every page belongs to exactly one group.
2. Page numbers are 1-based and must refer to pages you were given.
3. Label each group with one document type name from the list, copied verbatim.
4. Output ONLY a JSON object:
   {"documents": [{"label": "<name>", "pages": [1, 2], "confidence": <0..1>}]}
5. List groups in the order they appear in the file. Do NOT add commentary."#;

/// System prompt for deciding whether two consecutive pages belong together.
pub const BOUNDARY_SYSTEM_PROMPT: &str = r#"You are a document boundary detector.

You receive two consecutive pages of a file. Decide whether the second page continues the same logical document as the first page, or starts a new document.

Signals of a new document: a new title or letterhead, a different document kind, a different person or party, page numbering restarting at 1.

Output ONLY a JSON object: {"same_document": true | false}"#;

fn candidate_lines(candidates: &[&TaxonomyNode]) -> String {
    candidates
        .iter()
        .map(|c| format!("- {}: {}", c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// User message for a classification call.
pub fn classify_request(candidates: &[&TaxonomyNode], text: &str) -> String {
    let mut msg = format!("Candidate labels:\n{}\n", candidate_lines(candidates));
    if !text.trim().is_empty() {
        msg.push_str("\nDocument content:\n\"\"\"\n");
        msg.push_str(text);
        msg.push_str("\n\"\"\"");
    } else {
        msg.push_str("\nThe document is provided as images.");
    }
    msg
}

/// User message for an extraction call.
pub fn extract_request(schema: &Schema, text: &str) -> String {
    let template = serde_json::to_string_pretty(&schema.template()).unwrap_or_default();
    let mut msg = format!("Document type: {}\n\nJSON template:\n{}\n", schema.name, template);
    if !text.trim().is_empty() {
        msg.push_str("\nDocument content:\n\"\"\"\n");
        msg.push_str(text);
        msg.push_str("\n\"\"\"");
    }
    msg
}

/// User message for a whole-file split call.
pub fn split_request(candidates: &[&TaxonomyNode], page_count: usize, text: &str) -> String {
    let mut msg = format!(
        "Document types:\n{}\n\nThe file has {} pages.",
        candidate_lines(candidates),
        page_count
    );
    if !text.trim().is_empty() {
        msg.push_str("\n\nPages:\n");
        msg.push_str(text);
    } else {
        msg.push_str(" The page images follow in order.");
    }
    msg
}

/// User message for a boundary decision between pages `first` and `first + 1`.
pub fn boundary_request(first: usize, text: &str) -> String {
    let mut msg = format!(
        "Does page {} continue the document that page {} belongs to?",
        first + 1,
        first
    );
    if !text.trim().is_empty() {
        msg.push_str("\n\n");
        msg.push_str(text);
    }
    msg
}
