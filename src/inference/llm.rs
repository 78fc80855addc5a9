//! LLM-backed [`Inference`]: build chat messages, call the provider, parse
//! the JSON answer.
//!
//! ## Retry Strategy
//!
//! Provider errors (HTTP 429 / 503 under concurrent load) are retried with
//! exponential backoff (`retry_backoff_ms * 2^attempt`): 500 ms → 1 s → 2 s
//! with the defaults. A call that exceeds `api_timeout_secs` is not retried;
//! the caller decides whether a timeout is fatal.

use crate::config::{PipelineConfig, DEFAULT_MODEL};
use crate::document::{Content, DocumentGroup, Modality, Page};
use crate::error::{DocExtractError, InferenceError, SegmentationError};
use crate::inference::{Classification, Inference};
use crate::pipeline::postprocess::{first_object, first_object_where, json_values};
use crate::prompts::{
    boundary_request, classify_request, extract_request, split_request, BOUNDARY_SYSTEM_PROMPT,
    CLASSIFY_SYSTEM_PROMPT, EXTRACT_SYSTEM_PROMPT, SPLIT_SYSTEM_PROMPT,
};
use crate::taxonomy::{Schema, TaxonomyNode};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Longest page range accepted from a `"a-b"` page spec.
const MAX_PAGE_RANGE: usize = 10_000;

/// [`Inference`] on top of an `edgequake_llm` chat provider.
pub struct LlmInference {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
    vision_enabled: bool,
}

impl LlmInference {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
            vision_enabled: config.vision_enabled,
        }
    }

    /// Resolve the provider from `config` (see [`resolve_provider`]).
    pub fn from_config(config: &PipelineConfig) -> Result<Self, DocExtractError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    /// Images to attach for `modality`.
    fn images_for(&self, content: &Content, modality: Modality) -> Result<Vec<ImageData>, InferenceError> {
        match modality {
            Modality::Text => Ok(Vec::new()),
            Modality::Vision if !self.vision_enabled => {
                Err(InferenceError::UnsupportedModality(Modality::Vision))
            }
            Modality::Vision => Ok(content.images.clone()),
        }
    }

    /// The splitter only works on pages of the modality it was asked for.
    fn check_pages<'a>(
        &self,
        pages: impl IntoIterator<Item = &'a Page>,
        modality: Modality,
    ) -> Result<(), SegmentationError> {
        if modality.is_vision() && !self.vision_enabled {
            return Err(SegmentationError::ModalityMismatch {
                expected: Modality::Text,
                found: Modality::Vision,
            });
        }
        for page in pages {
            let found = page.content.modality();
            if found != modality {
                return Err(SegmentationError::ModalityMismatch {
                    expected: modality,
                    found,
                });
            }
        }
        Ok(())
    }

    /// One chat round trip with retries. Returns the raw answer text.
    async fn complete(
        &self,
        task: &str,
        system: &str,
        user: &str,
        images: Vec<ImageData>,
    ) -> Result<String, InferenceError> {
        let start = Instant::now();
        let user_message = if images.is_empty() {
            ChatMessage::user(user)
        } else {
            ChatMessage::user_with_images(user, images)
        };
        let messages = vec![ChatMessage::system(system), user_message];
        let options = self.options();

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    task, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Err(_) => {
                    warn!("{}: no answer within {}s", task, self.api_timeout_secs);
                    return Err(InferenceError::Timeout {
                        secs: self.api_timeout_secs,
                    });
                }
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        task,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("{}: attempt {} failed: {}", task, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(InferenceError::Api {
            retries: self.max_retries,
            message: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[async_trait]
impl Inference for LlmInference {
    async fn classify(
        &self,
        content: &Content,
        candidates: &[&TaxonomyNode],
        modality: Modality,
    ) -> Result<Option<Classification>, InferenceError> {
        let images = self.images_for(content, modality)?;
        let user = classify_request(candidates, &content.text);
        let raw = self
            .complete("classify", CLASSIFY_SYSTEM_PROMPT, &user, images)
            .await?;
        parse_classification(&raw, candidates)
    }

    async fn extract(
        &self,
        content: &Content,
        schema: &Schema,
        modality: Modality,
    ) -> Result<Value, InferenceError> {
        let images = self.images_for(content, modality)?;
        let user = extract_request(schema, &content.text);
        let task = format!("extract {}", schema.name);
        let raw = self
            .complete(&task, EXTRACT_SYSTEM_PROMPT, &user, images)
            .await?;
        first_object(&raw)
            .map(Value::Object)
            .ok_or_else(|| InferenceError::MalformedOutput(snippet(&raw)))
    }

    async fn split(
        &self,
        pages: &[Page],
        candidates: &[&TaxonomyNode],
        modality: Modality,
    ) -> Result<Vec<DocumentGroup>, SegmentationError> {
        self.check_pages(pages, modality)?;
        let content = Content::from_pages(pages);
        let images = if modality.is_vision() {
            content.images.clone()
        } else {
            Vec::new()
        };
        let user = split_request(candidates, pages.len(), &content.text);
        let raw = self
            .complete("split", SPLIT_SYSTEM_PROMPT, &user, images)
            .await
            .map_err(|e| SegmentationError::Failed(e.to_string()))?;
        parse_groups(&raw, candidates)
    }

    async fn same_document(
        &self,
        prev: &Page,
        next: &Page,
        modality: Modality,
    ) -> Result<bool, SegmentationError> {
        self.check_pages([prev, next], modality)?;
        let content = Content::from_pages([prev, next]);
        let images = if modality.is_vision() {
            content.images.clone()
        } else {
            Vec::new()
        };
        let user = boundary_request(prev.index, &content.text);
        let task = format!("boundary {}/{}", prev.index, next.index);
        let raw = self
            .complete(&task, BOUNDARY_SYSTEM_PROMPT, &user, images)
            .await
            .map_err(|e| SegmentationError::Failed(e.to_string()))?;
        parse_boundary(&raw)
    }
}

// ── Provider resolution ──────────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI key present** (`OPENAI_API_KEY`), with `config.model` or
///    [`DEFAULT_MODEL`].
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, DocExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY, or pass --provider and --model.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Answer parsing ───────────────────────────────────────────────────────────

fn snippet(raw: &str) -> String {
    let mut s: String = raw.chars().take(200).collect();
    if s.len() < raw.len() {
        s.push('…');
    }
    s
}

/// Map a model-supplied label onto a candidate name.
fn canonical_label<'a>(label: &str, candidates: &[&'a TaxonomyNode]) -> Option<&'a str> {
    let label = label.trim();
    candidates
        .iter()
        .copied()
        .find(|c| c.name == label)
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .find(|c| c.name.eq_ignore_ascii_case(label))
        })
        .map(|c| c.name.as_str())
}

fn parse_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn label_field(obj: &Map<String, Value>) -> Option<&Value> {
    obj.get("label").or_else(|| obj.get("name"))
}

pub(crate) fn parse_classification(
    raw: &str,
    candidates: &[&TaxonomyNode],
) -> Result<Option<Classification>, InferenceError> {
    let obj = first_object_where(raw, |m| label_field(m).is_some())
        .ok_or_else(|| InferenceError::MalformedOutput(snippet(raw)))?;

    let label = match label_field(&obj) {
        Some(Value::String(s)) => s.trim(),
        Some(Value::Null) | None => return Ok(None),
        Some(other) => {
            return Err(InferenceError::MalformedOutput(format!(
                "label is not a string: {other}"
            )))
        }
    };
    if label.is_empty() || label.eq_ignore_ascii_case("null") || label.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    match canonical_label(label, candidates) {
        Some(name) => Ok(Some(Classification::new(
            name,
            obj.get("confidence").and_then(parse_confidence),
        ))),
        None => {
            warn!("Model answered with label '{}' outside the candidate list", label);
            Ok(None)
        }
    }
}

/// Parse `"3"`, `"1-3"`, `"1, 2, 5-6"` into page numbers.
fn parse_page_spec(spec: &str) -> Vec<usize> {
    let mut pages = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((a, b)) => {
                if let (Ok(a), Ok(b)) = (a.trim().parse::<usize>(), b.trim().parse::<usize>()) {
                    if a <= b && b - a < MAX_PAGE_RANGE {
                        pages.extend(a..=b);
                    }
                }
            }
            None => {
                if let Ok(p) = part.parse::<usize>() {
                    pages.push(p);
                }
            }
        }
    }
    pages
}

fn page_number(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(p) => Some(p as usize),
            // negative or fractional: let the sanitizer clamp it
            None => n.as_f64().map(|f| if f < 1.0 { 0 } else { f as usize }),
        },
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_pages(value: Option<&Value>) -> Vec<usize> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .flat_map(|v| match v {
                Value::String(s) => parse_page_spec(s),
                other => page_number(other).into_iter().collect(),
            })
            .collect(),
        Some(Value::String(s)) => parse_page_spec(s),
        Some(other) => page_number(other).into_iter().collect(),
        None => Vec::new(),
    }
}

pub(crate) fn parse_groups(
    raw: &str,
    candidates: &[&TaxonomyNode],
) -> Result<Vec<DocumentGroup>, SegmentationError> {
    let items = json_values(raw)
        .into_iter()
        .find_map(|v| match v {
            Value::Object(mut m) => match m.remove("documents") {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            },
            Value::Array(items) => Some(items),
            _ => None,
        })
        .ok_or_else(|| {
            SegmentationError::Failed(format!("split answer has no document list: {}", snippet(raw)))
        })?;

    let groups: Vec<DocumentGroup> = items
        .iter()
        .filter_map(Value::as_object)
        .map(|m| {
            // Unknown labels are kept verbatim; the orchestrator omits them.
            let label = label_field(m).and_then(Value::as_str).map(|l| {
                canonical_label(l, candidates)
                    .map(str::to_string)
                    .unwrap_or_else(|| l.trim().to_string())
            });
            DocumentGroup {
                label: label.filter(|l| !l.is_empty()),
                pages: parse_pages(m.get("pages")),
                confidence: m.get("confidence").and_then(parse_confidence),
                modified: false,
            }
        })
        .collect();

    if groups.is_empty() {
        return Err(SegmentationError::Failed(
            "split answer proposed no documents".to_string(),
        ));
    }
    Ok(groups)
}

pub(crate) fn parse_boundary(raw: &str) -> Result<bool, SegmentationError> {
    let obj = first_object_where(raw, |m| m.contains_key("same_document")).ok_or_else(|| {
        SegmentationError::Failed(format!("boundary answer is not a decision: {}", snippet(raw)))
    })?;
    match obj.get("same_document") {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(SegmentationError::Failed(format!(
            "same_document is not a boolean: {other:?}"
        ))),
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt - 1)`,
/// saturating at `u64::MAX`.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}
