//! Configuration for a pipeline run.
//!
//! Every knob lives in [`PipelineConfig`], built once via its
//! [`PipelineConfigBuilder`] and handed to [`crate::Pipeline`]. Nothing is
//! read from process-wide state after construction.

use crate::error::DocExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for document segmentation, classification and extraction.
///
/// # Example
/// ```rust
/// use edgequake_docextract::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gpt-4.1-mini")
///     .concurrency(4)
///     .eager_page_threshold(10)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini", "gemini-2.0-flash".
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Classification and field extraction are transcription tasks; any
    /// sampling noise shows up as spurious field values.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 2048.
    pub max_tokens: usize,

    /// Retry attempts on a failed inference call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Deadline for one inference call in seconds. Default: 90.
    pub api_timeout_secs: u64,

    /// Concurrent per-group extraction calls within one run. Default: 4.
    ///
    /// Groups are independent after sanitization, so this only bounds load
    /// on the inference service.
    pub concurrency: usize,

    /// Inputs with at most this many pages are split in one call (eager);
    /// longer inputs are split page by page (lazy). Default: 10.
    pub eager_page_threshold: usize,

    /// Leading PDF pages probed for native text. Default: 3.
    pub text_probe_pages: usize,

    /// Non-whitespace characters the probe must find to skip OCR. Default: 50.
    pub text_probe_min_chars: usize,

    /// Retry segmentation once with the other modality when the splitter
    /// reports a modality mismatch. Default: true.
    pub modality_fallback: bool,

    /// Whether the model accepts images. Default: true.
    ///
    /// When false, vision requests fail with a modality mismatch, which the
    /// fallback above turns into a text-mode retry.
    pub vision_enabled: bool,

    /// Longest edge of rendered PDF pages in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives run and per-group events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 90,
            concurrency: 4,
            eager_page_threshold: 10,
            text_probe_pages: 3,
            text_probe_min_chars: 50,
            modality_fallback: true,
            vision_enabled: true,
            max_rendered_pixels: 2000,
            password: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("eager_page_threshold", &self.eager_page_threshold)
            .field("modality_fallback", &self.modality_fallback)
            .field("vision_enabled", &self.vision_enabled)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn eager_page_threshold(mut self, pages: usize) -> Self {
        self.config.eager_page_threshold = pages;
        self
    }

    pub fn text_probe_pages(mut self, pages: usize) -> Self {
        self.config.text_probe_pages = pages;
        self
    }

    pub fn text_probe_min_chars(mut self, chars: usize) -> Self {
        self.config.text_probe_min_chars = chars;
        self
    }

    pub fn modality_fallback(mut self, v: bool) -> Self {
        self.config.modality_fallback = v;
        self
    }

    pub fn vision_enabled(mut self, v: bool) -> Self {
        self.config.vision_enabled = v;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DocExtractError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(DocExtractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.text_probe_pages == 0 {
            return Err(DocExtractError::InvalidConfig(
                "text_probe_pages must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocExtractError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DocExtractError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
