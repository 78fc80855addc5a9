//! Pipeline orchestrator and public entry points.
//!
//! ```text
//! input ─► resolve ─► select loader ─► count pages
//!                                         │
//!              ┌──────── 1 page ──────────┴──────── N pages ────────┐
//!              ▼                                                     ▼
//!     load ─► classify (2 levels)                 load ─► segment (eager | lazy)
//!              │                                           │  modality mismatch?
//!              ▼                                           │  └► reload with the other
//!          extract (if schema)                             │     loader, segment once more
//!              │                                           ▼
//!              │                                        sanitize
//!              │                                           ▼
//!              │                              per group, ordered, bounded:
//!              │                              resolve label ─► extract (if schema)
//!              ▼                                           ▼
//!              └──────────────► PipelineResult ◄───────────┘
//! ```
//!
//! [`Pipeline::run`] never returns `Err`: fatal failures become
//! `PipelineResult { documents: [], error: Some(..) }`. Per-group failures
//! only remove or reduce that group's document.

use crate::config::PipelineConfig;
use crate::document::{Content, DocumentGroup, Page};
use crate::error::{DocExtractError, InferenceError, LoaderError, SegmentError, SegmentationError};
use crate::inference::{Inference, LlmInference};
use crate::output::{BatchResult, DebugInfo, ExtractedDocument, FileResult, PipelineResult};
use crate::pipeline::classify::{Classifier, DocumentClassification};
use crate::pipeline::extract::{extract, ExtractOutcome};
use crate::pipeline::input;
use crate::pipeline::loader::{DocumentSource, FileSystemSource};
use crate::pipeline::sanitize::sanitize;
use crate::pipeline::segment::{Segmenter, Strategy};
use crate::pipeline::select::{LoaderKind, LoaderSelection};
use crate::taxonomy::Taxonomy;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A configured pipeline: taxonomy, inference service and page source.
///
/// Cheap to share behind an `Arc`; every run owns its own state.
pub struct Pipeline {
    config: PipelineConfig,
    taxonomy: Arc<Taxonomy>,
    inference: Arc<dyn Inference>,
    source: Arc<dyn DocumentSource>,
}

impl Pipeline {
    /// Build a pipeline backed by the configured LLM provider.
    pub fn new(config: PipelineConfig, taxonomy: Taxonomy) -> Result<Self, DocExtractError> {
        let inference = LlmInference::from_config(&config)?;
        Ok(Self::with_inference(config, taxonomy, Arc::new(inference)))
    }

    /// Build a pipeline around any [`Inference`] implementation.
    pub fn with_inference(
        config: PipelineConfig,
        taxonomy: Taxonomy,
        inference: Arc<dyn Inference>,
    ) -> Self {
        let source = Arc::new(FileSystemSource::new(&config));
        Self {
            config,
            taxonomy: Arc::new(taxonomy),
            inference,
            source,
        }
    }

    /// Replace the page source.
    pub fn with_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.source = source;
        self
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one file path or URL.
    pub async fn run(&self, input: &str) -> PipelineResult {
        let start = Instant::now();
        info!("Starting run: {}", input);

        let outcome = AssertUnwindSafe(self.try_run(input)).catch_unwind().await;
        let result = match outcome {
            Ok(Ok(documents)) => PipelineResult::success(documents),
            Ok(Err(e)) => {
                warn!("Run failed for {}: {}", input, e);
                PipelineResult::failure(e.to_string())
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                let e = DocExtractError::Internal(msg);
                warn!("Run aborted for {}: {}", input, e);
                PipelineResult::failure(e.to_string())
            }
        };

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(result.documents.len(), result.error.as_deref());
        }
        info!(
            "Run finished for {}: {} document(s) in {}ms",
            input,
            result.documents.len(),
            start.elapsed().as_millis()
        );
        result
    }

    /// Process several inputs, at most `jobs` at a time. Results keep input order.
    pub async fn run_many<S: AsRef<str>>(&self, inputs: &[S], jobs: usize) -> BatchResult {
        let results: Vec<FileResult> = stream::iter(inputs.iter().map(|input| async move {
            let input = input.as_ref();
            let start = Instant::now();
            let result = self.run(input).await;
            FileResult {
                input: input.to_string(),
                result,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }))
        .buffered(jobs.max(1))
        .collect()
        .await;

        BatchResult {
            total: results.len(),
            results,
        }
    }

    /// Process in-memory file bytes. `extension` (e.g. `"pdf"`, `"jpg"`)
    /// drives loader selection.
    pub async fn run_bytes(&self, bytes: &[u8], extension: &str) -> PipelineResult {
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let written = tempfile::Builder::new()
            .suffix(&suffix)
            .tempfile()
            .and_then(|mut tmp| tmp.write_all(bytes).map(|_| tmp));
        match written {
            // `tmp` is dropped (and the file deleted) when `run` returns
            Ok(tmp) => self.run(&tmp.path().to_string_lossy()).await,
            Err(e) => PipelineResult::failure(
                DocExtractError::Internal(format!("tempfile: {e}")).to_string(),
            ),
        }
    }

    async fn try_run(&self, input_str: &str) -> Result<Vec<ExtractedDocument>, DocExtractError> {
        // ── Step 1: Resolve input ────────────────────────────────────────────
        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        let path = resolved.path();

        // ── Step 2: Select loader, count pages ───────────────────────────────
        let selection = self.source.select(path).await;
        let total_pages = self.source.page_count(path).await.max(1);
        info!(
            "{}: {} page(s), {} loader",
            path.display(),
            total_pages,
            selection.name()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(input_str, total_pages, selection.name());
        }

        // ── Step 3: Single- or multi-page path ───────────────────────────────
        if total_pages == 1 {
            self.run_single_page(path, selection).await
        } else {
            self.run_multi_page(path, selection, total_pages).await
        }
    }

    async fn load(&self, path: &Path, kind: LoaderKind) -> Result<Vec<Page>, DocExtractError> {
        let started = Instant::now();
        let pages = self
            .source
            .load(path, kind)
            .await
            .map_err(|source| match source {
                LoaderError::Pdfium(detail) => DocExtractError::PdfiumBindingFailed(detail),
                source => DocExtractError::LoadFailed {
                    path: path.to_path_buf(),
                    loader: kind.name(),
                    source,
                },
            })?;
        debug!(
            "Loaded {} page(s) with the {} loader in {}ms",
            pages.len(),
            kind,
            started.elapsed().as_millis()
        );
        Ok(pages)
    }

    async fn fetch_page(
        &self,
        path: &Path,
        kind: LoaderKind,
        index: usize,
    ) -> Result<Page, SegmentationError> {
        self.source
            .load_page(path, kind, index)
            .await
            .map_err(|e| SegmentationError::Failed(format!("page {index}: {e}")))
    }

    fn fallback_selection(&self, current: LoaderSelection) -> LoaderSelection {
        LoaderSelection::new(LoaderKind::for_modality(current.modality().alternate()))
    }

    // ── Single-page path ─────────────────────────────────────────────────────

    async fn run_single_page(
        &self,
        path: &Path,
        selection: LoaderSelection,
    ) -> Result<Vec<ExtractedDocument>, DocExtractError> {
        let classifier = Classifier::new(&self.taxonomy, self.inference.as_ref());
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_segmented(1);
            cb.on_group_start(1, 1);
        }

        let pages = self.load(path, selection.kind).await?;
        let content = Content::from_pages(&pages);
        let first = classifier
            .classify_document(&content, selection.modality())
            .await;

        let (selection, content, class) = match first {
            Ok(class) => (selection, content, class),
            Err(InferenceError::UnsupportedModality(m)) if self.config.modality_fallback => {
                let alternate = self.fallback_selection(selection);
                warn!(
                    "{} content is not supported; retrying with the {} loader",
                    m,
                    alternate.name()
                );
                let pages = self.load(path, alternate.kind).await?;
                let content = Content::from_pages(&pages);
                let class = classifier
                    .classify_document(&content, alternate.modality())
                    .await
                    .map_err(DocExtractError::ClassificationFailed)?;
                (alternate, content, class)
            }
            Err(e) => return Err(DocExtractError::ClassificationFailed(e)),
        };

        let DocumentClassification {
            category,
            doc_type,
            schema,
            confidence,
        } = class;

        let data = match schema {
            None => None,
            Some(schema) => {
                match extract(
                    self.inference.as_ref(),
                    &content,
                    schema,
                    selection.modality(),
                )
                .await
                {
                    ExtractOutcome::Extracted(map) => Some(map),
                    ExtractOutcome::TimedOut { secs } => {
                        return Err(DocExtractError::ExtractionTimeout { secs })
                    }
                    ExtractOutcome::Failed(detail) => {
                        let e = SegmentError::ExtractionFailed { group: 1, detail };
                        warn!("{}", e);
                        None
                    }
                }
            }
        };

        if let Some(cb) = cb {
            cb.on_group_complete(1, 1, doc_type.as_deref());
        }
        Ok(vec![ExtractedDocument {
            category,
            doc_type,
            data,
            confidence,
            debug: DebugInfo {
                loader: selection.name().to_string(),
                vision: selection.vision,
                pages: 1,
            },
        }])
    }

    // ── Multi-page path ──────────────────────────────────────────────────────

    async fn run_multi_page(
        &self,
        path: &Path,
        selection: LoaderSelection,
        total_pages: usize,
    ) -> Result<Vec<ExtractedDocument>, DocExtractError> {
        let (pages, selection, mut groups) =
            self.segment_with_fallback(path, selection, total_pages).await?;

        let corrections = sanitize(&mut groups, total_pages);
        if corrections > 0 {
            info!("Sanitizer corrected {} group(s)", corrections);
        }
        if groups.is_empty() {
            return Err(DocExtractError::SegmentationFailed(SegmentationError::Failed(
                "no document group has a valid page".to_string(),
            )));
        }

        let total = groups.len();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_segmented(total);
        }

        let documents: Vec<Option<ExtractedDocument>> =
            stream::iter(groups.iter().enumerate().map(|(i, group)| {
                self.process_group(i + 1, total, group, path, pages.as_deref(), selection)
            }))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        Ok(documents.into_iter().flatten().collect())
    }

    /// Segment with the selected loader; on a modality mismatch, reload with
    /// the other loader and try exactly once more.
    ///
    /// The eager strategy returns the loaded pages. The lazy strategy returns
    /// `None` and its groups are re-read page by page at extraction time.
    async fn segment_with_fallback(
        &self,
        path: &Path,
        selection: LoaderSelection,
        total_pages: usize,
    ) -> Result<(Option<Vec<Page>>, LoaderSelection, Vec<DocumentGroup>), DocExtractError> {
        let strategy = Strategy::for_page_count(total_pages, self.config.eager_page_threshold);
        let segmenter = Segmenter::new(&self.taxonomy, self.inference.as_ref());

        let (pages, first) = self
            .segment_as(&segmenter, path, selection, strategy, total_pages)
            .await?;

        match first {
            Ok(groups) => Ok((pages, selection, groups)),
            Err(e @ SegmentationError::ModalityMismatch { .. }) if self.config.modality_fallback => {
                drop(pages);
                let alternate = self.fallback_selection(selection);
                warn!("{}; retrying with the {} loader", e, alternate.name());
                let (pages, second) = self
                    .segment_as(&segmenter, path, alternate, strategy, total_pages)
                    .await?;
                let groups = second.map_err(DocExtractError::SegmentationFailed)?;
                Ok((pages, alternate, groups))
            }
            Err(e) => Err(DocExtractError::SegmentationFailed(e)),
        }
    }

    async fn segment_as(
        &self,
        segmenter: &Segmenter<'_>,
        path: &Path,
        selection: LoaderSelection,
        strategy: Strategy,
        total_pages: usize,
    ) -> Result<(Option<Vec<Page>>, Result<Vec<DocumentGroup>, SegmentationError>), DocExtractError>
    {
        let modality = selection.modality();
        match strategy {
            Strategy::Eager => {
                let pages = self.load(path, selection.kind).await?;
                let groups = segmenter.segment(&pages, strategy, modality).await;
                Ok((Some(pages), groups))
            }
            Strategy::Lazy => {
                let groups = segmenter
                    .segment_on_demand(total_pages, modality, |index| {
                        self.fetch_page(path, selection.kind, index)
                    })
                    .await;
                Ok((None, groups))
            }
        }
    }

    /// Content of one group, from the loaded pages or read page by page.
    async fn group_content(
        &self,
        path: &Path,
        group: &DocumentGroup,
        pages: Option<&[Page]>,
        kind: LoaderKind,
    ) -> Result<Content, String> {
        if let Some(pages) = pages {
            return Ok(Content::from_pages(group.select(pages)));
        }
        let mut loaded = Vec::with_capacity(group.pages.len());
        for &index in &group.pages {
            let page = self
                .source
                .load_page(path, kind, index)
                .await
                .map_err(|e| format!("page {index}: {e}"))?;
            loaded.push(page);
        }
        Ok(Content::from_pages(&loaded))
    }

    /// Resolve one sanitized group and extract it. `None` omits the group.
    async fn process_group(
        &self,
        n: usize,
        total: usize,
        group: &DocumentGroup,
        path: &Path,
        pages: Option<&[Page]>,
        selection: LoaderSelection,
    ) -> Option<ExtractedDocument> {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_group_start(n, total);
        }
        let fail = |e: SegmentError| {
            warn!("{}", e);
            if let Some(cb) = cb {
                cb.on_group_error(n, total, &e.to_string());
            }
        };

        let Some(label) = group.label.as_deref() else {
            fail(SegmentError::Unclassified { group: n });
            return None;
        };
        let Some(resolution) = self.taxonomy.resolve(label) else {
            fail(SegmentError::UnknownLabel {
                group: n,
                label: label.to_string(),
            });
            return None;
        };

        let doc_type = resolution.doc_type.map(|d| d.name.clone());
        let mut data = None;
        if let Some(schema) = resolution.schema() {
            let content = match self.group_content(path, group, pages, selection.kind).await {
                Ok(content) => content,
                Err(detail) => {
                    fail(SegmentError::Unreadable { group: n, detail });
                    return None;
                }
            };
            match extract(self.inference.as_ref(), &content, schema, selection.modality()).await {
                ExtractOutcome::Extracted(map) => data = Some(map),
                ExtractOutcome::TimedOut { secs } => {
                    fail(SegmentError::Timeout { group: n, secs });
                    return None;
                }
                ExtractOutcome::Failed(detail) => {
                    fail(SegmentError::ExtractionFailed { group: n, detail });
                }
            }
        }

        debug!(
            group = n,
            "Group {:?} → {}/{}",
            group.pages,
            resolution.category.name,
            doc_type.as_deref().unwrap_or("-")
        );
        if let Some(cb) = cb {
            if data.is_some() || resolution.schema().is_none() {
                cb.on_group_complete(n, total, doc_type.as_deref());
            }
        }

        Some(ExtractedDocument {
            category: Some(resolution.category.name.clone()),
            doc_type,
            data,
            confidence: group.confidence,
            debug: DebugInfo {
                loader: selection.name().to_string(),
                vision: selection.vision,
                pages: group.pages.len(),
            },
        })
    }
}

// ── Free-function entry points ───────────────────────────────────────────────

/// Process one file or URL with the built-in taxonomy.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docextract::{process, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = PipelineConfig::default();
/// let result = process("scan.pdf", &config).await;
/// println!("{}", serde_json::to_string_pretty(&result).unwrap());
/// # }
/// ```
pub async fn process(input: &str, config: &PipelineConfig) -> PipelineResult {
    match Pipeline::new(config.clone(), Taxonomy::builtin()) {
        Ok(pipeline) => pipeline.run(input).await,
        Err(e) => PipelineResult::failure(e.to_string()),
    }
}

/// Blocking wrapper around [`process`] for non-async callers.
pub fn process_sync(input: &str, config: &PipelineConfig) -> PipelineResult {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(process(input, config)),
        Err(e) => PipelineResult::failure(
            DocExtractError::Internal(format!("Failed to create tokio runtime: {}", e)).to_string(),
        ),
    }
}

/// Process in-memory bytes with the built-in taxonomy.
///
/// The bytes are written to a managed temp file that is removed on return.
pub async fn process_from_bytes(
    bytes: &[u8],
    extension: &str,
    config: &PipelineConfig,
) -> PipelineResult {
    match Pipeline::new(config.clone(), Taxonomy::builtin()) {
        Ok(pipeline) => pipeline.run_bytes(bytes, extension).await,
        Err(e) => PipelineResult::failure(e.to_string()),
    }
}
