//! Orchestrator tests against a scripted inference service and an in-memory
//! page source. No network, no pdfium.
//!
//! Every page carries markers such as `kind:national_id cat:identity`. The
//! scripted model answers from those markers: text pages hold them as text,
//! vision pages as the image payload.

use async_trait::async_trait;
use edgequake_docextract::{
    Classification, Content, DocumentGroup, DocumentSource, Inference, InferenceError,
    LoaderError, LoaderKind, LoaderSelection, Modality, Page, PageContent, Pipeline,
    PipelineConfig, PipelineProgressCallback, Schema, SegmentationError, Taxonomy, TaxonomyNode,
};
use edgequake_llm::ImageData;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

// ── Fixtures ─────────────────────────────────────────────────────────────────

const TAXONOMY: &str = r#"{
  "catch_all": "Other",
  "categories": [
    {"name": "identity", "description": "Identity papers", "children": [
      {"name": "national_id", "description": "National ID card",
       "schema": {"name": "national_id", "fields": [
         {"name": "id_number", "description": "12-digit number"},
         {"name": "full_name", "description": "Holder name"}]}},
      {"name": "passport", "description": "Passport",
       "schema": {"name": "passport", "fields": [
         {"name": "passport_number", "description": "Passport number"}]}}]},
    {"name": "finance", "description": "Financial papers", "children": [
      {"name": "invoice", "description": "VAT invoice",
       "schema": {"name": "invoice", "fields": [
         {"name": "invoice_number", "description": "Invoice number"},
         {"name": "items", "description": "Line items", "items": [
           {"name": "name", "description": "Item"}]}]}}]},
    {"name": "notice", "description": "Public notices"},
    {"name": "Other", "description": "Anything else"}
  ]
}"#;

fn taxonomy() -> Taxonomy {
    Taxonomy::from_json_str(TAXONOMY).unwrap()
}

const NATIONAL_ID: &str = "kind:national_id cat:identity CĂN CƯỚC CÔNG DÂN";
const PASSPORT: &str = "kind:passport cat:identity HỘ CHIẾU";
const INVOICE: &str = "kind:invoice cat:finance HÓA ĐƠN GTGT";
const NOTICE: &str = "cat:notice THÔNG BÁO";
const OTHER: &str = "cat:Other THỰC ĐƠN";
const BLANK: &str = "nothing recognisable here";

fn page_markers(page: &Page) -> &str {
    match &page.content {
        PageContent::Text(t) => t.as_str(),
        PageContent::Image(img) => img.data.as_str(),
    }
}

fn content_markers(content: &Content) -> String {
    let mut all = content.text.clone();
    for img in &content.images {
        all.push(' ');
        all.push_str(&img.data);
    }
    all
}

fn kind_of(markers: &str) -> Option<&str> {
    markers
        .split_whitespace()
        .find_map(|w| w.strip_prefix("kind:").or_else(|| w.strip_prefix("cat:")))
}

// ── Scripted inference ──────────────────────────────────────────────────────

#[derive(Default)]
struct Scripted {
    /// Fixed answer for `split`; derived from page markers when `None`.
    split_groups: Option<Vec<DocumentGroup>>,
    /// The service cannot look at images.
    text_only: bool,
    /// The service refuses text (wants page images).
    vision_only: bool,
    /// Each extraction takes this long.
    extract_delay_ms: u64,
    extracts_in_flight: AtomicUsize,
    peak_extracts: AtomicUsize,
    classify_calls: AtomicUsize,
    split_calls: AtomicUsize,
    boundary_calls: AtomicUsize,
}

impl Scripted {
    fn reject(&self, modality: Modality) -> bool {
        (self.text_only && modality == Modality::Vision)
            || (self.vision_only && modality == Modality::Text)
    }
}

#[async_trait]
impl Inference for Scripted {
    async fn classify(
        &self,
        content: &Content,
        candidates: &[&TaxonomyNode],
        modality: Modality,
    ) -> Result<Option<Classification>, InferenceError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject(modality) {
            return Err(InferenceError::UnsupportedModality(modality));
        }
        let markers = content_markers(content);
        let words: Vec<&str> = markers.split_whitespace().collect();
        Ok(candidates
            .iter()
            .find(|c| {
                words.contains(&format!("kind:{}", c.name).as_str())
                    || words.contains(&format!("cat:{}", c.name).as_str())
            })
            .map(|c| Classification::new(c.name.clone(), Some(0.9))))
    }

    async fn extract(
        &self,
        content: &Content,
        schema: &Schema,
        modality: Modality,
    ) -> Result<Value, InferenceError> {
        if self.extract_delay_ms > 0 {
            let now = self.extracts_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_extracts.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(self.extract_delay_ms)).await;
            self.extracts_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        if self.reject(modality) {
            return Err(InferenceError::UnsupportedModality(modality));
        }
        let markers = content_markers(content);
        if markers.contains("extract:timeout") {
            return Err(InferenceError::Timeout { secs: 5 });
        }
        if markers.contains("extract:fail") {
            return Err(InferenceError::Api {
                retries: 2,
                message: "503 Service Unavailable".into(),
            });
        }
        let mut map = Map::new();
        for field in &schema.fields {
            map.insert(field.name.clone(), json!(format!("{} of {}", field.name, schema.name)));
        }
        map.insert("hallucinated".into(), json!("dropped"));
        Ok(Value::Object(map))
    }

    async fn split(
        &self,
        pages: &[Page],
        _candidates: &[&TaxonomyNode],
        modality: Modality,
    ) -> Result<Vec<DocumentGroup>, SegmentationError> {
        self.split_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject(modality) {
            return Err(SegmentationError::ModalityMismatch {
                expected: modality.alternate(),
                found: modality,
            });
        }
        if let Some(ref groups) = self.split_groups {
            return Ok(groups.clone());
        }
        let mut groups: Vec<DocumentGroup> = Vec::new();
        for page in pages {
            let kind = kind_of(page_markers(page)).map(str::to_string);
            match groups.last_mut() {
                Some(g) if g.label == kind => g.pages.push(page.index),
                _ => groups.push(DocumentGroup {
                    label: kind,
                    pages: vec![page.index],
                    confidence: Some(0.8),
                    modified: false,
                }),
            }
        }
        Ok(groups)
    }

    async fn same_document(
        &self,
        prev: &Page,
        next: &Page,
        modality: Modality,
    ) -> Result<bool, SegmentationError> {
        self.boundary_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject(modality) {
            return Err(SegmentationError::ModalityMismatch {
                expected: modality.alternate(),
                found: modality,
            });
        }
        Ok(kind_of(page_markers(prev)) == kind_of(page_markers(next)))
    }
}

// ── In-memory page source ───────────────────────────────────────────────────

struct MemorySource {
    pages: Vec<&'static str>,
    kind: LoaderKind,
    /// Whole-file loads, by loader.
    loads: Mutex<Vec<LoaderKind>>,
    /// Single-page loads, by page index.
    page_loads: Mutex<Vec<usize>>,
    /// Loading fails as if no pdfium library could be bound.
    pdfium_missing: bool,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            kind: LoaderKind::NativeText,
            loads: Mutex::new(Vec::new()),
            page_loads: Mutex::new(Vec::new()),
            pdfium_missing: false,
        }
    }
}

impl MemorySource {
    fn new(kind: LoaderKind, pages: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            kind,
            ..Default::default()
        })
    }

    fn page(&self, loader: LoaderKind, index: usize) -> Page {
        let markers = self.pages[index - 1];
        match loader {
            LoaderKind::Vision => Page::image(index, ImageData::new(markers.to_string(), "image/png")),
            LoaderKind::NativeText | LoaderKind::Tabular => Page::text(index, markers),
        }
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn select(&self, _path: &Path) -> LoaderSelection {
        LoaderSelection::new(self.kind)
    }

    async fn page_count(&self, _path: &Path) -> usize {
        self.pages.len()
    }

    async fn load(&self, _path: &Path, loader: LoaderKind) -> Result<Vec<Page>, LoaderError> {
        self.loads.lock().unwrap().push(loader);
        if self.pdfium_missing {
            return Err(LoaderError::Pdfium("libpdfium.so: cannot open shared object".into()));
        }
        Ok((1..=self.pages.len()).map(|i| self.page(loader, i)).collect())
    }

    async fn load_page(
        &self,
        _path: &Path,
        loader: LoaderKind,
        index: usize,
    ) -> Result<Page, LoaderError> {
        self.page_loads.lock().unwrap().push(index);
        if index == 0 || index > self.pages.len() {
            return Err(LoaderError::PageOutOfRange {
                index,
                total: self.pages.len(),
            });
        }
        Ok(self.page(loader, index))
    }
}

// ── Progress tracking ───────────────────────────────────────────────────────

#[derive(Default)]
struct Tracking {
    runs: AtomicUsize,
    segmented: AtomicUsize,
    starts: AtomicUsize,
    completes: AtomicUsize,
    errors: AtomicUsize,
    finished: AtomicUsize,
}

impl PipelineProgressCallback for Tracking {
    fn on_run_start(&self, _input: &str, _total_pages: usize, _loader: &str) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
    fn on_segmented(&self, groups: usize) {
        self.segmented.store(groups, Ordering::SeqCst);
    }
    fn on_group_start(&self, _group: usize, _total: usize) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_group_complete(&self, _group: usize, _total: usize, _doc_type: Option<&str>) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_group_error(&self, _group: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_complete(&self, _documents: usize, _error: Option<&str>) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn input_file() -> NamedTempFile {
    tempfile::Builder::new().suffix(".pdf").tempfile().unwrap()
}

fn pipeline(
    config: PipelineConfig,
    inference: Arc<Scripted>,
    source: Arc<MemorySource>,
) -> Pipeline {
    Pipeline::with_inference(config, taxonomy(), inference).with_source(source)
}

fn default_pipeline(
    inference: Arc<Scripted>,
    kind: LoaderKind,
    pages: Vec<&'static str>,
) -> (Pipeline, Arc<MemorySource>) {
    let source = MemorySource::new(kind, pages);
    (
        pipeline(PipelineConfig::default(), inference, source.clone()),
        source,
    )
}

async fn run(p: &Pipeline) -> edgequake_docextract::PipelineResult {
    let file = input_file();
    p.run(file.path().to_str().unwrap()).await
}

// ── Single-page path ────────────────────────────────────────────────────────

#[tokio::test]
async fn single_page_is_classified_in_two_levels_and_extracted() {
    let inf = Arc::new(Scripted::default());
    let (p, _) = default_pipeline(inf.clone(), LoaderKind::Vision, vec![NATIONAL_ID]);

    let result = run(&p).await;
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.documents.len(), 1);

    let doc = &result.documents[0];
    assert_eq!(doc.category.as_deref(), Some("identity"));
    assert_eq!(doc.doc_type.as_deref(), Some("national_id"));
    assert_eq!(doc.confidence, Some(0.9));
    assert_eq!(doc.debug.loader, "vision");
    assert!(doc.debug.vision);
    assert_eq!(doc.debug.pages, 1);

    let data = doc.data.as_ref().unwrap();
    assert_eq!(data["id_number"], "id_number of national_id");
    assert!(data.get("hallucinated").is_none());
    assert_eq!(inf.classify_calls.load(Ordering::SeqCst), 2);
    assert_eq!(inf.split_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_page_catch_all_stops_after_one_call() {
    let inf = Arc::new(Scripted::default());
    let (p, _) = default_pipeline(inf.clone(), LoaderKind::NativeText, vec![OTHER]);

    let result = run(&p).await;
    let doc = &result.documents[0];
    assert_eq!(doc.category.as_deref(), Some("Other"));
    assert_eq!(doc.doc_type, None);
    assert_eq!(doc.data, None);
    assert_eq!(inf.classify_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_page_childless_category_has_no_data() {
    let inf = Arc::new(Scripted::default());
    let (p, _) = default_pipeline(inf.clone(), LoaderKind::NativeText, vec![NOTICE]);

    let doc = &run(&p).await.documents[0];
    assert_eq!(doc.category.as_deref(), Some("notice"));
    assert_eq!(doc.doc_type, None);
    assert_eq!(doc.data, None);
    assert_eq!(inf.classify_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_page_without_match_is_an_empty_document() {
    let inf = Arc::new(Scripted::default());
    let (p, _) = default_pipeline(inf, LoaderKind::NativeText, vec![BLANK]);

    let result = run(&p).await;
    assert!(result.is_success());
    let doc = &result.documents[0];
    assert_eq!(doc.category, None);
    assert_eq!(doc.doc_type, None);
    assert_eq!(doc.data, None);
    assert_eq!(doc.debug.loader, "native-text");
}

#[tokio::test]
async fn single_page_extraction_failure_keeps_classification() {
    let inf = Arc::new(Scripted::default());
    let (p, _) = default_pipeline(
        inf,
        LoaderKind::NativeText,
        vec!["kind:invoice cat:finance extract:fail"],
    );

    let result = run(&p).await;
    assert!(result.is_success());
    let doc = &result.documents[0];
    assert_eq!(doc.doc_type.as_deref(), Some("invoice"));
    assert_eq!(doc.data, None);
}

#[tokio::test]
async fn single_page_extraction_timeout_is_fatal() {
    let inf = Arc::new(Scripted::default());
    let (p, _) = default_pipeline(
        inf,
        LoaderKind::NativeText,
        vec!["kind:invoice cat:finance extract:timeout"],
    );

    let result = run(&p).await;
    assert!(result.documents.is_empty());
    assert!(result.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn single_page_falls_back_to_text_when_images_are_unsupported() {
    let inf = Arc::new(Scripted {
        text_only: true,
        ..Default::default()
    });
    let (p, source) = default_pipeline(inf, LoaderKind::Vision, vec![PASSPORT]);

    let result = run(&p).await;
    assert!(result.is_success(), "{:?}", result.error);
    let doc = &result.documents[0];
    assert_eq!(doc.doc_type.as_deref(), Some("passport"));
    assert_eq!(doc.debug.loader, "native-text");
    assert!(!doc.debug.vision);
    assert_eq!(
        *source.loads.lock().unwrap(),
        vec![LoaderKind::Vision, LoaderKind::NativeText]
    );
}

// ── Multi-page path ─────────────────────────────────────────────────────────

#[tokio::test]
async fn multi_page_file_yields_one_document_per_group_in_order() {
    let inf = Arc::new(Scripted::default());
    let (p, _) = default_pipeline(
        inf.clone(),
        LoaderKind::NativeText,
        vec![NATIONAL_ID, INVOICE, INVOICE, PASSPORT],
    );

    let result = run(&p).await;
    assert!(result.is_success(), "{:?}", result.error);
    let types: Vec<_> = result
        .documents
        .iter()
        .map(|d| d.doc_type.as_deref().unwrap())
        .collect();
    assert_eq!(types, vec!["national_id", "invoice", "passport"]);
    let pages: Vec<_> = result.documents.iter().map(|d| d.debug.pages).collect();
    assert_eq!(pages, vec![1, 2, 1]);
    assert_eq!(result.documents[1].category.as_deref(), Some("finance"));
    assert_eq!(result.documents[1].confidence, Some(0.8));
    assert_eq!(inf.split_calls.load(Ordering::SeqCst), 1);
    assert_eq!(inf.boundary_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn hallucinated_pages_are_clamped_before_extraction() {
    let inf = Arc::new(Scripted {
        split_groups: Some(vec![
            DocumentGroup::labelled("national_id", vec![1], Some(0.95)),
            DocumentGroup::labelled("invoice", vec![2, 7], Some(0.7)),
        ]),
        ..Default::default()
    });
    let (p, _) = default_pipeline(inf, LoaderKind::NativeText, vec![NATIONAL_ID, INVOICE, INVOICE]);

    let result = run(&p).await;
    assert_eq!(result.documents.len(), 2);
    // [2, 7] on a 3-page file becomes [2, 3]
    assert_eq!(result.documents[1].debug.pages, 2);
    assert!(result.documents[1].data.is_some());
}

#[tokio::test]
async fn groups_with_unknown_or_missing_labels_are_omitted() {
    let inf = Arc::new(Scripted {
        split_groups: Some(vec![
            DocumentGroup::labelled("national_id", vec![1], None),
            DocumentGroup::labelled("restaurant_menu", vec![2], None),
            DocumentGroup::new(vec![3]),
        ]),
        ..Default::default()
    });
    let tracking = Arc::new(Tracking::default());
    let config = PipelineConfig::builder()
        .progress_callback(tracking.clone())
        .build()
        .unwrap();
    let source = MemorySource::new(LoaderKind::NativeText, vec![NATIONAL_ID, BLANK, BLANK]);
    let p = pipeline(config, inf, source);

    let result = run(&p).await;
    assert!(result.is_success());
    assert_eq!(result.documents.len(), 1);
    assert_eq!(result.documents[0].doc_type.as_deref(), Some("national_id"));
    assert_eq!(tracking.errors.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn category_label_from_the_splitter_keeps_category_only() {
    let inf = Arc::new(Scripted {
        split_groups: Some(vec![
            DocumentGroup::labelled("Other", vec![1], Some(0.4)),
            DocumentGroup::labelled("invoice", vec![2], None),
        ]),
        ..Default::default()
    });
    let (p, _) = default_pipeline(inf, LoaderKind::NativeText, vec![OTHER, INVOICE]);

    let result = run(&p).await;
    assert_eq!(result.documents.len(), 2);
    let first = &result.documents[0];
    assert_eq!(first.category.as_deref(), Some("Other"));
    assert_eq!(first.doc_type, None);
    assert_eq!(first.data, None);
    assert_eq!(first.confidence, Some(0.4));
}

#[tokio::test]
async fn one_group_timing_out_does_not_affect_the_others() {
    let inf = Arc::new(Scripted::default());
    let (p, _) = default_pipeline(
        inf,
        LoaderKind::NativeText,
        vec![
            NATIONAL_ID,
            "kind:invoice cat:finance extract:timeout",
            PASSPORT,
        ],
    );

    let result = run(&p).await;
    assert!(result.is_success());
    let types: Vec<_> = result
        .documents
        .iter()
        .map(|d| d.doc_type.as_deref().unwrap())
        .collect();
    assert_eq!(types, vec!["national_id", "passport"]);
    assert!(result.documents.iter().all(|d| d.data.is_some()));
}

#[tokio::test]
async fn failed_group_extraction_keeps_the_document_without_data() {
    let inf = Arc::new(Scripted::default());
    let tracking = Arc::new(Tracking::default());
    let config = PipelineConfig::builder()
        .progress_callback(tracking.clone())
        .build()
        .unwrap();
    let source = MemorySource::new(
        LoaderKind::NativeText,
        vec![NATIONAL_ID, "kind:invoice cat:finance extract:fail"],
    );
    let p = pipeline(config, inf, source);

    let result = run(&p).await;
    assert_eq!(result.documents.len(), 2);
    assert!(result.documents[0].data.is_some());
    assert_eq!(result.documents[1].doc_type.as_deref(), Some("invoice"));
    assert_eq!(result.documents[1].data, None);
    assert_eq!(tracking.errors.load(Ordering::SeqCst), 1);
    assert_eq!(tracking.completes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn long_files_use_boundary_detection() {
    let inf = Arc::new(Scripted::default());
    let config = PipelineConfig::builder()
        .eager_page_threshold(2)
        .build()
        .unwrap();
    let source = MemorySource::new(
        LoaderKind::NativeText,
        vec![NATIONAL_ID, INVOICE, INVOICE, INVOICE, PASSPORT],
    );
    let p = pipeline(config, inf.clone(), source);

    let result = run(&p).await;
    assert!(result.is_success(), "{:?}", result.error);
    let pages: Vec<_> = result.documents.iter().map(|d| d.debug.pages).collect();
    assert_eq!(pages, vec![1, 3, 1]);
    assert_eq!(result.documents[1].doc_type.as_deref(), Some("invoice"));
    assert_eq!(inf.split_calls.load(Ordering::SeqCst), 0);
    assert_eq!(inf.boundary_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn long_files_are_read_page_by_page() {
    let inf = Arc::new(Scripted::default());
    let config = PipelineConfig::builder()
        .eager_page_threshold(2)
        .build()
        .unwrap();
    let source = MemorySource::new(
        LoaderKind::NativeText,
        vec![NATIONAL_ID, INVOICE, INVOICE, INVOICE, PASSPORT],
    );
    let p = pipeline(config, inf, source.clone());

    let result = run(&p).await;
    assert!(result.is_success(), "{:?}", result.error);
    assert!(result.documents.iter().all(|d| d.data.is_some()));
    assert!(source.loads.lock().unwrap().is_empty());
    // Boundary pass, classification of each run, extraction of each group.
    let mut page_loads = source.page_loads.lock().unwrap().clone();
    assert_eq!(page_loads.len(), 15);
    page_loads.sort_unstable();
    assert_eq!(page_loads, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 5, 5, 5]);
}

#[tokio::test]
async fn long_file_fallback_rereads_pages_with_the_other_loader() {
    let inf = Arc::new(Scripted {
        vision_only: true,
        ..Default::default()
    });
    let config = PipelineConfig::builder()
        .eager_page_threshold(2)
        .build()
        .unwrap();
    let source = MemorySource::new(LoaderKind::NativeText, vec![NATIONAL_ID, INVOICE, INVOICE]);
    let p = pipeline(config, inf, source.clone());

    let result = run(&p).await;
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.documents.len(), 2);
    assert!(result.documents.iter().all(|d| d.debug.loader == "vision"));
    assert!(source.loads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn group_extraction_respects_the_concurrency_limit() {
    let inf = Arc::new(Scripted {
        extract_delay_ms: 20,
        ..Default::default()
    });
    let config = PipelineConfig::builder().concurrency(2).build().unwrap();
    let source = MemorySource::new(
        LoaderKind::NativeText,
        vec![NATIONAL_ID, INVOICE, PASSPORT, NATIONAL_ID, INVOICE, PASSPORT],
    );
    let p = pipeline(config, inf.clone(), source);

    let result = run(&p).await;
    assert!(result.is_success(), "{:?}", result.error);
    let types: Vec<_> = result
        .documents
        .iter()
        .map(|d| d.doc_type.as_deref().unwrap())
        .collect();
    assert_eq!(
        types,
        vec!["national_id", "invoice", "passport", "national_id", "invoice", "passport"]
    );
    assert_eq!(inf.peak_extracts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn document_matches_whether_alone_or_inside_a_batch_file() {
    let alone = {
        let (p, _) = default_pipeline(
            Arc::new(Scripted::default()),
            LoaderKind::NativeText,
            vec![NATIONAL_ID],
        );
        run(&p).await.documents.remove(0)
    };
    let within = {
        let (p, _) = default_pipeline(
            Arc::new(Scripted::default()),
            LoaderKind::NativeText,
            vec![NATIONAL_ID, INVOICE],
        );
        run(&p).await.documents.remove(0)
    };
    assert_eq!(alone.category, within.category);
    assert_eq!(alone.doc_type, within.doc_type);
    assert_eq!(alone.data, within.data);
    assert_eq!(alone.debug.pages, within.debug.pages);
}

// ── Modality fallback ───────────────────────────────────────────────────────

#[tokio::test]
async fn segmentation_retries_once_with_the_other_modality() {
    let inf = Arc::new(Scripted {
        vision_only: true,
        ..Default::default()
    });
    let (p, source) = default_pipeline(inf.clone(), LoaderKind::NativeText, vec![NATIONAL_ID, INVOICE]);

    let result = run(&p).await;
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.documents.len(), 2);
    assert!(result.documents.iter().all(|d| d.debug.loader == "vision" && d.debug.vision));
    assert!(result.documents.iter().all(|d| d.data.is_some()));
    assert_eq!(
        *source.loads.lock().unwrap(),
        vec![LoaderKind::NativeText, LoaderKind::Vision]
    );
    assert_eq!(inf.split_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_modality_failure_is_fatal() {
    let inf = Arc::new(Scripted {
        vision_only: true,
        text_only: true,
        ..Default::default()
    });
    let (p, source) = default_pipeline(inf.clone(), LoaderKind::NativeText, vec![NATIONAL_ID, INVOICE]);

    let result = run(&p).await;
    assert!(result.documents.is_empty());
    assert!(result.error.unwrap().starts_with("Segmentation failed"));
    assert_eq!(source.loads.lock().unwrap().len(), 2);
    assert_eq!(inf.split_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn disabled_fallback_fails_on_the_first_mismatch() {
    let inf = Arc::new(Scripted {
        vision_only: true,
        ..Default::default()
    });
    let config = PipelineConfig::builder()
        .modality_fallback(false)
        .build()
        .unwrap();
    let source = MemorySource::new(LoaderKind::NativeText, vec![NATIONAL_ID, INVOICE]);
    let p = pipeline(config, inf.clone(), source.clone());

    let result = run(&p).await;
    assert!(result.error.unwrap().contains("splitter expects vision content"));
    assert_eq!(source.loads.lock().unwrap().len(), 1);
    assert_eq!(inf.split_calls.load(Ordering::SeqCst), 1);
}

// ── Run-level behaviour ─────────────────────────────────────────────────────

#[tokio::test]
async fn missing_pdfium_is_reported_as_a_binding_failure() {
    let source = Arc::new(MemorySource {
        pages: vec![NATIONAL_ID],
        kind: LoaderKind::Vision,
        pdfium_missing: true,
        ..Default::default()
    });
    let p = pipeline(PipelineConfig::default(), Arc::new(Scripted::default()), source);

    let result = run(&p).await;
    assert!(result.documents.is_empty());
    let error = result.error.unwrap();
    assert!(error.starts_with("Failed to bind to pdfium library"), "{error}");
    assert!(error.contains("PDFIUM_LIB_PATH"));
}

#[tokio::test]
async fn missing_input_is_reported_not_raised() {
    let (p, source) = default_pipeline(
        Arc::new(Scripted::default()),
        LoaderKind::NativeText,
        vec![NATIONAL_ID],
    );

    let result = p.run("/definitely/not/here/scan.pdf").await;
    assert!(result.documents.is_empty());
    assert!(result.error.unwrap().contains("does not exist"));
    assert!(source.loads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_many_keeps_input_order() {
    let (p, _) = default_pipeline(
        Arc::new(Scripted::default()),
        LoaderKind::NativeText,
        vec![NATIONAL_ID, INVOICE],
    );
    let a = input_file();
    let b = input_file();
    let inputs = vec![
        a.path().to_str().unwrap().to_string(),
        "/definitely/not/here/scan.pdf".to_string(),
        b.path().to_str().unwrap().to_string(),
    ];

    let batch = p.run_many(&inputs, 2).await;
    assert_eq!(batch.total, 3);
    let names: Vec<_> = batch.results.iter().map(|r| r.input.as_str()).collect();
    assert_eq!(names, inputs.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(batch.results[0].result.documents.len(), 2);
    assert!(batch.results[1].result.error.is_some());
    assert_eq!(batch.results[2].result.documents.len(), 2);
}

#[tokio::test]
async fn progress_events_follow_the_run() {
    let tracking = Arc::new(Tracking::default());
    let config = PipelineConfig::builder()
        .progress_callback(tracking.clone())
        .concurrency(2)
        .build()
        .unwrap();
    let source = MemorySource::new(
        LoaderKind::NativeText,
        vec![NATIONAL_ID, INVOICE, PASSPORT],
    );
    let p = pipeline(config, Arc::new(Scripted::default()), source);

    let result = run(&p).await;
    assert_eq!(result.documents.len(), 3);
    assert_eq!(tracking.runs.load(Ordering::SeqCst), 1);
    assert_eq!(tracking.segmented.load(Ordering::SeqCst), 3);
    assert_eq!(tracking.starts.load(Ordering::SeqCst), 3);
    assert_eq!(tracking.completes.load(Ordering::SeqCst), 3);
    assert_eq!(tracking.errors.load(Ordering::SeqCst), 0);
    assert_eq!(tracking.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn result_serialises_to_the_public_shape() {
    let (p, _) = default_pipeline(
        Arc::new(Scripted::default()),
        LoaderKind::Vision,
        vec![NATIONAL_ID],
    );
    let value = serde_json::to_value(run(&p).await).unwrap();
    assert!(value["error"].is_null());
    let doc = &value["documents"][0];
    assert_eq!(doc["category"], "identity");
    assert_eq!(doc["docType"], "national_id");
    assert_eq!(doc["_debug"], json!({"loader": "vision", "vision": true, "pages": 1}));
    assert_eq!(
        doc["data"].as_object().unwrap().keys().collect::<Vec<_>>(),
        vec!["full_name", "id_number"]
    );
}
