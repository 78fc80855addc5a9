//! Segmentation engine: split a multi-page file into candidate documents.
//!
//! Two strategies, picked by page count:
//!
//! - **Eager**: every page goes to the model in one split call, which
//!   returns labelled groups.
//! - **Lazy**: the model decides, for each pair of consecutive pages,
//!   whether the second continues the first. Runs of pages become groups,
//!   then each group is classified against the flat document-type list.
//!   Pages can be pulled one at a time ([`Segmenter::segment_on_demand`]),
//!   so a long file is never held in memory whole.
//!
//! Page indices in the returned groups are not trusted; the caller runs
//! [`crate::pipeline::sanitize::sanitize`] before reading content.

use crate::document::{Content, DocumentGroup, Modality, Page};
use crate::error::{InferenceError, SegmentationError};
use crate::inference::Inference;
use crate::taxonomy::{Taxonomy, TaxonomyNode};
use std::fmt;
use std::future::Future;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Eager,
    Lazy,
}

impl Strategy {
    /// Eager up to and including `threshold` pages, lazy above.
    pub fn for_page_count(pages: usize, threshold: usize) -> Self {
        if pages <= threshold {
            Strategy::Eager
        } else {
            Strategy::Lazy
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Eager => f.write_str("eager"),
            Strategy::Lazy => f.write_str("lazy"),
        }
    }
}

pub struct Segmenter<'a> {
    taxonomy: &'a Taxonomy,
    inference: &'a dyn Inference,
}

impl<'a> Segmenter<'a> {
    pub fn new(taxonomy: &'a Taxonomy, inference: &'a dyn Inference) -> Self {
        Self {
            taxonomy,
            inference,
        }
    }

    /// Split `pages` into groups, in document order.
    ///
    /// Fails with [`SegmentationError::ModalityMismatch`] when the pages are
    /// not `modality` content or the service cannot handle `modality`.
    pub async fn segment(
        &self,
        pages: &[Page],
        strategy: Strategy,
        modality: Modality,
    ) -> Result<Vec<DocumentGroup>, SegmentationError> {
        if pages.is_empty() {
            return Err(SegmentationError::Failed("no pages to segment".to_string()));
        }
        if let Some(page) = pages.iter().find(|p| p.content.modality() != modality) {
            return Err(SegmentationError::ModalityMismatch {
                expected: modality,
                found: page.content.modality(),
            });
        }

        let groups = match strategy {
            Strategy::Eager => {
                let candidates = self.taxonomy.flat_list();
                info!(
                    "Segmenting {} pages (eager strategy, {} modality)",
                    pages.len(),
                    modality
                );
                self.inference.split(pages, &candidates, modality).await?
            }
            Strategy::Lazy => {
                return self
                    .segment_on_demand(pages.len(), modality, |index| {
                        let page = pages.get(index - 1).cloned();
                        async move {
                            page.ok_or_else(|| {
                                SegmentationError::Failed(format!("page {index} missing"))
                            })
                        }
                    })
                    .await
            }
        };
        finish(groups)
    }

    /// Lazy segmentation over `total_pages` pages pulled through `fetch`
    /// (1-based). Boundary detection holds two pages at a time and
    /// classification one run at a time.
    pub async fn segment_on_demand<F, Fut>(
        &self,
        total_pages: usize,
        modality: Modality,
        fetch: F,
    ) -> Result<Vec<DocumentGroup>, SegmentationError>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<Page, SegmentationError>>,
    {
        if total_pages == 0 {
            return Err(SegmentationError::Failed("no pages to segment".to_string()));
        }
        info!(
            "Segmenting {} pages (lazy strategy, {} modality)",
            total_pages, modality
        );
        let fetch_checked = |index: usize| {
            let page = fetch(index);
            async move {
                let page = page.await?;
                let found = page.content.modality();
                if found != modality {
                    return Err(SegmentationError::ModalityMismatch {
                        expected: modality,
                        found,
                    });
                }
                Ok(page)
            }
        };

        let mut prev = fetch_checked(1).await?;
        let mut runs: Vec<Vec<usize>> = vec![vec![prev.index]];
        let mut failures = 0;
        let mut last_failure = None;

        for index in 2..=total_pages {
            let next = fetch_checked(index).await?;
            let same = match self.inference.same_document(&prev, &next, modality).await {
                Ok(same) => same,
                Err(e @ SegmentationError::ModalityMismatch { .. }) => return Err(e),
                Err(e) => {
                    warn!(
                        "Boundary {}/{} undecided ({}); keeping pages together",
                        prev.index, next.index, e
                    );
                    failures += 1;
                    last_failure = Some(e);
                    true
                }
            };
            match runs.last_mut() {
                Some(run) if same => run.push(next.index),
                _ => runs.push(vec![next.index]),
            }
            prev = next;
        }

        if let Some(e) = last_failure {
            if failures == total_pages - 1 {
                return Err(e);
            }
        }
        debug!("Boundary pass produced {} run(s)", runs.len());

        let candidates = self.taxonomy.flat_list();
        let mut groups = Vec::with_capacity(runs.len());
        for run in runs {
            let mut run_pages = Vec::with_capacity(run.len());
            for &index in &run {
                run_pages.push(fetch_checked(index).await?);
            }
            let mut group = DocumentGroup::new(run);
            let content = Content::from_pages(&run_pages);
            match self.inference.classify(&content, &candidates, modality).await {
                Ok(Some(hit)) => {
                    group.label = Some(hit.label);
                    group.confidence = hit.confidence;
                }
                Ok(None) => debug!("Group {:?} matched no document type", group.pages),
                Err(InferenceError::UnsupportedModality(found)) => {
                    return Err(SegmentationError::ModalityMismatch {
                        expected: found.alternate(),
                        found,
                    })
                }
                Err(e) => warn!("Classifying group {:?} failed: {}", group.pages, e),
            }
            groups.push(group);
        }
        finish(groups)
    }
}

fn finish(groups: Vec<DocumentGroup>) -> Result<Vec<DocumentGroup>, SegmentationError> {
    if groups.is_empty() {
        return Err(SegmentationError::Failed(
            "splitter proposed no documents".to_string(),
        ));
    }
    info!("Segmentation proposed {} document(s)", groups.len());
    Ok(groups)
}
