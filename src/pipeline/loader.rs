//! Page acquisition: the [`DocumentSource`] seam and its file-system
//! implementation.
//!
//! The orchestrator only talks to a `DocumentSource`, so tests can feed it
//! in-memory pages without pdfium or real files behind them.

use crate::config::PipelineConfig;
use crate::document::Page;
use crate::error::LoaderError;
use crate::pipeline::input::{file_kind, image_mime, FileKind};
use crate::pipeline::select::{select_loader, LoaderKind, LoaderSelection, TextProbe};
use crate::pipeline::{encode, render, sheet};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where pages come from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Pick the loader for `path`. Never fails.
    async fn select(&self, path: &Path) -> LoaderSelection;

    /// Physical page count, at least 1.
    async fn page_count(&self, path: &Path) -> usize;

    /// Load every page of `path` with `loader`, in page order.
    async fn load(&self, path: &Path, loader: LoaderKind) -> Result<Vec<Page>, LoaderError>;

    /// Load one page (1-based). Used by boundary detection, which walks long
    /// files without holding them in memory. The default loads everything
    /// and keeps the requested page.
    async fn load_page(
        &self,
        path: &Path,
        loader: LoaderKind,
        index: usize,
    ) -> Result<Page, LoaderError> {
        let pages = self.load(path, loader).await?;
        take_page(pages, index)
    }
}

/// Pick page `index` out of a fully loaded file.
pub fn take_page(pages: Vec<Page>, index: usize) -> Result<Page, LoaderError> {
    let total = pages.len();
    pages
        .into_iter()
        .find(|p| p.index == index)
        .ok_or(LoaderError::PageOutOfRange { index, total })
}

/// Reads real files: pdfium for PDFs, calamine for spreadsheets, raw bytes
/// for images and plain text.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    probe: TextProbe,
    max_rendered_pixels: u32,
    password: Option<String>,
}

impl FileSystemSource {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            probe: TextProbe {
                pages: config.text_probe_pages,
                min_chars: config.text_probe_min_chars,
            },
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
        }
    }

    async fn load_native_text(&self, path: &Path) -> Result<Vec<Page>, LoaderError> {
        match file_kind(path) {
            FileKind::Pdf => render::extract_text_pages(path, self.password.as_deref()).await,
            FileKind::Spreadsheet => sheet::read_sheets(path).await,
            FileKind::Image => Err(LoaderError::NotText(path.display().to_string())),
            FileKind::Other => {
                let bytes = tokio::fs::read(path).await?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| LoaderError::NotText(path.display().to_string()))?;
                Ok(vec![Page::text(1, text)])
            }
        }
    }

    async fn load_vision(&self, path: &Path) -> Result<Vec<Page>, LoaderError> {
        match file_kind(path) {
            FileKind::Pdf => {
                let rendered =
                    render::render_pages(path, self.max_rendered_pixels, self.password.as_deref())
                        .await?;
                rendered
                    .iter()
                    .map(|(idx, img)| {
                        encode::encode_page(img)
                            .map(|data| Page::image(*idx, data))
                            .map_err(|e| LoaderError::Image(format!("page {idx}: {e}")))
                    })
                    .collect()
            }
            FileKind::Image => {
                let mime = image_mime(path).unwrap_or("image/png");
                let data = encode::encode_image_file(path, mime).await?;
                Ok(vec![Page::image(1, data)])
            }
            FileKind::Spreadsheet | FileKind::Other => Err(LoaderError::Image(format!(
                "'{}' cannot be read as images",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl DocumentSource for FileSystemSource {
    async fn select(&self, path: &Path) -> LoaderSelection {
        let path_buf: PathBuf = path.to_path_buf();
        let probe = self.probe;
        let password = self.password.clone();
        let selected = tokio::task::spawn_blocking(move || {
            select_loader(&path_buf, probe, |p, pages| {
                render::probe_native_text(p, pages, password.as_deref())
            })
        })
        .await;
        match selected {
            Ok(selection) => selection,
            Err(e) => {
                warn!("Loader probe task failed: {} (using vision loader)", e);
                LoaderSelection::new(match file_kind(path) {
                    FileKind::Spreadsheet => LoaderKind::Tabular,
                    FileKind::Other => LoaderKind::NativeText,
                    FileKind::Pdf | FileKind::Image => LoaderKind::Vision,
                })
            }
        }
    }

    async fn page_count(&self, path: &Path) -> usize {
        let path_buf = path.to_path_buf();
        let password = self.password.clone();
        tokio::task::spawn_blocking(move || render::count_pages(&path_buf, password.as_deref()))
            .await
            .unwrap_or(1)
    }

    async fn load(&self, path: &Path, loader: LoaderKind) -> Result<Vec<Page>, LoaderError> {
        debug!("Loading {} with the {} loader", path.display(), loader);
        match loader {
            LoaderKind::NativeText => self.load_native_text(path).await,
            LoaderKind::Vision => self.load_vision(path).await,
            LoaderKind::Tabular => sheet::read_sheets(path).await,
        }
    }

    async fn load_page(
        &self,
        path: &Path,
        loader: LoaderKind,
        index: usize,
    ) -> Result<Page, LoaderError> {
        if file_kind(path) != FileKind::Pdf || loader == LoaderKind::Tabular {
            let pages = self.load(path, loader).await?;
            return take_page(pages, index);
        }
        let password = self.password.as_deref();
        match loader {
            LoaderKind::Vision => {
                let image =
                    render::render_page(path, index, self.max_rendered_pixels, password).await?;
                let data = encode::encode_page(&image)
                    .map_err(|e| LoaderError::Image(format!("page {index}: {e}")))?;
                Ok(Page::image(index, data))
            }
            _ => render::extract_text_page(path, index, password).await,
        }
    }
}
