//! PDF access via pdfium: page counting, native-text probing, text
//! extraction and rasterisation.
//!
//! pdfium is not async-safe, so every async entry point moves the work onto
//! the blocking pool with `tokio::task::spawn_blocking`. The `*_blocking`
//! functions are also called directly from synchronous code (page counting
//! and the loader probe).

use crate::document::Page;
use crate::error::LoaderError;
use crate::pipeline::input::{file_kind, FileKind};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to pdfium, downloading the library on first use.
///
/// Only the loaders call this; counting and probing use [`bind_local`].
pub fn bind() -> Result<Pdfium, LoaderError> {
    pdfium_auto::bind_pdfium_silent().map_err(|e| LoaderError::Pdfium(e.to_string()))
}

/// Bind to a pdfium library that is already on disk: `PDFIUM_LIB_PATH`, the
/// pdfium-auto cache, then the system library. Never touches the network.
pub fn bind_local() -> Result<Pdfium, LoaderError> {
    if let Some(path) = pdfium_auto::cached_pdfium_path() {
        return pdfium_auto::bind_pdfium_from_path(&path)
            .map_err(|e| LoaderError::Pdfium(e.to_string()));
    }
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| LoaderError::Pdfium(format!("no local pdfium library: {:?}", e)))
}

fn open<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, LoaderError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let detail = format!("{:?}", e);
        if detail.contains("Password") || detail.contains("password") {
            LoaderError::PasswordRequired
        } else {
            LoaderError::Pdf(detail)
        }
    })
}

/// Physical page count of the input; always at least 1.
///
/// Non-PDF inputs are a single page. A PDF that cannot be opened, or a
/// missing pdfium library, also counts as one page, so the caller takes the
/// single-document path.
pub fn count_pages(path: &Path, password: Option<&str>) -> usize {
    if file_kind(path) != FileKind::Pdf {
        return 1;
    }
    match page_count_blocking(path, password) {
        Ok(n) => n.max(1),
        Err(e) => {
            debug!("Page count failed for {}: {} (assuming 1)", path.display(), e);
            1
        }
    }
}

fn page_count_blocking(path: &Path, password: Option<&str>) -> Result<usize, LoaderError> {
    let pdfium = bind_local()?;
    let document = open(&pdfium, path, password)?;
    Ok(document.pages().len() as usize)
}

/// Non-whitespace characters of native text across the first `max_pages` pages.
///
/// Any failure counts as "no text": the caller then falls through to OCR.
pub fn probe_native_text(path: &Path, max_pages: usize, password: Option<&str>) -> usize {
    match probe_blocking(path, max_pages, password) {
        Ok(n) => n,
        Err(e) => {
            debug!("Text probe failed for {}: {}", path.display(), e);
            0
        }
    }
}

fn probe_blocking(path: &Path, max_pages: usize, password: Option<&str>) -> Result<usize, LoaderError> {
    let pdfium = bind_local()?;
    let document = open(&pdfium, path, password)?;
    let pages = document.pages();
    let limit = (pages.len() as usize).min(max_pages);
    let mut chars = 0;
    for idx in 0..limit {
        let page = pages
            .get(idx as u16)
            .map_err(|e| LoaderError::Pdf(format!("{:?}", e)))?;
        let text = page
            .text()
            .map_err(|e| LoaderError::Pdf(format!("{:?}", e)))?;
        chars += text.all().chars().filter(|c| !c.is_whitespace()).count();
    }
    Ok(chars)
}

/// Extract the native text layer of every page.
pub async fn extract_text_pages(
    path: &Path,
    password: Option<&str>,
) -> Result<Vec<Page>, LoaderError> {
    let path = path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    tokio::task::spawn_blocking(move || extract_text_pages_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| LoaderError::Pdf(format!("Text extraction task panicked: {}", e)))?
}

fn extract_text_pages_blocking(path: &Path, password: Option<&str>) -> Result<Vec<Page>, LoaderError> {
    let pdfium = bind()?;
    let document = open(&pdfium, path, password)?;
    let pages = document.pages();
    let total = pages.len() as usize;

    let mut out = Vec::with_capacity(total);
    for index in 1..=total {
        out.push(Page::text(index, page_text(&pages, index)?));
    }
    info!("Extracted native text from {} pages", total);
    Ok(out)
}

/// Extract the native text of one page (1-based).
pub async fn extract_text_page(
    path: &Path,
    index: usize,
    password: Option<&str>,
) -> Result<Page, LoaderError> {
    let path = path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    tokio::task::spawn_blocking(move || {
        let pdfium = bind()?;
        let document = open(&pdfium, &path, pwd.as_deref())?;
        let text = page_text(&document.pages(), index)?;
        Ok(Page::text(index, text))
    })
    .await
    .map_err(|e| LoaderError::Pdf(format!("Text extraction task panicked: {}", e)))?
}

fn page_at<'a>(pages: &'a PdfPages<'a>, index: usize) -> Result<PdfPage<'a>, LoaderError> {
    let total = pages.len() as usize;
    if index == 0 || index > total {
        return Err(LoaderError::PageOutOfRange { index, total });
    }
    pages
        .get((index - 1) as u16)
        .map_err(|e| LoaderError::Pdf(format!("page {}: {:?}", index, e)))
}

fn page_text(pages: &PdfPages<'_>, index: usize) -> Result<String, LoaderError> {
    let page = page_at(pages, index)?;
    let text = page
        .text()
        .map_err(|e| LoaderError::Pdf(format!("page {}: {:?}", index, e)))?;
    Ok(text.all())
}

/// Rasterise every page, longest edge capped at `max_pixels`.
///
/// # Returns
/// `(page_index_1based, DynamicImage)` tuples in page order.
pub async fn render_pages(
    path: &Path,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<(usize, DynamicImage)>, LoaderError> {
    let path: PathBuf = path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    tokio::task::spawn_blocking(move || render_pages_blocking(&path, max_pixels, pwd.as_deref()))
        .await
        .map_err(|e| LoaderError::Pdf(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    path: &Path,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<(usize, DynamicImage)>, LoaderError> {
    let pdfium = bind()?;
    let document = open(&pdfium, path, password)?;
    let pages = document.pages();
    let total = pages.len() as usize;

    let mut results = Vec::with_capacity(total);
    for index in 1..=total {
        results.push((index, render_one(&pages, index, max_pixels)?));
    }
    Ok(results)
}

/// Rasterise one page (1-based), longest edge capped at `max_pixels`.
pub async fn render_page(
    path: &Path,
    index: usize,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<DynamicImage, LoaderError> {
    let path: PathBuf = path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    tokio::task::spawn_blocking(move || {
        let pdfium = bind()?;
        let document = open(&pdfium, &path, pwd.as_deref())?;
        render_one(&document.pages(), index, max_pixels)
    })
    .await
    .map_err(|e| LoaderError::Pdf(format!("Render task panicked: {}", e)))?
}

fn render_one(pages: &PdfPages<'_>, index: usize, max_pixels: u32) -> Result<DynamicImage, LoaderError> {
    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);
    let page = page_at(pages, index)?;
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| LoaderError::Pdf(format!("render page {}: {:?}", index, e)))?;
    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        index,
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn non_pdf_counts_as_one_page() {
        assert_eq!(count_pages(Path::new("scan.png"), None), 1);
        assert_eq!(count_pages(Path::new("sheet.xlsx"), None), 1);
    }

    #[test]
    fn unreadable_pdf_counts_as_one_page() {
        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"not a pdf at all").unwrap();
        assert_eq!(count_pages(f.path(), None), 1);
    }

    #[test]
    fn failed_probe_reports_no_text() {
        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"garbage").unwrap();
        assert_eq!(probe_native_text(f.path(), 3, None), 0);
    }

    #[test]
    fn counting_and_probing_never_download_pdfium() {
        let cache = tempfile::tempdir().unwrap();
        let override_dir = cache.path().join("pdfium-cache");
        std::env::remove_var("PDFIUM_LIB_PATH");
        std::env::set_var("PDFIUM_AUTO_CACHE_DIR", &override_dir);

        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"%PDF-1.7 truncated").unwrap();
        assert_eq!(count_pages(f.path(), None), 1);
        assert_eq!(probe_native_text(f.path(), 3, None), 0);

        std::env::remove_var("PDFIUM_AUTO_CACHE_DIR");
        assert!(!override_dir.exists(), "pdfium was fetched into the cache");
    }
}
