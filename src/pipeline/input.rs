//! Input resolution: normalise a user-supplied path or URL to a local file,
//! and classify it by extension.
//!
//! pdfium and calamine both need a file-system path, so URL inputs are
//! downloaded into a `TempDir` that lives as long as the [`ResolvedInput`].

use crate::error::DocExtractError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Image extensions routed to the vision loader.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "gif", "bmp", "webp"];

/// Spreadsheet extensions routed to the tabular loader.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Coarse file type, decided from the extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    Spreadsheet,
    Other,
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn file_kind(path: &Path) -> FileKind {
    match extension(path).as_deref() {
        Some("pdf") => FileKind::Pdf,
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => FileKind::Image,
        Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext) => FileKind::Spreadsheet,
        _ => FileKind::Other,
    }
}

/// MIME type for an image path, used when sending the file as-is.
pub fn image_mime(path: &Path) -> Option<&'static str> {
    match extension(path).as_deref()? {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// The resolved input: a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the file lives in a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocExtractError> {
    if input.trim().is_empty() {
        return Err(DocExtractError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, DocExtractError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(DocExtractError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocExtractError::PermissionDenied { path });
        }
        Err(_) => return Err(DocExtractError::FileNotFound { path }),
    }

    debug!("Resolved local input: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocExtractError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let filename = extract_filename(url, content_type.as_deref());

    let temp_dir = TempDir::new().map_err(|e| DocExtractError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocExtractError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Pick a filename that keeps the extension loader selection relies on.
fn extract_filename(url: &str, content_type: Option<&str>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    let ext = match content_type.map(|c| c.split(';').next().unwrap_or("").trim()) {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        Some("image/tiff") => "tiff",
        Some("text/plain") | Some("text/csv") => "txt",
        Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet") => "xlsx",
        _ => "pdf",
    };
    format!("downloaded.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_file_kind_by_extension() {
        assert_eq!(file_kind(Path::new("a/scan.PDF")), FileKind::Pdf);
        assert_eq!(file_kind(Path::new("id.jpeg")), FileKind::Image);
        assert_eq!(file_kind(Path::new("id.webp")), FileKind::Image);
        assert_eq!(file_kind(Path::new("book.xlsx")), FileKind::Spreadsheet);
        assert_eq!(file_kind(Path::new("notes.txt")), FileKind::Other);
        assert_eq!(file_kind(Path::new("README")), FileKind::Other);
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(image_mime(Path::new("a.png")), Some("image/png"));
        assert_eq!(image_mime(Path::new("a.pdf")), None);
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(
            extract_filename("https://example.com/files/cccd.png", None),
            "cccd.png"
        );
        assert_eq!(
            extract_filename("https://example.com/download?id=3", Some("image/jpeg; q=1")),
            "downloaded.jpg"
        );
        assert_eq!(
            extract_filename("https://example.com/", None),
            "downloaded.pdf"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DocExtractError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_existing_file_resolves() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let resolved = resolve_input(file.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), file.path());
    }
}
