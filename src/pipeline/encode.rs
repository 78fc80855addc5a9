//! Image encoding: pages and image files → base64 `ImageData`.
//!
//! Rendered pages are PNG-encoded (lossless keeps small print legible).
//! Image files the model APIs accept natively are sent byte-for-byte;
//! BMP and TIFF are decoded and re-encoded as PNG first.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// MIME types forwarded to the model without re-encoding.
const PASSTHROUGH_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode raw image-file bytes, re-encoding formats the APIs reject.
pub fn encode_image_bytes(bytes: &[u8], mime: &str) -> Result<ImageData, image::ImageError> {
    if PASSTHROUGH_MIME.contains(&mime) {
        let b64 = STANDARD.encode(bytes);
        debug!("Forwarding {} image → {} bytes base64", mime, b64.len());
        return Ok(ImageData::new(b64, mime).with_detail("high"));
    }
    let img = image::load_from_memory(bytes)?;
    encode_page(&img)
}

/// Read and encode an image file.
pub async fn encode_image_file(path: &Path, mime: &str) -> Result<ImageData, crate::error::LoaderError> {
    let bytes = tokio::fs::read(path).await?;
    encode_image_bytes(&bytes, mime).map_err(|e| crate::error::LoaderError::Image(e.to_string()))
}
