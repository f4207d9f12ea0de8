//! Attachment encoding for the extraction request.
//!
//! VLM APIs take images as base64 payloads inside the JSON request body.
//! Uploaded photos are forwarded as-is under their own media type; rendered
//! PDF pages are PNG-encoded first, since PNG keeps small print crisp.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Wrap an uploaded photo (JPEG, PNG, …) for the VLM without re-encoding.
pub fn encode_upload(bytes: &[u8], mime_type: &str) -> ImageData {
    attachment(bytes, mime_type)
}

/// PNG-encode a rendered PDF page and wrap it for the VLM.
pub fn encode_page(page: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut png = Cursor::new(Vec::new());
    page.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(attachment(png.get_ref(), "image/png"))
}

/// `detail: "high"` lets tiling models see the full-resolution scan; at
/// `low` the digits of a 16-digit NIK blur together.
fn attachment(bytes: &[u8], mime_type: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Attached {} ({} → {} bytes base64)", mime_type, bytes.len(), b64.len());
    ImageData::new(b64, mime_type).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_page() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn upload_keeps_media_type() {
        let data = encode_upload(b"\xFF\xD8\xFFfake-jpeg", "image/jpeg");
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), b"\xFF\xD8\xFFfake-jpeg");
    }
}
