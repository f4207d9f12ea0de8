//! Per-document format conversion.
//!
//! | from  | to         | how                                            |
//! |-------|------------|------------------------------------------------|
//! | any   | `Original` | bytes passed through                           |
//! | image | `Pdf`      | one page, MediaBox = pixel size, JPEG XObject  |
//! | PDF   | `Jpg`      | page 1 rendered by pdfium at scale 1.0         |
//!
//! Everything else is [`ConversionError::Unsupported`]. Both real
//! conversions are CPU-bound (and pdfium blocks), so [`convert`] runs them
//! on the blocking pool.

use crate::error::ConversionError;
use crate::pipeline::render::{self, RenderError};
use crate::record::{MediaKind, OutputFormat};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

/// JPEG quality for both the PDF-embedded image and rendered pages.
const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrientation {
    Portrait,
    Landscape,
}

/// Landscape iff wider than tall; squares are portrait.
pub fn page_orientation(width: u32, height: u32) -> PageOrientation {
    if width > height {
        PageOrientation::Landscape
    } else {
        PageOrientation::Portrait
    }
}

/// Convert on the blocking pool. `Original` returns the input unchanged.
pub async fn convert(
    bytes: Vec<u8>,
    kind: MediaKind,
    target: OutputFormat,
) -> Result<Vec<u8>, ConversionError> {
    if target == OutputFormat::Original {
        return Ok(bytes);
    }
    tokio::task::spawn_blocking(move || convert_blocking(&bytes, kind, target))
        .await
        .map_err(|e| ConversionError::EncodeFailed(format!("conversion task panicked: {e}")))?
}

/// Synchronous conversion. Blocking when the source is a PDF.
pub fn convert_blocking(
    bytes: &[u8],
    kind: MediaKind,
    target: OutputFormat,
) -> Result<Vec<u8>, ConversionError> {
    match (kind, target) {
        (_, OutputFormat::Original) => Ok(bytes.to_vec()),
        (MediaKind::Image, OutputFormat::Pdf) => image_to_pdf(bytes),
        (MediaKind::Pdf, OutputFormat::Jpg) => pdf_to_jpeg(bytes),
        (from, to) => Err(ConversionError::Unsupported { from, to }),
    }
}

/// Wrap an image in a single-page PDF the size of the image.
pub fn image_to_pdf(bytes: &[u8]) -> Result<Vec<u8>, ConversionError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ConversionError::DecodeFailed(e.to_string()))?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let jpeg = encode_jpeg(&rgb)?;

    debug!(
        "image → PDF: {}x{} px ({:?}), {} bytes JPEG",
        width,
        height,
        page_orientation(width, height),
        jpeg.len()
    );

    build_single_image_pdf(jpeg, width, height)
}

/// Render page 1 of a PDF to JPEG.
pub fn pdf_to_jpeg(bytes: &[u8]) -> Result<Vec<u8>, ConversionError> {
    let page = render::render_first_page(bytes).map_err(|e| match e {
        RenderError::Unbound(msg) => ConversionError::PdfiumUnavailable(msg),
        RenderError::Document(msg) => ConversionError::PdfRender(msg),
    })?;
    let rgb = page.to_rgb8();
    debug!("PDF → JPEG: {}x{} px", rgb.width(), rgb.height());
    encode_jpeg(&rgb)
}

fn encode_jpeg(rgb: &RgbImage) -> Result<Vec<u8>, ConversionError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(rgb)
        .map_err(|e| ConversionError::EncodeFailed(e.to_string()))?;
    Ok(buf)
}

/// One page of `width`×`height` points with the JPEG drawn over all of it.
fn build_single_image_pdf(jpeg: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, ConversionError> {
    let (w, h) = (i64::from(width), i64::from(height));
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w,
            "Height" => h,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    );
    // Already JPEG; deflating it again only costs time.
    image.allows_compression = false;
    let image_id = doc.add_object(image);

    let content = format!("q {w} 0 0 {h} 0 0 cm /Im0 Do Q");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| ConversionError::PdfBuild(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn media_box(pdf: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn orientation() {
        assert_eq!(page_orientation(800, 600), PageOrientation::Landscape);
        assert_eq!(page_orientation(600, 800), PageOrientation::Portrait);
        assert_eq!(page_orientation(500, 500), PageOrientation::Portrait);
    }

    #[test]
    fn image_to_pdf_page_matches_pixels() {
        let pdf = image_to_pdf(&png(320, 200)).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(media_box(&pdf), [0, 0, 320, 200]);
    }

    #[test]
    fn portrait_image_gives_portrait_page() {
        let pdf = image_to_pdf(&png(90, 160)).unwrap();
        assert_eq!(media_box(&pdf), [0, 0, 90, 160]);
    }

    #[test]
    fn corrupt_image_is_decode_failure() {
        let err = image_to_pdf(b"not an image").unwrap_err();
        assert!(matches!(err, ConversionError::DecodeFailed(_)));
    }

    #[test]
    fn unsupported_pairs() {
        let err = convert_blocking(b"x", MediaKind::Pdf, OutputFormat::Pdf).unwrap_err();
        assert!(matches!(err, ConversionError::Unsupported { .. }));
        let err = convert_blocking(b"x", MediaKind::Other, OutputFormat::Jpg).unwrap_err();
        assert!(matches!(err, ConversionError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn original_is_passthrough() {
        let out = convert(b"raw".to_vec(), MediaKind::Other, OutputFormat::Original)
            .await
            .unwrap();
        assert_eq!(out, b"raw");
    }

    #[tokio::test]
    async fn async_image_to_pdf() {
        let out = convert(png(10, 10), MediaKind::Image, OutputFormat::Pdf)
            .await
            .unwrap();
        assert!(!out.is_empty());
    }
}
