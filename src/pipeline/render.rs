//! PDF rasterisation via pdfium.
//!
//! Two callers need pixels from a PDF: the extraction service (leading
//! pages, capped in size, sent to the VLM as PNG) and the format converter
//! (first page at native scale, saved as JPEG). Both run inside
//! `spawn_blocking` because pdfium is a blocking C++ library.
//!
//! The library is bound from `PDFIUM_LIB_PATH` when set, otherwise from the
//! platform's default search path.

use image::DynamicImage;
use pdfium_render::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a PDF could not be rasterised.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No pdfium shared library could be bound.
    #[error("{0}")]
    Unbound(String),
    /// pdfium is available but the document or page failed.
    #[error("{0}")]
    Document(String),
}

/// Environment variable naming an explicit pdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to a pdfium library, honouring [`PDFIUM_LIB_PATH_ENV`].
pub fn bind_pdfium() -> Result<Pdfium, RenderError> {
    if let Ok(path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !path.is_empty() {
            return Pdfium::bind_to_library(&path)
                .map(Pdfium::new)
                .map_err(|e| RenderError::Unbound(format!("{PDFIUM_LIB_PATH_ENV}={path}: {e:?}")));
        }
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| RenderError::Unbound(format!("{e:?}")))
}

/// Whether a pdfium library can be bound in this environment.
pub fn pdfium_available() -> bool {
    bind_pdfium().is_ok()
}

/// Render up to `max_pages` leading pages, each capped at `max_pixels` on its longest edge.
///
/// Blocking; call from `spawn_blocking`.
pub fn render_leading_pages(
    pdf_bytes: &[u8],
    max_pages: usize,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, RenderError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| RenderError::Document(format!("cannot open PDF: {e:?}")))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(RenderError::Document("PDF has no pages".into()));
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let count = total_pages.min(max_pages);
    let mut images = Vec::with_capacity(count);

    for idx in 0..count {
        let page = match pages.get(idx as u16) {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping page {}: {:?}", idx + 1, e);
                continue;
            }
        };
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RenderError::Document(format!("page {}: {e:?}", idx + 1)))?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    if images.is_empty() {
        return Err(RenderError::Document("no page could be rendered".into()));
    }
    Ok(images)
}

/// Render the first page at scale 1.0 (one PDF point per pixel).
///
/// Blocking; call from `spawn_blocking`.
pub fn render_first_page(pdf_bytes: &[u8]) -> Result<DynamicImage, RenderError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| RenderError::Document(format!("cannot open PDF: {e:?}")))?;

    let page = document
        .pages()
        .get(0)
        .map_err(|e| RenderError::Document(format!("PDF has no first page: {e:?}")))?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(1.0);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| RenderError::Document(format!("page 1: {e:?}")))?;

    let image = bitmap.as_image();
    debug!("Rendered first page → {}x{} px", image.width(), image.height());
    Ok(image)
}
