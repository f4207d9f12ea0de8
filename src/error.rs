//! Error types for the edgequake-docfill library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`DocFillError`]: an operator command failed as a whole (unreadable
//!   template, nothing to export, nothing selected). Returned as `Err` from
//!   the [`crate::session::Session`] commands; the session's previously
//!   computed state is left untouched.
//!
//! * [`ExtractionError`]: a single document could not be read by the
//!   extraction service. Never propagated past the extraction adapter: the
//!   document simply ends up with no record and a fallback name.
//!
//! * [`ConversionError`]: a single document could not be converted to the
//!   requested download format. Other documents in the same download are
//!   unaffected; failures are aggregated into
//!   [`DocFillError::ConversionFailed`] only when nothing could be produced.

use crate::record::{MediaKind, OutputFormat};
use thiserror::Error;

/// Operation-level errors returned by session commands.
#[derive(Debug, Error)]
pub enum DocFillError {
    // ── Template errors ───────────────────────────────────────────────────
    /// The uploaded workbook is missing, corrupt, or has no header row.
    #[error("Could not read spreadsheet template: {detail}\nRe-upload a valid .xlsx/.xls/.ods file.")]
    TemplateReadFailed { detail: String },

    /// A spreadsheet export was requested before any template was uploaded.
    #[error("No spreadsheet template has been uploaded yet.")]
    TemplateMissing,

    // ── Operator errors ───────────────────────────────────────────────────
    /// Spreadsheet export requested before any document batch was processed.
    #[error("No documents have been processed yet; upload documents first.")]
    NoDataToExport,

    /// Document download requested with zero documents selected.
    #[error("Select at least one document to download.")]
    NoSelection,

    /// A command referenced a document index outside the current batch.
    #[error("Document {index} does not exist (batch has {len} documents)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The requested format is not offered for that document.
    #[error("Format '{format}' is not available for document {index}")]
    FormatUnavailable { index: usize, format: OutputFormat },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Every selected document failed to convert.
    #[error("{} document(s) could not be converted:\n{}", .failures.len(), format_failures(.failures))]
    ConversionFailed { failures: Vec<DocumentConversionFailure> },

    /// The filled workbook could not be serialised.
    #[error("Failed to write spreadsheet: {0}")]
    SpreadsheetWriteFailed(String),

    /// The download archive could not be assembled.
    #[error("Failed to build download archive: {0}")]
    ArchiveFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// One document that could not be converted, with the reason.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentConversionFailure {
    pub download_name: String,
    pub error: ConversionError,
}

fn format_failures(failures: &[DocumentConversionFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  • {}: {}", f.download_name, f.error))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A non-fatal failure to extract fields from one document.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The provider call itself failed (network, auth, quota, …).
    #[error("extraction service error: {0}")]
    Provider(String),

    /// The provider did not answer within the configured deadline.
    #[error("extraction timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered with no text.
    #[error("extraction service returned an empty response")]
    EmptyResponse,

    /// The answer did not contain a JSON object.
    #[error("could not parse extraction response: {0}")]
    MalformedResponse(String),

    /// The document's media type cannot be sent to the service.
    #[error("media type '{mime_type}' cannot be sent for extraction")]
    UnsupportedMedia { mime_type: String },

    /// A PDF could not be rasterised for the request.
    #[error("could not render PDF for extraction: {0}")]
    RenderFailed(String),
}

/// A non-fatal failure to convert one document.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ConversionError {
    /// No conversion exists between these formats.
    #[error("cannot convert {from:?} document to {to}")]
    Unsupported { from: MediaKind, to: OutputFormat },

    /// Source image bytes could not be decoded.
    #[error("could not decode image: {0}")]
    DecodeFailed(String),

    /// The converted image could not be encoded.
    #[error("could not encode image: {0}")]
    EncodeFailed(String),

    /// Assembling the output PDF failed.
    #[error("could not build PDF: {0}")]
    PdfBuild(String),

    /// pdfium failed to open or render the source PDF.
    #[error("could not render PDF: {0}")]
    PdfRender(String),

    /// No pdfium library could be bound.
    #[error(
        "PDFium library unavailable: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumUnavailable(String),
}
