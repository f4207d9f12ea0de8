//! # edgequake-docfill
//!
//! Read scanned Indonesian identity and registration documents (KTP photos,
//! utility bills, application forms) with a Vision Language Model and merge
//! the extracted personal data into a spreadsheet template.
//!
//! ## Why this crate?
//!
//! Field offices collect the same ten data points (name, NIK, IDPEL,
//! address, kelurahan, kecamatan, RT, RW, email, phone) from stacks of
//! scans and retype them into whatever spreadsheet their head office sent.
//! This crate does the reading with a VLM, names every scan after the
//! person on it, drops duplicate people, flags missing identifiers and
//! fills the template's columns by matching its header text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! scans (jpg/png/pdf)
//!  │
//!  ├─ 1. Extract      one VLM call per document, concurrent, ten JSON fields
//!  ├─ 2. Name         "Budi", "Budi (1)", … in upload order
//!  ├─ 3. Consolidate  first record per (nama, nik, idpel, email, no_hp)
//!  ├─ 4. Map          template header → field, "keterangan" → annotation
//!  ├─ 5. Export       Dokumen_Terisi.xlsx
//!  └─ 6. Download     originals or converted (image → PDF, PDF → JPEG),
//!                     zipped as Dokumen_Terunduh.zip when more than one
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docfill::{DocFillConfig, DocumentFile, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let mut session = Session::from_config(DocFillConfig::default())?;
//!
//!     session.upload_template(&std::fs::read("template.xlsx")?)?;
//!     session
//!         .upload_documents(vec![DocumentFile::guess("ktp.jpg", std::fs::read("ktp.jpg")?)])
//!         .await;
//!
//!     let export = session.download_spreadsheet()?;
//!     std::fs::write(&export.file_name, &export.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docfill` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docfill = { version = "0.1", default-features = false }
//! ```
//!
//! PDF → JPEG conversion and PDF extraction need a pdfium shared library,
//! found via `PDFIUM_LIB_PATH`, the working directory, or the system path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocFillConfig, DocFillConfigBuilder};
pub use error::{ConversionError, DocFillError, DocumentConversionFailure, ExtractionError};
pub use pipeline::archive::{DownloadArtifact, ARCHIVE_FILE_NAME};
pub use pipeline::batch::{BatchOutcome, BatchStats, DocumentEntry};
pub use pipeline::consolidate::{Annotation, ConsolidatedRecord};
pub use pipeline::extract::{ExtractionAdapter, ExtractionRequest, ExtractionService};
pub use pipeline::llm::LlmExtractionService;
pub use pipeline::spreadsheet::{Cell, Template, SPREADSHEET_FILE_NAME};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{
    DocumentFile, ExtractedRecord, FieldKey, FieldValue, MediaKind, OutputFormat, NOT_FOUND_TEXT,
};
pub use session::{Session, SpreadsheetExport};
