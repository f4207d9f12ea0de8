//! Pipeline stages for document extraction, consolidation and export.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and the external collaborators (VLM, pdfium,
//! workbook formats) stay behind one module each.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──────── extract ◀── llm ◀── render/encode
//! files ──▶ batch ──▶ naming                     (VLM)
//!            │
//!            ├─▶ consolidate ──▶ columns ──▶ spreadsheet   (Dokumen_Terisi.xlsx)
//!            └─▶ convert ──▶ archive                       (file or Dokumen_Terunduh.zip)
//! ```
//!
//! 1. [`extract`]     : the extraction-service seam and response parsing
//! 2. [`llm`]         : edgequake-llm implementation of that seam
//! 3. [`render`]      : pdfium rasterisation; blocking, always behind `spawn_blocking`
//! 4. [`encode`]      : base64 attachments for the multimodal request
//! 5. [`naming`]      : collision-free download names
//! 6. [`batch`]       : fan-out extraction, join, name in upload order
//! 7. [`consolidate`] : dedupe by identity key, annotate missing identifiers
//! 8. [`columns`]     : header-driven column mapping
//! 9. [`spreadsheet`] : template read and filled-workbook write
//! 10. [`convert`]    : image → PDF, PDF → JPEG
//! 11. [`archive`]    : single-file or zip download

pub mod archive;
pub mod batch;
pub mod columns;
pub mod consolidate;
pub mod convert;
pub mod encode;
pub mod extract;
pub mod llm;
pub mod naming;
pub mod render;
pub mod spreadsheet;
