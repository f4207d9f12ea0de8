//! Application state and the operator commands that drive it.
//!
//! A [`Session`] owns everything one operator works with: the uploaded
//! template, the current document batch (entries plus their extracted
//! records) and the last status message. Each command is a transition on
//! that one structure. A command that fails returns `Err`, updates the
//! status message and leaves everything else as it was.

use crate::config::DocFillConfig;
use crate::error::DocFillError;
use crate::pipeline::archive::{self, DownloadArtifact, DownloadJob};
use crate::pipeline::batch::{self, BatchStats, DocumentEntry};
use crate::pipeline::consolidate::{self, ConsolidatedRecord};
use crate::pipeline::extract::{ExtractionAdapter, ExtractionService};
use crate::pipeline::llm::LlmExtractionService;
use crate::pipeline::spreadsheet::{self, Template, SPREADSHEET_FILE_NAME};
use crate::record::{DocumentFile, ExtractedRecord, OutputFormat};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Status messages shown to the operator.
pub mod status {
    pub const READY: &str = "Aplikasi siap. Silakan unggah template Excel.";
    pub const TEMPLATE_READ: &str = "Header Excel berhasil dibaca. Unggah dokumen untuk diproses.";
    pub const TEMPLATE_FAILED: &str = "Gagal membaca file Excel. Pastikan formatnya benar.";
    pub const DATA_INCOMPLETE: &str = "Data belum lengkap. Silakan proses dokumen terlebih dahulu.";
    pub const SPREADSHEET_DONE: &str = "File Excel berhasil diunduh.";
    pub const SPREADSHEET_FAILED: &str = "Terjadi kesalahan saat mengunduh Excel. Coba lagi.";
    pub const NOTHING_SELECTED: &str = "Pilih dokumen yang ingin diunduh.";
    pub const DOCUMENT_DONE: &str = "Dokumen berhasil diunduh.";
    pub const ARCHIVE_DONE: &str = "Dokumen berhasil diunduh dalam format ZIP.";
    pub const DOWNLOAD_FAILED: &str =
        "Terjadi kesalahan saat mengunduh/mengonversi dokumen. Coba unggah ulang.";

    pub fn batch_done(count: usize) -> String {
        format!("{count} dokumen berhasil diproses! Data siap untuk mengisi Excel.")
    }
}

/// The filled workbook.
#[derive(Debug, Clone, Serialize)]
pub struct SpreadsheetExport {
    /// Always [`SPREADSHEET_FILE_NAME`].
    pub file_name: String,
    pub sheet_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Rows appended below the template's own rows.
    pub rows_appended: usize,
}

/// One operator's working state.
pub struct Session {
    adapter: ExtractionAdapter,
    config: DocFillConfig,
    template: Option<Template>,
    entries: Vec<DocumentEntry>,
    records: Vec<Option<ExtractedRecord>>,
    last_batch: Option<BatchStats>,
    status: String,
}

impl Session {
    /// Session over an explicit extraction service.
    pub fn new(service: Arc<dyn ExtractionService>, config: DocFillConfig) -> Self {
        let adapter = ExtractionAdapter::new(service)
            .with_instruction(config.instruction.clone())
            .with_timeout(Duration::from_secs(config.api_timeout_secs));
        Self {
            adapter,
            config,
            template: None,
            entries: Vec::new(),
            records: Vec::new(),
            last_batch: None,
            status: status::READY.to_string(),
        }
    }

    /// Session backed by the configured LLM provider.
    pub fn from_config(config: DocFillConfig) -> Result<Self, DocFillError> {
        let service = LlmExtractionService::from_config(&config)?;
        Ok(Self::new(Arc::new(service), config))
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Read and keep a spreadsheet template. A bad file keeps the previous one.
    pub fn upload_template(&mut self, bytes: &[u8]) -> Result<&Template, DocFillError> {
        match spreadsheet::read_template(bytes) {
            Ok(template) => {
                info!(
                    "Template '{}' loaded ({} columns)",
                    template.sheet_name,
                    template.header.len()
                );
                self.status = status::TEMPLATE_READ.to_string();
                Ok(self.template.insert(template))
            }
            Err(e) => {
                warn!("Template rejected: {}", e);
                self.status = status::TEMPLATE_FAILED.to_string();
                Err(e)
            }
        }
    }

    /// Extract a new batch, replacing the previous one entirely.
    ///
    /// An empty list clears the batch. Never fails: documents that cannot
    /// be read end up with no record and a file-name-based download name.
    pub async fn upload_documents(&mut self, files: Vec<DocumentFile>) -> BatchStats {
        if files.is_empty() {
            self.entries.clear();
            self.records.clear();
            self.last_batch = None;
            self.status = status::READY.to_string();
            return BatchStats::default();
        }

        let outcome = batch::process_batch(&self.adapter, files, &self.config).await;
        self.entries = outcome.entries;
        self.records = outcome.records;
        self.last_batch = Some(outcome.stats.clone());
        self.status = status::batch_done(outcome.stats.total);
        outcome.stats
    }

    /// Flip a document's selection; returns the new state.
    pub fn toggle_select(&mut self, index: usize) -> Result<bool, DocFillError> {
        let entry = self.entry_mut(index)?;
        entry.selected = !entry.selected;
        Ok(entry.selected)
    }

    /// Change a document's download format; returns the new download name.
    pub fn set_format(&mut self, index: usize, format: OutputFormat) -> Result<&str, DocFillError> {
        let entry = self.entry_mut(index)?;
        if !entry.set_format(format) {
            return Err(DocFillError::FormatUnavailable { index, format });
        }
        Ok(entry.download_name())
    }

    /// Fill the template with the consolidated records.
    pub fn download_spreadsheet(&mut self) -> Result<SpreadsheetExport, DocFillError> {
        let result = self.build_spreadsheet();
        self.status = match &result {
            Ok(_) => status::SPREADSHEET_DONE,
            Err(DocFillError::NoDataToExport | DocFillError::TemplateMissing) => {
                status::DATA_INCOMPLETE
            }
            Err(_) => status::SPREADSHEET_FAILED,
        }
        .to_string();
        result
    }

    /// Convert and package every selected document.
    pub async fn download_documents(&mut self) -> Result<DownloadArtifact, DocFillError> {
        let jobs: Vec<DownloadJob> = self
            .entries
            .iter()
            .filter(|e| e.selected)
            .map(|e| DownloadJob {
                download_name: e.download_name().to_string(),
                bytes: e.file().bytes.clone(),
                kind: e.media_kind(),
                format: e.format(),
            })
            .collect();

        let result = archive::build_download(jobs).await;
        self.status = match &result {
            Ok(a) if a.is_archive() => status::ARCHIVE_DONE,
            Ok(_) => status::DOCUMENT_DONE,
            Err(DocFillError::NoSelection) => status::NOTHING_SELECTED,
            Err(_) => status::DOWNLOAD_FAILED,
        }
        .to_string();
        result
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn entries(&self) -> &[DocumentEntry] {
        &self.entries
    }

    /// Extraction results, index-aligned with [`entries`](Self::entries).
    pub fn records(&self) -> &[Option<ExtractedRecord>] {
        &self.records
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.selected).count()
    }

    /// Stats of the current batch, if one has been processed.
    pub fn last_batch(&self) -> Option<&BatchStats> {
        self.last_batch.as_ref()
    }

    /// The rows the spreadsheet export would append.
    pub fn consolidated(&self) -> Vec<ConsolidatedRecord> {
        consolidate::consolidate(&self.records)
    }

    pub fn config(&self) -> &DocFillConfig {
        &self.config
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn entry_mut(&mut self, index: usize) -> Result<&mut DocumentEntry, DocFillError> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(DocFillError::IndexOutOfRange { index, len })
    }

    fn build_spreadsheet(&self) -> Result<SpreadsheetExport, DocFillError> {
        if self.last_batch.is_none() {
            return Err(DocFillError::NoDataToExport);
        }
        let template = self.template.as_ref().ok_or(DocFillError::TemplateMissing)?;

        let consolidated = self.consolidated();
        let rows = spreadsheet::filled_rows(template, &consolidated);
        let bytes = spreadsheet::write_workbook(&template.sheet_name, &rows)?;

        info!(
            "Filled '{}' with {} row(s) from {} record(s)",
            template.sheet_name,
            consolidated.len(),
            self.records.len()
        );

        Ok(SpreadsheetExport {
            file_name: SPREADSHEET_FILE_NAME.to_string(),
            sheet_name: template.sheet_name.clone(),
            bytes,
            rows_appended: consolidated.len(),
        })
    }
}
