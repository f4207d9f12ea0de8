//! Batch processing: files → extracted records → named document entries.
//!
//! Extraction calls fan out with `buffer_unordered(concurrency)`, each tagged
//! with its upload index. Nothing is named or published until every call has
//! resolved; the results are then sorted back into upload order and names are
//! resolved in that order, so collision counters never depend on which call
//! finished first.

use crate::config::DocFillConfig;
use crate::pipeline::extract::ExtractionAdapter;
use crate::pipeline::naming::{self, NameRegistry};
use crate::record::{DocumentFile, ExtractedRecord, MediaKind, OutputFormat};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One uploaded document as the operator sees it.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    file: DocumentFile,
    base_name: String,
    available_formats: Vec<OutputFormat>,
    format: OutputFormat,
    download_name: String,
    /// Included in the next document download.
    pub selected: bool,
}

impl DocumentEntry {
    /// New entry in `Original` format, unselected.
    pub fn new(file: DocumentFile, base_name: String) -> Self {
        let available_formats = file.media_kind().available_formats();
        let download_name = naming::download_name(&base_name, &file, OutputFormat::Original);
        Self {
            file,
            base_name,
            available_formats,
            format: OutputFormat::Original,
            download_name,
            selected: false,
        }
    }

    pub fn file(&self) -> &DocumentFile {
        &self.file
    }

    pub fn media_kind(&self) -> MediaKind {
        self.file.media_kind()
    }

    /// Collision-free name without extension.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Offered formats; always starts with `Original`.
    pub fn available_formats(&self) -> &[OutputFormat] {
        &self.available_formats
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    /// Switch format and re-derive the download name.
    ///
    /// Returns `false` (and changes nothing) if the format is not offered.
    pub fn set_format(&mut self, format: OutputFormat) -> bool {
        if !self.available_formats.contains(&format) {
            return false;
        }
        self.format = format;
        self.download_name = naming::download_name(&self.base_name, &self.file, format);
        true
    }
}

/// Counters for one processed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub extracted: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Everything a batch produced, in upload order.
///
/// `entries[i]` and `records[i]` describe the same upload.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub entries: Vec<DocumentEntry>,
    pub records: Vec<Option<ExtractedRecord>>,
    pub stats: BatchStats,
}

/// Extract every file, then name and register them in upload order.
pub async fn process_batch(
    adapter: &ExtractionAdapter,
    files: Vec<DocumentFile>,
    config: &DocFillConfig,
) -> BatchOutcome {
    let start = Instant::now();
    let total = files.len();
    info!("Processing batch of {} document(s)", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut results: Vec<(usize, Option<ExtractedRecord>)> =
        stream::iter(files.iter().enumerate().map(|(index, file)| {
            let adapter = adapter.clone();
            let cb = config.progress_callback.clone();
            async move {
                if let Some(ref cb) = cb {
                    cb.on_document_start(index, total, &file.name);
                }
                let result = adapter.try_extract(&file.bytes, &file.mime_type).await;
                let record = match result {
                    Ok(record) => {
                        if let Some(ref cb) = cb {
                            cb.on_document_complete(index, total, &file.name);
                        }
                        Some(record)
                    }
                    Err(e) => {
                        warn!("{}: extraction failed: {}", file.name, e);
                        if let Some(ref cb) = cb {
                            cb.on_document_error(index, total, &file.name, &e.to_string());
                        }
                        None
                    }
                };
                (index, record)
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    // Join barrier passed: restore upload order before naming.
    results.sort_by_key(|(index, _)| *index);

    let mut registry = NameRegistry::new();
    let mut entries = Vec::with_capacity(total);
    let mut records = Vec::with_capacity(total);
    for (file, (_, record)) in files.into_iter().zip(results) {
        let base = registry.resolve(record.as_ref(), file.stem());
        debug!("{} → {}", file.name, base);
        entries.push(DocumentEntry::new(file, base));
        records.push(record);
    }

    let extracted = records.iter().filter(|r| r.is_some()).count();
    let stats = BatchStats {
        total,
        extracted,
        failed: total - extracted,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} extracted, {}ms",
        stats.extracted, stats.total, stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, extracted);
    }

    BatchOutcome {
        entries,
        records,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::pipeline::extract::{ExtractionRequest, ExtractionService};
    use crate::progress::BatchProgressCallback;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers with the document bytes as the extracted name, after a delay
    /// that makes later uploads finish first.
    struct EchoName;

    #[async_trait]
    impl ExtractionService for EchoName {
        async fn request(&self, r: ExtractionRequest<'_>) -> Result<String, ExtractionError> {
            let text = String::from_utf8_lossy(r.document).to_string();
            let delay = 50u64.saturating_sub(text.len() as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if text == "fail" {
                return Err(ExtractionError::Provider("boom".into()));
            }
            Ok(format!(r#"{{"nama": "{text}", "nik": "1", "idpel": "2"}}"#))
        }
    }

    fn file(name: &str, body: &str) -> DocumentFile {
        DocumentFile::guess(name, body.as_bytes().to_vec())
    }

    #[derive(Default)]
    struct Counts {
        starts: AtomicUsize,
        errors: AtomicUsize,
        batch_done: AtomicUsize,
    }

    impl BatchProgressCallback for Counts {
        fn on_document_start(&self, _: usize, _: usize, _: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_document_error(&self, _: usize, _: usize, _: &str, _: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_batch_complete(&self, _: usize, extracted: usize) {
            self.batch_done.store(extracted, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn names_follow_upload_order() {
        let adapter = ExtractionAdapter::new(Arc::new(EchoName));
        let config = DocFillConfig::builder().concurrency(4).build().unwrap();
        let files = vec![
            file("a.jpg", "Budi"),
            file("b.jpg", "Budi Santoso Wijaya"),
            file("c.jpg", "Budi"),
            file("d.pdf", "fail"),
        ];
        let out = process_batch(&adapter, files, &config).await;

        let names: Vec<_> = out.entries.iter().map(|e| e.download_name()).collect();
        assert_eq!(names, ["Budi.jpg", "Budi Santoso Wijaya.jpg", "Budi (1).jpg", "d.pdf"]);
        assert!(out.records[3].is_none());
        assert_eq!(out.stats.extracted, 3);
        assert_eq!(out.stats.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn every_entry_gets_a_unique_name() {
        let adapter = ExtractionAdapter::new(Arc::new(EchoName));
        let config = DocFillConfig::default();
        let files: Vec<_> = (0..12).map(|i| file(&format!("f{i}.png"), "Sama")).collect();
        let out = process_batch(&adapter, files, &config).await;

        assert_eq!(out.entries.len(), 12);
        let unique: HashSet<_> = out.entries.iter().map(|e| e.download_name()).collect();
        assert_eq!(unique.len(), 12);
        assert!(out.entries.iter().all(|e| !e.selected));
        assert!(out.entries.iter().all(|e| e.format() == OutputFormat::Original));
    }

    #[tokio::test(start_paused = true)]
    async fn callbacks_fire() {
        let counts = Arc::new(Counts::default());
        let config = DocFillConfig::builder()
            .progress_callback(counts.clone())
            .build()
            .unwrap();
        let adapter = ExtractionAdapter::new(Arc::new(EchoName));
        let files = vec![file("a.jpg", "Ani"), file("b.jpg", "fail")];
        process_batch(&adapter, files, &config).await;

        assert_eq!(counts.starts.load(Ordering::SeqCst), 2);
        assert_eq!(counts.errors.load(Ordering::SeqCst), 1);
        assert_eq!(counts.batch_done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_format_rederives_name() {
        let mut entry = DocumentEntry::new(file("scan.jpeg", ""), "Budi".into());
        assert_eq!(entry.download_name(), "Budi.jpeg");
        assert!(entry.set_format(OutputFormat::Pdf));
        assert_eq!(entry.download_name(), "Budi.pdf");
        assert!(!entry.set_format(OutputFormat::Jpg));
        assert_eq!(entry.format(), OutputFormat::Pdf);
        assert!(entry.set_format(OutputFormat::Original));
        assert_eq!(entry.download_name(), "Budi.jpeg");
    }

    #[tokio::test]
    async fn empty_batch() {
        let adapter = ExtractionAdapter::new(Arc::new(EchoName));
        let out = process_batch(&adapter, vec![], &DocFillConfig::default()).await;
        assert!(out.entries.is_empty());
        assert_eq!(out.stats.total, 0);
    }
}
