//! Document downloads: convert the selected documents and package them.
//!
//! One selected document downloads as itself under its download name; two
//! or more go into `Dokumen_Terunduh.zip`. A document that fails to convert
//! is left out of the archive and reported, and the rest still download.
//! Only when nothing at all could be produced does the download fail.

use crate::error::{DocFillError, DocumentConversionFailure};
use crate::pipeline::convert;
use crate::record::{MediaKind, OutputFormat};
use futures::future::join_all;
use serde::Serialize;
use std::io::{Cursor, Write};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// File name of a multi-document download.
pub const ARCHIVE_FILE_NAME: &str = "Dokumen_Terunduh.zip";

/// One selected document, ready to convert.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub download_name: String,
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
    pub format: OutputFormat,
}

/// What the operator receives from a document download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadArtifact {
    /// A document's download name, or [`ARCHIVE_FILE_NAME`].
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Names stored in the archive; a single entry for a direct download.
    pub entries: Vec<String>,
    /// Documents left out because they failed to convert.
    pub skipped: Vec<DocumentConversionFailure>,
}

impl DownloadArtifact {
    pub fn is_archive(&self) -> bool {
        self.file_name == ARCHIVE_FILE_NAME
    }
}

/// Convert every job and package the results.
pub async fn build_download(jobs: Vec<DownloadJob>) -> Result<DownloadArtifact, DocFillError> {
    if jobs.is_empty() {
        return Err(DocFillError::NoSelection);
    }
    let single = jobs.len() == 1;

    let results = join_all(jobs.into_iter().map(|job| async move {
        let DownloadJob {
            download_name,
            bytes,
            kind,
            format,
        } = job;
        let result = convert::convert(bytes, kind, format).await;
        (download_name, result)
    }))
    .await;

    let mut converted = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (download_name, result) in results {
        match result {
            Ok(bytes) => converted.push((download_name, bytes)),
            Err(error) => {
                warn!("{}: conversion failed: {}", download_name, error);
                failures.push(DocumentConversionFailure {
                    download_name,
                    error,
                });
            }
        }
    }

    if converted.is_empty() {
        return Err(DocFillError::ConversionFailed { failures });
    }

    if single {
        let (file_name, bytes) = converted.remove(0);
        return Ok(DownloadArtifact {
            entries: vec![file_name.clone()],
            file_name,
            bytes,
            skipped: failures,
        });
    }

    let entries: Vec<String> = converted.iter().map(|(n, _)| n.clone()).collect();
    let bytes = write_zip(&converted).map_err(DocFillError::ArchiveFailed)?;
    info!(
        "Packaged {} document(s) into {} ({} skipped, {} bytes)",
        entries.len(),
        ARCHIVE_FILE_NAME,
        failures.len(),
        bytes.len()
    );

    Ok(DownloadArtifact {
        file_name: ARCHIVE_FILE_NAME.to_string(),
        bytes,
        entries,
        skipped: failures,
    })
}

/// Deflate `files` into an in-memory zip, one entry per name.
pub fn write_zip(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>, String> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in files {
        zip.start_file(name.as_str(), opts)
            .map_err(|e| format!("{name}: {e}"))?;
        zip.write_all(data).map_err(|e| format!("{name}: {e}"))?;
    }

    let cursor = zip.finish().map_err(|e| e.to_string())?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use std::io::Read;
    use zip::ZipArchive;

    fn job(name: &str, bytes: &[u8], kind: MediaKind, format: OutputFormat) -> DownloadJob {
        DownloadJob {
            download_name: name.into(),
            bytes: bytes.to_vec(),
            kind,
            format,
        }
    }

    fn zip_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn empty_selection() {
        let err = build_download(vec![]).await.unwrap_err();
        assert!(matches!(err, DocFillError::NoSelection));
    }

    #[tokio::test]
    async fn single_document_is_direct() {
        let out = build_download(vec![job("Budi.jpg", b"jpeg", MediaKind::Image, OutputFormat::Original)])
            .await
            .unwrap();
        assert_eq!(out.file_name, "Budi.jpg");
        assert_eq!(out.bytes, b"jpeg");
        assert!(!out.is_archive());
    }

    #[tokio::test]
    async fn three_documents_three_entries() {
        let out = build_download(vec![
            job("Budi.jpg", b"1", MediaKind::Image, OutputFormat::Original),
            job("Budi (1).pdf", b"2", MediaKind::Pdf, OutputFormat::Original),
            job("Ani.txt", b"3", MediaKind::Other, OutputFormat::Original),
        ])
        .await
        .unwrap();
        assert!(out.is_archive());
        assert_eq!(zip_names(&out.bytes), ["Budi.jpg", "Budi (1).pdf", "Ani.txt"]);

        let mut archive = ZipArchive::new(Cursor::new(&out.bytes)).unwrap();
        let mut body = String::new();
        archive.by_name("Ani.txt").unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "3");
    }

    #[tokio::test]
    async fn failed_document_is_skipped_not_fatal() {
        let out = build_download(vec![
            job("Budi.pdf", b"not an image", MediaKind::Image, OutputFormat::Pdf),
            job("Ani.jpg", b"ok", MediaKind::Image, OutputFormat::Original),
        ])
        .await
        .unwrap();
        assert_eq!(zip_names(&out.bytes), ["Ani.jpg"]);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].download_name, "Budi.pdf");
        assert!(matches!(out.skipped[0].error, ConversionError::DecodeFailed(_)));
    }

    #[tokio::test]
    async fn everything_failing_aggregates() {
        let err = build_download(vec![
            job("a.pdf", b"x", MediaKind::Image, OutputFormat::Pdf),
            job("b.pdf", b"y", MediaKind::Image, OutputFormat::Pdf),
        ])
        .await
        .unwrap_err();
        match err {
            DocFillError::ConversionFailed { failures } => assert_eq!(failures.len(), 2),
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn single_failure_is_conversion_failed() {
        let err = build_download(vec![job("a.pdf", b"x", MediaKind::Image, OutputFormat::Pdf)])
            .await
            .unwrap_err();
        assert!(matches!(err, DocFillError::ConversionFailed { ref failures } if failures.len() == 1));
    }
}
