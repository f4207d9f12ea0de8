//! Filename resolution: one collision-free, human-readable name per document.
//!
//! A document is named after the person extracted from it. Two uploads of
//! the same person's paperwork would otherwise share a name, so the
//! resolver keeps a per-batch counter per base name: the first occurrence
//! gets the bare base, later ones get ` (1)`, ` (2)`, … in upload order.

use crate::record::{DocumentFile, ExtractedRecord, OutputFormat};
use std::collections::{HashMap, HashSet};

/// Base name used when neither the record nor the file name yields one.
pub const FALLBACK_BASE_NAME: &str = "dokumen";

/// Keep ASCII letters, digits and whitespace; trim the result.
pub fn sanitize_base_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Base name for a document: the extracted name if usable, else the file stem.
pub fn base_name(record: Option<&ExtractedRecord>, fallback_stem: &str) -> String {
    let from_record = record
        .and_then(|r| r.name.as_deref())
        .map(sanitize_base_name)
        .filter(|s| !s.is_empty());

    if let Some(name) = from_record {
        return name;
    }

    let stem = fallback_stem.trim();
    if stem.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        stem.to_string()
    }
}

/// Batch-scoped registry of issued names.
///
/// Create one per batch; names are only unique within a single registry.
#[derive(Debug, Default)]
pub struct NameRegistry {
    counters: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the unique name for the next document in upload order.
    pub fn resolve(&mut self, record: Option<&ExtractedRecord>, fallback_stem: &str) -> String {
        let base = base_name(record, fallback_stem);
        self.claim(&base)
    }

    /// Claim `base`, or the first free `base (n)`.
    pub fn claim(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);

        let mut candidate = if *counter == 0 {
            base.to_string()
        } else {
            format!("{base} ({counter})")
        };
        // A literal "Budi (1)" may already have been issued as a bare base.
        while self.issued.contains(&candidate) {
            *counter += 1;
            candidate = format!("{base} ({counter})");
        }
        *counter += 1;

        self.issued.insert(candidate.clone());
        candidate
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

/// Download name for a resolved base and the chosen format.
///
/// `Original` keeps the uploaded file's extension (or none); converted
/// formats use their own.
pub fn download_name(base: &str, file: &DocumentFile, format: OutputFormat) -> String {
    let ext = match format {
        OutputFormat::Original => file.extension(),
        other => other.extension(),
    };
    match ext {
        Some(ext) => format!("{base}.{ext}"),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn named(name: &str) -> ExtractedRecord {
        ExtractedRecord {
            name: FieldValue::from_raw(name),
            ..Default::default()
        }
    }

    #[test]
    fn sanitize_strips_punctuation() {
        assert_eq!(sanitize_base_name("  Budi, S.Kom. "), "Budi SKom");
        assert_eq!(sanitize_base_name("Siti/Aminah?"), "SitiAminah");
        assert_eq!(sanitize_base_name("***"), "");
    }

    #[test]
    fn falls_back_to_stem() {
        assert_eq!(base_name(None, "scan_001"), "scan_001");
        assert_eq!(base_name(Some(&ExtractedRecord::default()), "ktp"), "ktp");
        assert_eq!(base_name(Some(&named("!!!")), "ktp"), "ktp");
        assert_eq!(base_name(None, "  "), FALLBACK_BASE_NAME);
    }

    #[test]
    fn collisions_get_counters_in_order() {
        let mut reg = NameRegistry::new();
        let budi = named("Budi");
        assert_eq!(reg.resolve(Some(&budi), "a"), "Budi");
        assert_eq!(reg.resolve(Some(&budi), "b"), "Budi (1)");
        assert_eq!(reg.resolve(Some(&named("Ani")), "c"), "Ani");
        assert_eq!(reg.resolve(Some(&budi), "d"), "Budi (2)");
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn literal_suffix_never_collides() {
        let mut reg = NameRegistry::new();
        assert_eq!(reg.claim("Budi"), "Budi");
        assert_eq!(reg.claim("Budi (1)"), "Budi (1)");
        assert_eq!(reg.claim("Budi"), "Budi (2)");
        assert_eq!(reg.claim("Budi (1)"), "Budi (1) (1)");
    }

    #[test]
    fn download_name_follows_format() {
        let jpg = DocumentFile::new("scan.JPG", "image/jpeg", vec![]);
        assert_eq!(download_name("Budi", &jpg, OutputFormat::Original), "Budi.JPG");
        assert_eq!(download_name("Budi", &jpg, OutputFormat::Pdf), "Budi.pdf");

        let pdf = DocumentFile::new("form.pdf", "application/pdf", vec![]);
        assert_eq!(download_name("Ani (1)", &pdf, OutputFormat::Jpg), "Ani (1).jpg");

        let bare = DocumentFile::new("noext", "application/octet-stream", vec![]);
        assert_eq!(download_name("x", &bare, OutputFormat::Original), "x");
    }
}
