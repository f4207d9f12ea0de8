//! Data model shared by every pipeline stage.
//!
//! The extraction service answers with strings, and "nothing found" comes
//! back as a literal marker mixed in with real data. That marker is turned
//! into [`FieldValue::NotFound`] exactly once, at the extraction boundary
//! ([`crate::pipeline::extract`]); every later stage matches on the enum and
//! never compares strings against the marker again.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Text shown (and written to the spreadsheet) for a field that was not found.
pub const NOT_FOUND_TEXT: &str = "Tidak Ditemukan";

/// A single extracted field: either real data or the not-found sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "Option<String>")]
pub enum FieldValue {
    /// A non-empty, trimmed value.
    Present(String),
    /// The service could not find this field in the document.
    #[default]
    NotFound,
}

impl FieldValue {
    /// Build a field from raw service text, folding blanks and the
    /// not-found markers into [`FieldValue::NotFound`].
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case(NOT_FOUND_TEXT)
            || trimmed.eq_ignore_ascii_case("not found")
        {
            FieldValue::NotFound
        } else {
            FieldValue::Present(trimmed.to_string())
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, FieldValue::Present(_))
    }

    /// The value, if present.
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            FieldValue::Present(s) => Some(s),
            FieldValue::NotFound => None,
        }
    }

    /// Display text: the value itself, or [`NOT_FOUND_TEXT`].
    pub fn display(&self) -> &str {
        self.as_deref().unwrap_or(NOT_FOUND_TEXT)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(v: Option<String>) -> Self {
        v.map(|s| FieldValue::from_raw(&s)).unwrap_or_default()
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::from_raw(s)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Present(s) => serializer.serialize_some(s),
            FieldValue::NotFound => serializer.serialize_none(),
        }
    }
}

/// The ten personal-data fields extracted from one document.
///
/// Immutable once produced by the extraction adapter. Serialises with the
/// same keys the extraction service is asked to answer with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(rename = "nama", default)]
    pub name: FieldValue,
    /// 16-digit national identity number (NIK).
    #[serde(rename = "nik", default)]
    pub national_id: FieldValue,
    /// Utility customer reference (IDPEL).
    #[serde(rename = "idpel", default)]
    pub customer_id: FieldValue,
    #[serde(rename = "alamat", default)]
    pub address: FieldValue,
    #[serde(rename = "kelurahan", default)]
    pub subdistrict: FieldValue,
    #[serde(rename = "kecamatan", default)]
    pub district: FieldValue,
    #[serde(default)]
    pub rt: FieldValue,
    #[serde(default)]
    pub rw: FieldValue,
    #[serde(default)]
    pub email: FieldValue,
    #[serde(rename = "no_hp", default)]
    pub phone: FieldValue,
}

impl ExtractedRecord {
    /// Identity used for deduplication. Address and area fields are not part of it.
    pub fn key(&self) -> ConsolidatedKey {
        ConsolidatedKey {
            name: self.name.clone(),
            national_id: self.national_id.clone(),
            customer_id: self.customer_id.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }

    /// Field lookup by its extraction key (`nama`, `nik`, …).
    pub fn field(&self, key: FieldKey) -> &FieldValue {
        match key {
            FieldKey::Name => &self.name,
            FieldKey::NationalId => &self.national_id,
            FieldKey::CustomerId => &self.customer_id,
            FieldKey::Address => &self.address,
            FieldKey::Subdistrict => &self.subdistrict,
            FieldKey::District => &self.district,
            FieldKey::Rt => &self.rt,
            FieldKey::Rw => &self.rw,
            FieldKey::Email => &self.email,
            FieldKey::Phone => &self.phone,
        }
    }
}

/// Names the ten extracted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Name,
    NationalId,
    CustomerId,
    Address,
    Subdistrict,
    District,
    Rt,
    Rw,
    Email,
    Phone,
}

impl FieldKey {
    /// All fields in the order the service is asked for them.
    pub const ALL: [FieldKey; 10] = [
        FieldKey::Name,
        FieldKey::NationalId,
        FieldKey::CustomerId,
        FieldKey::Address,
        FieldKey::Subdistrict,
        FieldKey::District,
        FieldKey::Rt,
        FieldKey::Rw,
        FieldKey::Email,
        FieldKey::Phone,
    ];

    /// JSON key used on the extraction wire.
    pub fn json_key(self) -> &'static str {
        match self {
            FieldKey::Name => "nama",
            FieldKey::NationalId => "nik",
            FieldKey::CustomerId => "idpel",
            FieldKey::Address => "alamat",
            FieldKey::Subdistrict => "kelurahan",
            FieldKey::District => "kecamatan",
            FieldKey::Rt => "rt",
            FieldKey::Rw => "rw",
            FieldKey::Email => "email",
            FieldKey::Phone => "no_hp",
        }
    }

    /// Short human label, used by the CLI table.
    pub fn label(self) -> &'static str {
        match self {
            FieldKey::Name => "Nama",
            FieldKey::NationalId => "NIK",
            FieldKey::CustomerId => "IDPEL",
            FieldKey::Address => "Alamat",
            FieldKey::Subdistrict => "Kelurahan",
            FieldKey::District => "Kecamatan",
            FieldKey::Rt => "RT",
            FieldKey::Rw => "RW",
            FieldKey::Email => "Email",
            FieldKey::Phone => "No. HP/WA",
        }
    }
}

/// Deduplication identity: (name, national id, customer id, email, phone).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsolidatedKey {
    pub name: FieldValue,
    pub national_id: FieldValue,
    pub customer_id: FieldValue,
    pub email: FieldValue,
    pub phone: FieldValue,
}

// ── Documents ────────────────────────────────────────────────────────────

/// Coarse media classification driving which conversions are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Pdf,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime == "application/pdf" {
            MediaKind::Pdf
        } else {
            MediaKind::Other
        }
    }

    /// Output formats offered for this kind. `Original` is always first.
    pub fn available_formats(self) -> Vec<OutputFormat> {
        match self {
            MediaKind::Image => vec![OutputFormat::Original, OutputFormat::Pdf],
            MediaKind::Pdf => vec![OutputFormat::Original, OutputFormat::Jpg],
            MediaKind::Other => vec![OutputFormat::Original],
        }
    }
}

/// Download format for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The uploaded bytes, untouched.
    #[default]
    Original,
    /// Single-page PDF wrapping an image.
    Pdf,
    /// First page of a PDF rendered to JPEG.
    Jpg,
}

impl OutputFormat {
    /// File extension for converted formats; `None` for `Original`.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            OutputFormat::Original => None,
            OutputFormat::Pdf => Some("pdf"),
            OutputFormat::Jpg => Some("jpg"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Original => "original",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Jpg => "jpg",
        })
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" | "orig" => Ok(OutputFormat::Original),
            "pdf" => Ok(OutputFormat::Pdf),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            other => Err(format!("unknown format '{other}' (expected original, pdf or jpg)")),
        }
    }
}

/// An uploaded file: name, declared media type and raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Build from a name and bytes, guessing the media type from the extension.
    pub fn guess(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    /// File name without its last extension (`"scan.back.jpg"` → `"scan.back"`).
    ///
    /// `stem` and [`extension`](Self::extension) always split at the same
    /// dot, so `stem + "." + extension` gives back the name. A trailing dot
    /// or a leading-dot name (`".hidden"`) has no extension and keeps the
    /// whole name as its stem.
    pub fn stem(&self) -> &str {
        self.split_extension().0
    }

    /// Last extension of the file name, if any.
    pub fn extension(&self) -> Option<&str> {
        self.split_extension().1
    }

    fn split_extension(&self) -> (&str, Option<&str>) {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
            _ => (&self.name, None),
        }
    }
}

impl fmt::Debug for DocumentFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}
