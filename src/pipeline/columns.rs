//! Column mapping: template header + consolidated record → output row.
//!
//! Templates come from different offices and spell their headers every
//! which way ("NOMOR KARTU IDENTITAS", "nik", "No_HP"). Headers are
//! normalised (lowercase, whitespace and underscores removed) and matched
//! against an ordered keyword table. Per column, the first rule that fires
//! wins:
//!
//! 1. contains `keterangan` → the annotation
//! 2. index 17 or 19 → always blank
//! 3. first keyword-table hit → that field
//! 4. otherwise blank

use crate::pipeline::consolidate::Annotation;
use crate::record::{ExtractedRecord, FieldKey};

/// Zero-based column indices that are never written.
pub const RESERVED_BLANK_COLUMNS: [usize; 2] = [17, 19];

const ANNOTATION_MARKER: &str = "keterangan";

/// How a header keyword is compared with the normalised header.
#[derive(Debug, Clone, Copy)]
enum Match {
    Contains(&'static str),
    Exact(&'static str),
}

impl Match {
    fn hits(self, normalized: &str) -> bool {
        match self {
            Match::Contains(k) => normalized.contains(k),
            Match::Exact(k) => normalized == k,
        }
    }
}

/// Checked top to bottom; the first hit wins.
const KEYWORDS: &[(&[Match], FieldKey)] = &[
    (&[Match::Contains("nama")], FieldKey::Name),
    (
        &[Match::Contains("nomorkartuidentitas"), Match::Contains("nik")],
        FieldKey::NationalId,
    ),
    (
        &[Match::Contains("idpelangganpln"), Match::Contains("idpel")],
        FieldKey::CustomerId,
    ),
    (&[Match::Contains("alamat")], FieldKey::Address),
    (&[Match::Contains("kelurahan")], FieldKey::Subdistrict),
    (&[Match::Contains("kecamatan")], FieldKey::District),
    (&[Match::Exact("rt")], FieldKey::Rt),
    (&[Match::Exact("rw")], FieldKey::Rw),
    (
        &[Match::Contains("email"), Match::Contains("surel")],
        FieldKey::Email,
    ),
    (
        &[
            Match::Contains("nomerponsel"),
            Match::Contains("nohp"),
            Match::Contains("hp"),
            Match::Contains("ponsel"),
            Match::Contains("wa"),
            Match::Contains("whatsapp"),
        ],
        FieldKey::Phone,
    ),
];

/// Lowercase and drop whitespace and underscores.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// What a single column receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Annotation,
    Reserved,
    Field(FieldKey),
    Unmapped,
}

/// Decide the role of the column at `index` with header text `header`.
pub fn column_role(index: usize, header: &str) -> ColumnRole {
    let normalized = normalize_header(header);
    if normalized.contains(ANNOTATION_MARKER) {
        return ColumnRole::Annotation;
    }
    if RESERVED_BLANK_COLUMNS.contains(&index) {
        return ColumnRole::Reserved;
    }
    KEYWORDS
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|m| m.hits(&normalized)))
        .map(|(_, key)| ColumnRole::Field(*key))
        .unwrap_or(ColumnRole::Unmapped)
}

/// Roles for a whole header row; compute once per export.
pub fn plan_columns<S: AsRef<str>>(header: &[S]) -> Vec<ColumnRole> {
    header
        .iter()
        .enumerate()
        .map(|(i, h)| column_role(i, h.as_ref()))
        .collect()
}

/// Build one output row, same length as `header`.
pub fn map_row<S: AsRef<str>>(
    header: &[S],
    record: &ExtractedRecord,
    annotation: Annotation,
) -> Vec<String> {
    fill_row(&plan_columns(header), record, annotation)
}

/// Build one output row from precomputed column roles.
pub fn fill_row(
    roles: &[ColumnRole],
    record: &ExtractedRecord,
    annotation: Annotation,
) -> Vec<String> {
    roles
        .iter()
        .map(|role| match role {
            ColumnRole::Annotation => annotation.as_str().to_string(),
            ColumnRole::Field(key) => record.field(*key).display().to_string(),
            ColumnRole::Reserved | ColumnRole::Unmapped => String::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NOT_FOUND_TEXT;

    fn ani() -> ExtractedRecord {
        ExtractedRecord {
            name: "Ani".into(),
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_headers() {
        assert_eq!(normalize_header("NOMOR KARTU_IDENTITAS "), "nomorkartuidentitas");
        assert_eq!(normalize_header("No HP / WA"), "nohp/wa");
    }

    #[test]
    fn maps_basic_header() {
        let header = ["Nama", "NOMOR KARTU IDENTITAS", "KETERANGAN", "col18", "col20"];
        let row = map_row(&header, &ani(), Annotation::MissingNationalId);
        assert_eq!(row, ["Ani", NOT_FOUND_TEXT, "NO KTP", "", ""]);
    }

    #[test]
    fn reserved_indices_beat_keywords() {
        let mut header: Vec<String> = (0..21).map(|i| format!("x{i}")).collect();
        header[17] = "Nama".into();
        header[19] = "Email".into();
        header[20] = "Nama Lengkap".into();
        let row = map_row(&header, &ani(), Annotation::Complete);
        assert_eq!(row.len(), 21);
        assert_eq!(row[17], "");
        assert_eq!(row[19], "");
        assert_eq!(row[20], "Ani");
    }

    #[test]
    fn annotation_beats_reserved_index() {
        let mut header = vec![String::new(); 18];
        header[17] = "Keterangan".into();
        let row = map_row(&header, &ani(), Annotation::MissingBoth);
        assert_eq!(row[17], "NO KTP & RL");
    }

    #[test]
    fn rt_and_rw_are_exact() {
        assert_eq!(column_role(0, "RT"), ColumnRole::Field(FieldKey::Rt));
        assert_eq!(column_role(0, " r w "), ColumnRole::Field(FieldKey::Rw));
        assert_eq!(column_role(0, "RT/RW"), ColumnRole::Unmapped);
    }

    #[test]
    fn keyword_order_first_hit_wins() {
        // "nama" is checked before the phone aliases.
        assert_eq!(column_role(0, "Nama WA"), ColumnRole::Field(FieldKey::Name));
        assert_eq!(
            column_role(0, "ID Pelanggan PLN"),
            ColumnRole::Field(FieldKey::CustomerId)
        );
        assert_eq!(column_role(0, "Surel"), ColumnRole::Field(FieldKey::Email));
        assert_eq!(
            column_role(0, "Nomer Ponsel"),
            ColumnRole::Field(FieldKey::Phone)
        );
        assert_eq!(column_role(0, "Tanggal"), ColumnRole::Unmapped);
    }

    #[test]
    fn mapping_is_idempotent() {
        let header = ["Nama", "NIK", "Alamat", "Keterangan"];
        let a = map_row(&header, &ani(), Annotation::MissingBoth);
        let b = map_row(&header, &ani(), Annotation::MissingBoth);
        assert_eq!(a, b);
    }
}
