//! Consolidation: deduplicate records and flag missing identifiers.

use crate::record::{ConsolidatedKey, ExtractedRecord};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Status code written into the template's "keterangan" column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Annotation {
    /// Both the national id (KTP) and customer reference (RL) are present.
    Complete,
    MissingNationalId,
    MissingCustomerId,
    MissingBoth,
}

impl Annotation {
    pub fn for_record(record: &ExtractedRecord) -> Self {
        match (
            record.national_id.is_present(),
            record.customer_id.is_present(),
        ) {
            (false, false) => Annotation::MissingBoth,
            (false, true) => Annotation::MissingNationalId,
            (true, false) => Annotation::MissingCustomerId,
            (true, true) => Annotation::Complete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Annotation::Complete => "",
            Annotation::MissingNationalId => "NO KTP",
            Annotation::MissingCustomerId => "NO RL",
            Annotation::MissingBoth => "NO KTP & RL",
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that survived deduplication, with its annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidatedRecord {
    pub record: ExtractedRecord,
    pub annotation: Annotation,
}

/// Drop failed extractions and later duplicates, keeping upload order.
///
/// Duplicates are not merged: the first record for a key wins outright.
pub fn consolidate(records: &[Option<ExtractedRecord>]) -> Vec<ConsolidatedRecord> {
    let mut seen: HashSet<ConsolidatedKey> = HashSet::new();
    records
        .iter()
        .flatten()
        .filter(|r| seen.insert(r.key()))
        .map(|r| ConsolidatedRecord {
            annotation: Annotation::for_record(r),
            record: r.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn rec(name: &str, nik: &str, idpel: &str, address: &str) -> ExtractedRecord {
        ExtractedRecord {
            name: name.into(),
            national_id: nik.into(),
            customer_id: idpel.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    #[test]
    fn duplicates_collapse_first_wins() {
        let a = rec("Budi", "3201", "5120", "Jl. Mawar");
        let b = a.clone();
        let c = rec("Budi", "3201", "5120", "Jl. Melati");
        let out = consolidate(&[Some(a), Some(b), Some(c)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.address.as_deref(), Some("Jl. Mawar"));
    }

    #[test]
    fn nulls_are_skipped_and_order_kept() {
        let out = consolidate(&[
            None,
            Some(rec("Ani", "1", "2", "")),
            None,
            Some(rec("Budi", "3", "4", "")),
        ]);
        let names: Vec<_> = out.iter().map(|c| c.record.name.display()).collect();
        assert_eq!(names, ["Ani", "Budi"]);
    }

    #[test]
    fn different_phone_is_a_different_person() {
        let a = rec("Budi", "1", "2", "");
        let b = ExtractedRecord {
            phone: "0812".into(),
            ..a.clone()
        };
        assert_eq!(consolidate(&[Some(a), Some(b)]).len(), 2);
    }

    #[test]
    fn annotations() {
        let cases = [
            (rec("A", "", "", ""), "NO KTP & RL"),
            (rec("A", "", "5120", ""), "NO KTP"),
            (rec("A", "3201", "Tidak Ditemukan", ""), "NO RL"),
            (rec("A", "3201", "5120", ""), ""),
        ];
        for (record, expected) in cases {
            assert_eq!(Annotation::for_record(&record).as_str(), expected);
        }
        assert_eq!(
            rec("A", "", "", "").national_id,
            FieldValue::NotFound
        );
    }
}
