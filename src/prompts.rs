//! Extraction instruction sent with every document.
//!
//! Kept in one place so the instruction can be inspected by tests and
//! overridden through [`crate::config::DocFillConfig::instruction`] without
//! touching the request or parsing code.

use crate::record::NOT_FOUND_TEXT;
use once_cell::sync::Lazy;

/// Default instruction for the ten-field identity extraction.
///
/// The service is asked for a bare JSON object; the extraction adapter still
/// tolerates code fences and surrounding prose.
pub static EXTRACTION_INSTRUCTION: Lazy<String> = Lazy::new(|| {
    format!(
        r#"You read scanned Indonesian identity and registration documents (KTP, utility bills, application forms).

Find these fields in the attached document:
Nama (full name), NIK (Nomor Induk Kependudukan), IDPEL (ID Pelanggan), full address (Alamat),
Kelurahan, Kecamatan, RT, RW, email address, and mobile/WhatsApp number (No. HP/WA).

Accuracy matters more than completeness. Cross-check every value you report:
- NIK must be exactly 16 digits.
- Email must be a valid address of the form user@domain.tld.
- Mobile numbers start with the country code +62 or the local prefix 08 and contain digits only.
- RT and RW are short numbers (e.g. "003").

If a field cannot be found or fails its check, use the exact text "{nf}".

Answer with ONLY this JSON object, no commentary and no code fences:
{{"nama": "...", "nik": "...", "idpel": "...", "alamat": "...", "kelurahan": "...", "kecamatan": "...", "rt": "...", "rw": "...", "email": "...", "no_hp": "..."}}"#,
        nf = NOT_FOUND_TEXT
    )
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldKey;

    #[test]
    fn instruction_names_every_key() {
        for key in FieldKey::ALL {
            assert!(
                EXTRACTION_INSTRUCTION.contains(&format!("\"{}\"", key.json_key())),
                "missing key {}",
                key.json_key()
            );
        }
    }

    #[test]
    fn instruction_carries_validation_hints() {
        assert!(EXTRACTION_INSTRUCTION.contains("16 digits"));
        assert!(EXTRACTION_INSTRUCTION.contains("+62"));
        assert!(EXTRACTION_INSTRUCTION.contains(NOT_FOUND_TEXT));
    }
}
