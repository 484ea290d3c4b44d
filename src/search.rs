//! Case-insensitive substring search over decrypted records.
//!
//! Searchable fields: patient name, prescription id, appointment number,
//! national ID and, when the document carries one, reference number. The
//! query is matched literally (no trimming).

use crate::models::PrescriptionRecord;

fn searchable_fields(record: &PrescriptionRecord) -> [&str; 5] {
    [
        record.patient_name.as_str(),
        record.id.as_str(),
        record.appointment_no.as_str(),
        record.national_id.as_str(),
        record.reference_no.as_deref().unwrap_or(""),
    ]
}

/// True when any searchable field contains `needle` (already lowercased).
fn matches(record: &PrescriptionRecord, needle: &str) -> bool {
    searchable_fields(record)
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Records matching `query`, in original order. An empty query matches all.
pub fn filter(records: &[PrescriptionRecord], query: &str) -> Vec<PrescriptionRecord> {
    if query.is_empty() {
        return records.to_vec();
    }
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|r| matches(r, &needle))
        .cloned()
        .collect()
}
