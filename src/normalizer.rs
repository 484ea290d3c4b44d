//! Record normalization: stored ciphertext document → typed record.
//!
//! Every ciphertext field goes through [`FieldCipher::decrypt`], so a
//! corrupted field shows up as "Unknown" while the rest of the record
//! stays readable. Status is set to Pending here and replaced by the
//! status joiner.

use crate::crypto::FieldCipher;
use crate::models::{
    Doctor, FulfillmentStatus, MedicineLine, PrescriptionRecord, RawMedicine,
    RawPrescriptionDocument,
};

/// Turns raw prescription documents into [`PrescriptionRecord`]s.
#[derive(Clone, Debug)]
pub struct RecordNormalizer {
    cipher: FieldCipher,
}

impl RecordNormalizer {
    pub fn new(cipher: FieldCipher) -> Self {
        Self { cipher }
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    /// Normalize one document. Never fails.
    pub fn normalize(&self, raw: &RawPrescriptionDocument) -> PrescriptionRecord {
        let c = &self.cipher;

        // Older documents carry no encrypted date; fall back to the
        // plaintext creation timestamp.
        let prescription_date = match (&raw.prescription_date, &raw.created_date) {
            (Some(enc), _) => c.decrypt(enc),
            (None, Some(created)) => created.to_string(),
            (None, None) => c.decrypt_opt(None),
        };

        // Some documents are keyed by NIC instead of carrying it.
        let national_id = match &raw.nic_no {
            Some(enc) => c.decrypt(enc),
            None => raw.id.clone(),
        };

        let medicines = raw
            .medicines
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|m| self.normalize_medicine(m))
            .collect();

        PrescriptionRecord {
            id: raw.id.clone(),
            doctor: Doctor {
                name: c.decrypt_opt(raw.doctor.doctor_name.as_deref()),
                biography: c.decrypt_opt(raw.doctor.biography.as_deref()),
                phone: c.decrypt_opt(raw.doctor.phone_number.as_deref()),
                reg_no: raw.doctor.reg_no.clone(),
            },
            patient_name: c.decrypt_opt(raw.patient.as_deref()),
            prescription_date,
            diagnosis: c.decrypt_opt(raw.diagnosis.as_deref()),
            note: c.decrypt_opt(raw.note.as_deref()),
            appointment_no: c.decrypt_opt(raw.appointment_no.as_deref()),
            national_id,
            reference_no: raw.reference_no.clone(),
            medicines,
            created_date: raw.created_date.clone(),
            status: FulfillmentStatus::Pending,
        }
    }

    /// Normalize a batch, preserving input order.
    pub fn normalize_all(&self, raws: &[RawPrescriptionDocument]) -> Vec<PrescriptionRecord> {
        raws.iter().map(|raw| self.normalize(raw)).collect()
    }

    fn normalize_medicine(&self, raw: &RawMedicine) -> MedicineLine {
        MedicineLine {
            name: self.cipher.decrypt_opt(raw.medicine_name.as_deref()),
            instruction: self.cipher.decrypt_opt(raw.instruction.as_deref()),
            duration: self.cipher.decrypt_opt(raw.days.as_deref()),
        }
    }
}
