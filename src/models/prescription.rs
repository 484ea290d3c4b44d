use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::enums::{FulfillmentAction, FulfillmentStatus};

// ═══════════════════════════════════════════
// Stored form, as written by the issuing system
// ═══════════════════════════════════════════

/// Doctor sub-document. All fields except `regNo` are ciphertext.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDoctor {
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub doctor_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub biography: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::plaintext")]
    pub reg_no: Option<String>,
}

/// One medicine line item; every field is ciphertext.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMedicine {
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub medicine_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub instruction: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub days: Option<String>,
}

/// Plaintext creation timestamp; the issuing system has written both
/// epoch milliseconds and ISO strings over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl std::fmt::Display for StoreTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let millis = match self {
            Self::Text(s) => return f.write_str(s),
            Self::Millis(ms) => *ms,
            Self::Fractional(ms) => *ms as i64,
        };
        match DateTime::from_timestamp_millis(millis) {
            Some(dt) => f.write_str(&dt.to_rfc3339()),
            None => write!(f, "{millis}"),
        }
    }
}

/// A prescription document exactly as the prescription store holds it.
///
/// `id` is the store-assigned document name and is not part of the
/// document body.
///
/// Decoding is field-by-field lenient: a value of the wrong JSON type is
/// read as absent, so it normalizes to the sentinel instead of rejecting
/// the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPrescriptionDocument {
    #[serde(skip)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub doctor: RawDoctor,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub patient: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub prescription_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub diagnosis: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub appointment_no: Option<String>,
    #[serde(default, deserialize_with = "lenient::plaintext")]
    pub reference_no: Option<String>,
    #[serde(default, deserialize_with = "lenient::ciphertext")]
    pub nic_no: Option<String>,
    #[serde(default, deserialize_with = "lenient::medicines")]
    pub medicines: Option<Vec<RawMedicine>>,
    #[serde(default, deserialize_with = "lenient::optional")]
    pub created_date: Option<StoreTimestamp>,
}

impl RawPrescriptionDocument {
    /// Decode a document body and attach its store identifier.
    pub fn from_body(id: impl Into<String>, body: serde_json::Value) -> serde_json::Result<Self> {
        let mut doc: Self = serde_json::from_value(body)?;
        doc.id = id.into();
        Ok(doc)
    }
}

mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::RawMedicine;

    /// Ciphertext is always a string; anything else cannot be decrypted.
    pub fn ciphertext<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    /// Plaintext identifiers, some of which were written as numbers.
    pub fn plaintext<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(serde_json::from_value(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn optional<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(Value::deserialize(d)?).ok())
    }

    // A malformed line item still shows up, with every field unknown.
    pub fn medicines<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<RawMedicine>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .map(|item| serde_json::from_value(item).unwrap_or_default())
                    .collect(),
            ),
            _ => None,
        })
    }
}

// ═══════════════════════════════════════════
// Normalized form: decrypted and joined
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub name: String,
    pub biography: String,
    pub phone: String,
    pub reg_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineLine {
    pub name: String,
    pub instruction: String,
    pub duration: String,
}

/// A decrypted prescription with its fulfillment status merged in.
///
/// `status` is never written back to the prescription store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionRecord {
    pub id: String,
    pub doctor: Doctor,
    pub patient_name: String,
    pub prescription_date: String,
    pub diagnosis: String,
    pub note: String,
    pub appointment_no: String,
    pub national_id: String,
    pub reference_no: Option<String>,
    pub medicines: Vec<MedicineLine>,
    pub created_date: Option<StoreTimestamp>,
    pub status: FulfillmentStatus,
}

impl PrescriptionRecord {
    pub fn with_status(mut self, status: FulfillmentStatus) -> Self {
        self.status = status;
        self
    }
}

// ═══════════════════════════════════════════
// Status store entry
// ═══════════════════════════════════════════

/// Current fulfillment action for one prescription. Absence of an entry
/// means Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    #[serde(alias = "Action")]
    pub action: FulfillmentAction,
}

impl StatusEntry {
    pub fn new(action: FulfillmentAction) -> Self {
        Self { action }
    }
}

impl From<Option<StatusEntry>> for FulfillmentStatus {
    fn from(entry: Option<StatusEntry>) -> Self {
        entry.map_or(FulfillmentStatus::Pending, |e| e.action.into())
    }
}
