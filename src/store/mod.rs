//! Remote store boundaries.
//!
//! Two independently keyed collections:
//! - `PrescriptionStore`: immutable encrypted prescription documents (read-only here)
//! - `StatusStore`: mutable fulfillment status, last-write-wins overwrite
//!
//! plus `PatientDirectory`, a count-only view of the appointments
//! collection for the dashboard.
//!
//! Implementations: [`memory`] for tests and local runs, [`firestore`] for the
//! hosted document store.

pub mod codec;
pub mod firestore;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{RawPrescriptionDocument, StatusEntry};

pub use firestore::{
    FirestoreClient, FirestorePatientDirectory, FirestorePrescriptionStore, FirestoreStatusStore,
};
pub use memory::{InMemoryPatientDirectory, InMemoryPrescriptionStore, InMemoryStatusStore};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unavailable(String),

    #[error("Access denied by store (HTTP {0})")]
    Denied(u16),

    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store returned an error (HTTP {status}): {body}")]
    Http { status: u16, body: String },

    #[error("Could not decode store response: {0}")]
    Decode(String),

    #[error("Invalid document id: {0:?}")]
    InvalidId(String),
}

/// Read access to stored prescription documents.
#[async_trait]
pub trait PrescriptionStore: Send + Sync {
    /// Every document in the collection, in store order.
    async fn list_documents(&self) -> Result<Vec<RawPrescriptionDocument>, StoreError>;

    /// A single document; `Ok(None)` when no document has this id.
    async fn get_document(&self, id: &str) -> Result<Option<RawPrescriptionDocument>, StoreError>;
}

/// Read-write access to fulfillment status entries.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Current entry; `Ok(None)` means the prescription is still pending.
    async fn get_status(&self, id: &str) -> Result<Option<StatusEntry>, StoreError>;

    /// Overwrite the entry for `id` in full.
    async fn set_status(&self, id: &str, entry: StatusEntry) -> Result<(), StoreError>;
}

/// Patient total shown on the dashboard. Each appointment document counts
/// as one patient; no document content is read.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn count_patients(&self) -> Result<usize, StoreError>;
}
