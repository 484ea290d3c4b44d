//! In-memory stores with failure injection.
//!
//! Used by tests and by `MEDICONNECT_STORE=memory` local runs. Locks are
//! never held across an await point.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{PatientDirectory, PrescriptionStore, StatusStore, StoreError};
use crate::models::{RawPrescriptionDocument, StatusEntry};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Prescriptions
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
pub struct InMemoryPrescriptionStore {
    documents: Mutex<Vec<RawPrescriptionDocument>>,
    failure: Mutex<Option<StoreError>>,
}

impl InMemoryPrescriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<RawPrescriptionDocument>) -> Self {
        Self {
            documents: Mutex::new(documents),
            failure: Mutex::new(None),
        }
    }

    /// Insert or replace a document (seeding only; the pipeline never writes).
    pub fn insert(&self, document: RawPrescriptionDocument) {
        let mut docs = lock(&self.documents);
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
    }

    /// Make every subsequent read fail with `error` (`None` heals the store).
    pub fn fail_reads(&self, error: Option<StoreError>) {
        *lock(&self.failure) = error;
    }

    fn check(&self) -> Result<(), StoreError> {
        match lock(&self.failure).clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PrescriptionStore for InMemoryPrescriptionStore {
    async fn list_documents(&self) -> Result<Vec<RawPrescriptionDocument>, StoreError> {
        self.check()?;
        Ok(lock(&self.documents).clone())
    }

    async fn get_document(&self, id: &str) -> Result<Option<RawPrescriptionDocument>, StoreError> {
        self.check()?;
        Ok(lock(&self.documents).iter().find(|d| d.id == id).cloned())
    }
}

// ═══════════════════════════════════════════════════════════
// Status
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
pub struct InMemoryStatusStore {
    entries: Mutex<HashMap<String, StatusEntry>>,
    failing_reads: Mutex<HashSet<String>>,
    write_failure: Mutex<Option<StoreError>>,
    read_delays: Mutex<HashMap<String, Duration>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = (String, StatusEntry)>) -> Self {
        let store = Self::default();
        lock(&store.entries).extend(entries);
        store
    }

    /// Copy of the current entries.
    pub fn snapshot(&self) -> HashMap<String, StatusEntry> {
        lock(&self.entries).clone()
    }

    /// Lookups of `id` fail until cleared.
    pub fn fail_reads_for(&self, id: &str) {
        lock(&self.failing_reads).insert(id.to_string());
    }

    /// Every write fails with `error` (`None` heals the store).
    pub fn fail_writes(&self, error: Option<StoreError>) {
        *lock(&self.write_failure) = error;
    }

    /// Lookups of `id` take `delay` before answering.
    pub fn delay_reads_for(&self, id: &str, delay: Duration) {
        lock(&self.read_delays).insert(id.to_string(), delay);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get_status(&self, id: &str) -> Result<Option<StatusEntry>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let delay = lock(&self.read_delays).get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if lock(&self.failing_reads).contains(id) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        Ok(lock(&self.entries).get(id).copied())
    }

    async fn set_status(&self, id: &str, entry: StatusEntry) -> Result<(), StoreError> {
        if let Some(e) = lock(&self.write_failure).clone() {
            return Err(e);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        lock(&self.entries).insert(id.to_string(), entry);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Patients
// ═══════════════════════════════════════════════════════════

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    count: AtomicUsize,
    failure: Mutex<Option<StoreError>>,
}

impl InMemoryPatientDirectory {
    pub fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
            failure: Mutex::new(None),
        }
    }

    pub fn set_count(&self, count: usize) {
        self.count.store(count, Ordering::SeqCst);
    }

    /// Every count fails with `error` (`None` heals the directory).
    pub fn fail_reads(&self, error: Option<StoreError>) {
        *lock(&self.failure) = error;
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn count_patients(&self) -> Result<usize, StoreError> {
        if let Some(e) = lock(&self.failure).clone() {
            return Err(e);
        }
        Ok(self.count.load(Ordering::SeqCst))
    }
}
