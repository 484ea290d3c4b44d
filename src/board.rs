//! In-process view of the prescription list, as a dashboard screen holds it.
//!
//! The board owns a merged snapshot and the current search text. A refresh
//! rebuilds the snapshot from scratch. Status edits are applied to the
//! snapshot optimistically and rolled back if the write fails, so the
//! board never shows a status the store did not accept.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::PipelineError;
use crate::models::{FulfillmentAction, FulfillmentStatus, PrescriptionRecord};
use crate::search;
use crate::service::PharmacyService;
use crate::workflow::Transition;

pub struct PrescriptionBoard {
    service: Arc<PharmacyService>,
    records: RwLock<Vec<PrescriptionRecord>>,
    query: RwLock<String>,
}

impl PrescriptionBoard {
    pub fn new(service: Arc<PharmacyService>) -> Self {
        Self {
            service,
            records: RwLock::new(Vec::new()),
            query: RwLock::new(String::new()),
        }
    }

    /// Replace the snapshot with a fresh merged list. On failure the old
    /// snapshot is kept and the error returned.
    pub async fn refresh(&self) -> Result<usize, PipelineError> {
        let fresh = self.service.list_records().await?;
        let count = fresh.len();
        *self.records.write().await = fresh;
        tracing::debug!(count, "Board refreshed");
        Ok(count)
    }

    /// The full snapshot, ignoring the search text.
    pub async fn records(&self) -> Vec<PrescriptionRecord> {
        self.records.read().await.clone()
    }

    pub async fn set_query(&self, query: impl Into<String>) {
        *self.query.write().await = query.into();
    }

    /// Snapshot filtered by the current search text.
    pub async fn visible(&self) -> Vec<PrescriptionRecord> {
        let query = self.query.read().await.clone();
        search::filter(&self.records.read().await, &query)
    }

    async fn status_of(&self, id: &str) -> Option<FulfillmentStatus> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.status)
    }

    async fn set_local(&self, id: &str, status: FulfillmentStatus) {
        if let Some(record) = self.records.write().await.iter_mut().find(|r| r.id == id) {
            record.status = status;
        }
    }

    /// Apply `action` to `id`: show it immediately, persist it, then take
    /// the status back from the store. A failed write restores the status
    /// that was showing before.
    pub async fn apply_action(&self, id: &str, action: FulfillmentAction) -> Result<Transition, PipelineError> {
        let previous = self.status_of(id).await;
        self.set_local(id, action.into()).await;

        match self.service.set_status(id, action).await {
            Ok(transition) => {
                let current = self.records.read().await.iter().find(|r| r.id == id).cloned();
                if let Some(record) = current {
                    let merged = self.service.refresh_status(record).await;
                    self.set_local(id, merged.status).await;
                }
                Ok(transition)
            }
            Err(e) => {
                if let Some(previous) = previous {
                    self.set_local(id, previous).await;
                }
                tracing::warn!(prescription_id = %id, error = %e, "Status change rolled back");
                Err(e)
            }
        }
    }
}
