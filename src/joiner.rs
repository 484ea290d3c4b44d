//! Status join: merges authoritative fulfillment status into records.
//!
//! The prescription store never carries status. Every read path runs the
//! normalized records through here, either one at a time (detail view) or
//! as a batch of concurrent, independent point lookups (list view).

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use crate::models::{FulfillmentStatus, PrescriptionRecord, StatusEntry};
use crate::store::{StatusStore, StoreError};

/// Default per-lookup timeout.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of status lookups in flight during a batch join.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Pure merge over a status snapshot. Never touches a store.
pub fn join_status<F>(records: Vec<PrescriptionRecord>, lookup: F) -> Vec<PrescriptionRecord>
where
    F: Fn(&str) -> Option<StatusEntry>,
{
    records
        .into_iter()
        .map(|record| {
            let status = FulfillmentStatus::from(lookup(&record.id));
            record.with_status(status)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct JoinOptions {
    pub lookup_timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Store-backed joiner. Lookup failures and timeouts degrade the affected
/// record to Pending; they never fail the join.
#[derive(Clone)]
pub struct StatusJoiner {
    store: Arc<dyn StatusStore>,
    options: JoinOptions,
}

impl StatusJoiner {
    pub fn new(store: Arc<dyn StatusStore>, options: JoinOptions) -> Self {
        Self { store, options }
    }

    /// Raw lookup result with the timeout applied.
    pub async fn try_lookup(&self, id: &str) -> Result<Option<StatusEntry>, StoreError> {
        match tokio::time::timeout(self.options.lookup_timeout, self.store.get_status(id)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.options.lookup_timeout)),
        }
    }

    /// Point lookup for one identifier.
    pub async fn lookup(&self, id: &str) -> FulfillmentStatus {
        match self.try_lookup(id).await {
            Ok(entry) => {
                let status = FulfillmentStatus::from(entry);
                tracing::debug!(prescription_id = %id, status = %status, "Status lookup");
                status
            }
            Err(e) => {
                tracing::warn!(prescription_id = %id, error = %e, "Status lookup failed, showing as pending");
                FulfillmentStatus::Pending
            }
        }
    }

    pub async fn join_one(&self, record: PrescriptionRecord) -> PrescriptionRecord {
        let status = self.lookup(&record.id).await;
        record.with_status(status)
    }

    /// Batch join: one independent point lookup per record, at most
    /// `max_concurrency` in flight, output in input order.
    pub async fn join_all(&self, records: Vec<PrescriptionRecord>) -> Vec<PrescriptionRecord> {
        let limit = self.options.max_concurrency.max(1);
        stream::iter(records)
            .map(|record| self.join_one(record))
            .buffered(limit)
            .collect()
            .await
    }
}
