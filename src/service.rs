//! Presentation boundary.
//!
//! Every read goes through the same path: fetch raw documents, normalize
//! (decrypt), then join status. Nothing here caches; each call reflects
//! the stores at the time it runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::aggregate::{aggregate_by_weekday, WeekdayHistogram};
use crate::config::{PharmacyConfig, StoreBackend};
use crate::crypto::{FieldCipher, SharedKey};
use crate::error::PipelineError;
use crate::joiner::{JoinOptions, StatusJoiner};
use crate::models::{FulfillmentAction, PrescriptionRecord, RawPrescriptionDocument};
use crate::normalizer::RecordNormalizer;
use crate::search;
use crate::store::{
    FirestoreClient, FirestorePatientDirectory, FirestorePrescriptionStore, FirestoreStatusStore,
    InMemoryPatientDirectory, InMemoryPrescriptionStore, InMemoryStatusStore, PatientDirectory,
    PrescriptionStore, StatusStore, StoreError,
};
use crate::workflow::{FulfillmentStateMachine, Transition, TransitionPolicy};

/// Dashboard payload: patient and prescription totals plus the weekday chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub patient_count: usize,
    pub prescription_count: usize,
    pub weekly: WeekdayHistogram,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub join: JoinOptions,
    pub policy: TransitionPolicy,
    /// Bound on prescription-store calls and status writes.
    pub remote_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        let join = JoinOptions::default();
        Self {
            remote_timeout: join.lookup_timeout,
            join,
            policy: TransitionPolicy::default(),
        }
    }
}

/// The three remote collections the service reads or writes.
pub struct Stores {
    pub prescriptions: Arc<dyn PrescriptionStore>,
    pub statuses: Arc<dyn StatusStore>,
    pub patients: Arc<dyn PatientDirectory>,
}

pub struct PharmacyService {
    prescriptions: Arc<dyn PrescriptionStore>,
    patients: Arc<dyn PatientDirectory>,
    normalizer: RecordNormalizer,
    joiner: StatusJoiner,
    workflow: FulfillmentStateMachine,
    remote_timeout: Duration,
}

impl PharmacyService {
    pub fn new(stores: Stores, key: SharedKey, options: ServiceOptions) -> Self {
        let Stores {
            prescriptions,
            statuses,
            patients,
        } = stores;
        let joiner = StatusJoiner::new(statuses.clone(), options.join);
        let workflow = FulfillmentStateMachine::new(
            statuses,
            joiner.clone(),
            options.policy,
            options.remote_timeout,
        );
        Self {
            prescriptions,
            patients,
            normalizer: RecordNormalizer::new(FieldCipher::new(key)),
            joiner,
            workflow,
            remote_timeout: options.remote_timeout,
        }
    }

    /// Wire up the configured store backend.
    pub fn from_config(config: &PharmacyConfig) -> Result<Self, StoreError> {
        let options = ServiceOptions {
            join: config.join_options(),
            policy: config.transition_policy,
            remote_timeout: config.remote_timeout,
        };

        let stores = match (config.backend, &config.firestore) {
            (StoreBackend::Firestore, Some(fs)) => {
                let client = Arc::new(
                    FirestoreClient::new(&fs.base_url, &fs.project_id, config.remote_timeout)?
                        .with_bearer_token(fs.bearer_token.clone())
                        .with_api_key(fs.api_key.clone()),
                );
                Stores {
                    prescriptions: Arc::new(FirestorePrescriptionStore::new(
                        client.clone(),
                        config.prescriptions_collection.clone(),
                    )),
                    statuses: Arc::new(FirestoreStatusStore::new(
                        client.clone(),
                        config.status_collection.clone(),
                    )),
                    patients: Arc::new(FirestorePatientDirectory::new(
                        client,
                        config.appointments_collection.clone(),
                    )),
                }
            }
            (StoreBackend::Firestore, None) => {
                return Err(StoreError::Unavailable(
                    "Firestore backend selected without project settings".into(),
                ))
            }
            (StoreBackend::Memory, _) => Stores {
                prescriptions: Arc::new(InMemoryPrescriptionStore::new()),
                statuses: Arc::new(InMemoryStatusStore::new()),
                patients: Arc::new(InMemoryPatientDirectory::default()),
            },
        };

        tracing::info!(
            backend = ?config.backend,
            policy = ?config.transition_policy,
            concurrency = config.status_concurrency,
            "Pharmacy service configured"
        );
        Ok(Self::new(stores, config.secret_key.clone(), options))
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.workflow.policy()
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.remote_timeout)),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<RawPrescriptionDocument>, PipelineError> {
        let documents = self
            .bounded(self.prescriptions.list_documents())
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Prescription list fetch failed"))?;
        tracing::debug!(count = documents.len(), "Prescription documents fetched");
        Ok(documents)
    }

    /// All records, decrypted, with authoritative status. Store order.
    pub async fn list_records(&self) -> Result<Vec<PrescriptionRecord>, PipelineError> {
        let raws = self.fetch_all().await?;
        let records = self.normalizer.normalize_all(&raws);
        Ok(self.joiner.join_all(records).await)
    }

    /// One record by id; `Ok(None)` when it does not exist.
    pub async fn get_record(&self, id: &str) -> Result<Option<PrescriptionRecord>, PipelineError> {
        let raw = self
            .bounded(self.prescriptions.get_document(id))
            .await
            .inspect_err(|e| tracing::warn!(prescription_id = %id, error = %e, "Prescription fetch failed"))?;

        match raw {
            Some(raw) => {
                let record = self.normalizer.normalize(&raw);
                Ok(Some(self.joiner.join_one(record).await))
            }
            None => {
                tracing::debug!(prescription_id = %id, "Prescription not found");
                Ok(None)
            }
        }
    }

    /// Fresh list filtered by `query`. An empty query returns everything.
    pub async fn search(&self, query: &str) -> Result<Vec<PrescriptionRecord>, PipelineError> {
        let records = self.list_records().await?;
        Ok(search::filter(&records, query))
    }

    /// Persist a fulfillment action. Reading the record afterwards shows
    /// the new status.
    pub async fn set_status(&self, id: &str, action: FulfillmentAction) -> Result<Transition, PipelineError> {
        Ok(self.workflow.set_status(id, action).await?)
    }

    /// Re-read only the status of `id`, for callers holding a record.
    pub async fn refresh_status(&self, record: PrescriptionRecord) -> PrescriptionRecord {
        self.joiner.join_one(record).await
    }

    /// Weekday chart over every record. Status plays no part, so no lookups
    /// are issued.
    pub async fn weekly_aggregate(&self) -> Result<WeekdayHistogram, PipelineError> {
        let raws = self.fetch_all().await?;
        Ok(aggregate_by_weekday(&self.normalizer.normalize_all(&raws)))
    }

    /// Both totals and the chart. The patient count is read concurrently
    /// with the prescription list; either failing fails the summary.
    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, PipelineError> {
        let patients = async {
            self.bounded(self.patients.count_patients())
                .await
                .inspect_err(|e| tracing::warn!(error = %e, "Patient count failed"))
                .map_err(PipelineError::from)
        };
        let (patient_count, raws) = tokio::try_join!(patients, self.fetch_all())?;
        let records = self.normalizer.normalize_all(&raws);
        Ok(DashboardSummary {
            patient_count,
            prescription_count: records.len(),
            weekly: aggregate_by_weekday(&records),
        })
    }
}
