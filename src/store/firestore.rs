//! Firestore REST adapter for both collections.
//!
//! Credentials are whatever the hosting environment hands over (bearer
//! token and/or API key); this module only attaches them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::codec::{decode_value, encode_fields, AggregationResponse, FirestoreDocument, ListDocumentsPage};
use super::{PatientDirectory, PrescriptionStore, StatusStore, StoreError};
use crate::models::{RawPrescriptionDocument, StatusEntry};

/// Public Firestore REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const PAGE_SIZE: u32 = 300;

const COUNT_ALIAS: &str = "total";

/// Thin HTTP client over `projects/{project}/databases/(default)/documents`.
pub struct FirestoreClient {
    documents_url: String,
    client: reqwest::Client,
    bearer_token: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl FirestoreClient {
    pub fn new(base_url: &str, project_id: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                project_id
            ),
            client,
            bearer_token: None,
            api_key: None,
            timeout,
        })
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<String, StoreError> {
        if id.is_empty() || id.contains('/') {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(format!("{}/{}/{}", self.documents_url, collection, id))
    }

    fn authorize(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(self.timeout)
            } else if e.is_connect() {
                StoreError::Unavailable(self.documents_url.clone())
            } else {
                StoreError::Unavailable(e.to_string())
            }
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::Denied(status.as_u16()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Http {
            status: status.as_u16(),
            body,
        })
    }

    /// Every document in `collection`, following page tokens.
    pub async fn list(&self, collection: &str) -> Result<Vec<FirestoreDocument>, StoreError> {
        let url = format!("{}/{}", self.documents_url, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = Self::check(self.send(request).await?).await?;
            let page: ListDocumentsPage = response
                .json()
                .await
                .map_err(|e| StoreError::Decode(e.to_string()))?;

            documents.extend(page.documents);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::debug!(collection, count = documents.len(), "Listed documents");
        Ok(documents)
    }

    /// One document; HTTP 404 is `Ok(None)`.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<FirestoreDocument>, StoreError> {
        let url = self.document_url(collection, id)?;
        let response = self.send(self.client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(document))
    }

    /// Number of documents in `collection`, via a server-side count
    /// aggregation. Document bodies never leave the store.
    pub async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let url = format!("{}:runAggregationQuery", self.documents_url);
        let query = json!({
            "structuredAggregationQuery": {
                "structuredQuery": { "from": [{ "collectionId": collection }] },
                "aggregations": [{ "alias": COUNT_ALIAS, "count": {} }]
            }
        });

        let response = Self::check(self.send(self.client.post(&url).json(&query)).await?).await?;
        let results: Vec<AggregationResponse> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let typed = results
            .iter()
            .find_map(|r| r.result.as_ref()?.aggregate_fields.get(COUNT_ALIAS))
            .ok_or_else(|| StoreError::Decode("aggregation response carried no count".into()))?;
        let count = decode_value(typed)?
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| StoreError::Decode("count is not a non-negative integer".into()))?;

        tracing::debug!(collection, count, "Counted documents");
        Ok(count)
    }

    /// Replace the whole document (no update mask), creating it if absent.
    pub async fn overwrite(&self, collection: &str, id: &str, body: &Value) -> Result<(), StoreError> {
        let url = self.document_url(collection, id)?;
        let fields = match body.as_object() {
            Some(map) => encode_fields(map),
            None => return Err(StoreError::Decode("document body must be an object".into())),
        };
        let request = self.client.patch(&url).json(&json!({ "fields": fields }));
        Self::check(self.send(request).await?).await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Store implementations
// ═══════════════════════════════════════════════════════════

pub struct FirestorePrescriptionStore {
    client: Arc<FirestoreClient>,
    collection: String,
}

impl FirestorePrescriptionStore {
    pub fn new(client: Arc<FirestoreClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }
}

fn to_raw(document: &FirestoreDocument) -> Result<RawPrescriptionDocument, StoreError> {
    RawPrescriptionDocument::from_body(document.id(), document.body()?)
        .map_err(|e| StoreError::Decode(format!("prescription {}: {e}", document.id())))
}

#[async_trait]
impl PrescriptionStore for FirestorePrescriptionStore {
    async fn list_documents(&self) -> Result<Vec<RawPrescriptionDocument>, StoreError> {
        let documents = self.client.list(&self.collection).await?;
        Ok(documents
            .iter()
            .filter_map(|document| match to_raw(document) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(prescription_id = %document.id(), error = %e, "Skipping undecodable prescription");
                    None
                }
            })
            .collect())
    }

    async fn get_document(&self, id: &str) -> Result<Option<RawPrescriptionDocument>, StoreError> {
        match self.client.get(&self.collection, id).await {
            Ok(Some(document)) => to_raw(&document).map(Some),
            Ok(None) | Err(StoreError::InvalidId(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub struct FirestoreStatusStore {
    client: Arc<FirestoreClient>,
    collection: String,
}

impl FirestoreStatusStore {
    pub fn new(client: Arc<FirestoreClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl StatusStore for FirestoreStatusStore {
    async fn get_status(&self, id: &str) -> Result<Option<StatusEntry>, StoreError> {
        let Some(document) = self.client.get(&self.collection, id).await? else {
            return Ok(None);
        };
        // Legacy writers stored "Not Completed"; anything unrecognised reads as pending.
        match serde_json::from_value::<StatusEntry>(document.body()?) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(prescription_id = %id, error = %e, "Unrecognised status entry, treating as pending");
                Ok(None)
            }
        }
    }

    async fn set_status(&self, id: &str, entry: StatusEntry) -> Result<(), StoreError> {
        let body = serde_json::to_value(entry).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.client.overwrite(&self.collection, id, &body).await
    }
}

pub struct FirestorePatientDirectory {
    client: Arc<FirestoreClient>,
    collection: String,
}

impl FirestorePatientDirectory {
    pub fn new(client: Arc<FirestoreClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl PatientDirectory for FirestorePatientDirectory {
    async fn count_patients(&self) -> Result<usize, StoreError> {
        self.client.count(&self.collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FulfillmentAction;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus, Uri};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PREFIX: &str = "projects/demo/databases/(default)/documents";

    #[derive(Default)]
    struct MockFirestore {
        docs: Mutex<HashMap<(String, String), Value>>,
        require_token: Option<String>,
    }

    fn authorized(mock: &MockFirestore, headers: &HeaderMap) -> bool {
        match &mock.require_token {
            None => true,
            Some(t) => headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == format!("Bearer {t}")),
        }
    }

    async fn list_handler(
        State(mock): State<Arc<MockFirestore>>,
        Path(collection): Path<String>,
        Query(q): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AxumStatus> {
        if !authorized(&mock, &headers) {
            return Err(AxumStatus::FORBIDDEN);
        }
        let mut ids: Vec<(String, Value)> = mock
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|((c, _), _)| c == &collection)
            .map(|((_, id), fields)| (id.clone(), fields.clone()))
            .collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));

        // One document per page to exercise pagination
        let offset: usize = q.get("pageToken").and_then(|t| t.parse().ok()).unwrap_or(0);
        let page: Vec<Value> = ids
            .iter()
            .skip(offset)
            .take(1)
            .map(|(id, fields)| json!({ "name": format!("{PREFIX}/{collection}/{id}"), "fields": fields }))
            .collect();
        let mut body = json!({ "documents": page });
        if offset + 1 < ids.len() {
            body["nextPageToken"] = json!((offset + 1).to_string());
        }
        Ok(Json(body))
    }

    async fn get_handler(
        State(mock): State<Arc<MockFirestore>>,
        Path((collection, id)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AxumStatus> {
        if !authorized(&mock, &headers) {
            return Err(AxumStatus::FORBIDDEN);
        }
        let docs = mock.docs.lock().unwrap();
        let fields = docs
            .get(&(collection.clone(), id.clone()))
            .ok_or(AxumStatus::NOT_FOUND)?;
        Ok(Json(json!({ "name": format!("{PREFIX}/{collection}/{id}"), "fields": fields })))
    }

    async fn patch_handler(
        State(mock): State<Arc<MockFirestore>>,
        Path((collection, id)): Path<(String, String)>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        mock.docs
            .lock()
            .unwrap()
            .insert((collection, id), body["fields"].clone());
        Json(json!({}))
    }

    // `documents:runAggregationQuery` shares a segment with the collection
    // routes, so it is served from the fallback.
    async fn aggregate_handler(
        State(mock): State<Arc<MockFirestore>>,
        uri: Uri,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, AxumStatus> {
        if !uri.path().ends_with(":runAggregationQuery") {
            return Err(AxumStatus::NOT_FOUND);
        }
        if !authorized(&mock, &headers) {
            return Err(AxumStatus::FORBIDDEN);
        }
        let query = &body["structuredAggregationQuery"];
        let collection = query["structuredQuery"]["from"][0]["collectionId"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let alias = query["aggregations"][0]["alias"].as_str().unwrap_or_default().to_string();
        let count = mock
            .docs
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == &collection)
            .count();
        Ok(Json(json!([
            { "readTime": "2024-11-04T00:00:00Z" },
            {
                "result": { "aggregateFields": { alias: { "integerValue": count.to_string() } } },
                "readTime": "2024-11-04T00:00:00Z"
            }
        ])))
    }

    async fn spawn_mock(mock: Arc<MockFirestore>) -> String {
        let app = Router::new()
            .route(&format!("/v1/{PREFIX}/:collection"), get(list_handler))
            .route(
                &format!("/v1/{PREFIX}/:collection/:id"),
                get(get_handler).patch(patch_handler),
            )
            .fallback(aggregate_handler)
            .with_state(mock);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn client(base: &str) -> Arc<FirestoreClient> {
        Arc::new(FirestoreClient::new(base, "demo", Duration::from_secs(5)).unwrap())
    }

    fn seed(mock: &MockFirestore, collection: &str, id: &str, fields: Value) {
        mock.docs
            .lock()
            .unwrap()
            .insert((collection.into(), id.into()), fields);
    }

    #[tokio::test]
    async fn lists_prescriptions_across_pages() {
        let mock = Arc::new(MockFirestore::default());
        for id in ["rx-a", "rx-b", "rx-c"] {
            seed(&mock, "prescriptions", id, json!({ "referenceNo": { "stringValue": id } }));
        }
        let base = spawn_mock(mock).await;
        let store = FirestorePrescriptionStore::new(client(&base), "prescriptions");

        let docs = store.list_documents().await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["rx-a", "rx-b", "rx-c"]);
        assert_eq!(docs[1].reference_no.as_deref(), Some("rx-b"));
    }

    #[tokio::test]
    async fn wrongly_typed_fields_do_not_hide_other_documents() {
        let mock = Arc::new(MockFirestore::default());
        seed(
            &mock,
            "prescriptions",
            "good",
            json!({
                "patient": { "stringValue": "c-patient" },
                "referenceNo": { "stringValue": "REF-1" }
            }),
        );
        seed(&mock, "prescriptions", "bad1", json!({ "appointmentNo": { "integerValue": "12345" } }));
        seed(&mock, "prescriptions", "bad2", json!({ "doctor": { "nullValue": null } }));
        seed(
            &mock,
            "prescriptions",
            "bad3",
            json!({
                "nicNo": { "integerValue": "901234567" },
                "referenceNo": { "integerValue": "77" }
            }),
        );
        // Unknown typed value that the codec itself rejects
        seed(&mock, "prescriptions", "bad4", json!({ "patient": { "mysteryValue": 1 } }));
        let base = spawn_mock(mock).await;
        let store = FirestorePrescriptionStore::new(client(&base), "prescriptions");

        let docs = store.list_documents().await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["bad1", "bad2", "bad3", "good"]);

        let good = &docs[3];
        assert_eq!(good.patient.as_deref(), Some("c-patient"));
        assert_eq!(good.reference_no.as_deref(), Some("REF-1"));
        assert!(docs[0].appointment_no.is_none());
        assert_eq!(docs[1].doctor, crate::models::RawDoctor::default());
        assert!(docs[2].nic_no.is_none());
        assert_eq!(docs[2].reference_no.as_deref(), Some("77"));
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let base = spawn_mock(Arc::new(MockFirestore::default())).await;
        let store = FirestorePrescriptionStore::new(client(&base), "prescriptions");
        assert!(store.get_document("nope").await.unwrap().is_none());
        assert!(store.get_document("a/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_write_then_read() {
        let base = spawn_mock(Arc::new(MockFirestore::default())).await;
        let store = FirestoreStatusStore::new(client(&base), "ConfirmPrescription");

        assert!(store.get_status("rx-1").await.unwrap().is_none());
        store
            .set_status("rx-1", StatusEntry::new(FulfillmentAction::PrescriptionIssued))
            .await
            .unwrap();
        let entry = store.get_status("rx-1").await.unwrap().unwrap();
        assert_eq!(entry.action, FulfillmentAction::PrescriptionIssued);
    }

    #[tokio::test]
    async fn legacy_status_value_reads_as_pending() {
        let mock = Arc::new(MockFirestore::default());
        seed(&mock, "ConfirmPrescription", "old", json!({ "Action": { "stringValue": "Not Completed" } }));
        seed(&mock, "ConfirmPrescription", "done", json!({ "Action": { "stringValue": "Completed" } }));
        let base = spawn_mock(mock).await;
        let store = FirestoreStatusStore::new(client(&base), "ConfirmPrescription");

        assert!(store.get_status("old").await.unwrap().is_none());
        assert_eq!(
            store.get_status("done").await.unwrap().unwrap().action,
            FulfillmentAction::Completed
        );
    }

    #[tokio::test]
    async fn counts_appointments_without_listing_them() {
        let mock = Arc::new(MockFirestore::default());
        for id in ["ap-1", "ap-2", "ap-3"] {
            seed(&mock, "Appointments", id, json!({ "patient": { "stringValue": "c" } }));
        }
        seed(&mock, "prescriptions", "rx-1", json!({}));
        let base = spawn_mock(mock).await;

        let patients = FirestorePatientDirectory::new(client(&base), "Appointments");
        assert_eq!(patients.count_patients().await, Ok(3));

        let empty = FirestorePatientDirectory::new(client(&base), "Nobody");
        assert_eq!(empty.count_patients().await, Ok(0));
    }

    #[tokio::test]
    async fn patient_count_denied_without_token() {
        let mock = Arc::new(MockFirestore {
            require_token: Some("secret".into()),
            ..Default::default()
        });
        let base = spawn_mock(mock).await;
        let patients = FirestorePatientDirectory::new(client(&base), "Appointments");
        assert_eq!(patients.count_patients().await, Err(StoreError::Denied(403)));
    }

    #[tokio::test]
    async fn forbidden_maps_to_denied() {
        let mock = Arc::new(MockFirestore {
            require_token: Some("secret".into()),
            ..Default::default()
        });
        let base = spawn_mock(mock).await;

        let anonymous = FirestorePrescriptionStore::new(client(&base), "prescriptions");
        assert_eq!(anonymous.list_documents().await, Err(StoreError::Denied(403)));

        let authed_client = FirestoreClient::new(&base, "demo", Duration::from_secs(5))
            .unwrap()
            .with_bearer_token(Some("secret".into()));
        let authed = FirestorePrescriptionStore::new(Arc::new(authed_client), "prescriptions");
        assert!(authed.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_store_is_unavailable() {
        // Nothing listens on port 9 locally
        let store = FirestorePrescriptionStore::new(client("http://127.0.0.1:9/v1"), "prescriptions");
        assert!(matches!(
            store.list_documents().await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn rejects_path_like_ids() {
        let c = FirestoreClient::new(DEFAULT_BASE_URL, "demo", Duration::from_secs(1)).unwrap();
        assert_eq!(
            c.document_url("prescriptions", "a/b"),
            Err(StoreError::InvalidId("a/b".into()))
        );
        assert_eq!(
            c.document_url("prescriptions", "abc").unwrap(),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents/prescriptions/abc"
        );
    }
}
