//! Pharmacy API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Layers (outermost → innermost): `Cache-Control: no-store` → access log

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::service::PharmacyService;

/// Build the pharmacy API router.
pub fn pharmacy_api_router(service: Arc<PharmacyService>) -> Router {
    let ctx = ApiContext::new(service);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/prescriptions", get(endpoints::prescriptions::list))
        .route("/prescriptions/:id", get(endpoints::prescriptions::detail))
        .route(
            "/prescriptions/:id/status",
            put(endpoints::prescriptions::update_status),
        )
        .route("/dashboard", get(endpoints::dashboard::summary))
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new().nest("/api", api)
}

/// Allow a single browser origin (the dashboard front end) to call the API.
pub fn with_cors(router: Router, origin: &HeaderValue) -> Router {
    router.layer(
        CorsLayer::new()
            .allow_origin(origin.clone())
            .allow_methods([Method::GET, Method::PUT])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::models::{FulfillmentAction, FulfillmentStatus, StatusEntry};
    use crate::service::tests::{document, service_with_patients};
    use crate::store::{
        InMemoryPatientDirectory, InMemoryPrescriptionStore, InMemoryStatusStore, StoreError,
    };
    use crate::workflow::TransitionPolicy;

    struct Fixture {
        app: Router,
        prescriptions: Arc<InMemoryPrescriptionStore>,
        statuses: Arc<InMemoryStatusStore>,
        patients: Arc<InMemoryPatientDirectory>,
    }

    fn fixture(policy: TransitionPolicy) -> Fixture {
        let statuses = Arc::new(InMemoryStatusStore::with_entries([(
            "rx-2".to_string(),
            StatusEntry::new(FulfillmentAction::Completed),
        )]));
        let patients = Arc::new(InMemoryPatientDirectory::new(5));
        let (prescriptions, service) = service_with_patients(
            vec![
                document("rx-1", "Nimal Silva", Some("N123"), "2024-11-04"),
                document("rx-2", "Amara Dias", Some("N999"), "2024-11-06"),
            ],
            statuses.clone(),
            patients.clone(),
            policy,
        );
        Fixture {
            app: pharmacy_api_router(Arc::new(service)),
            prescriptions,
            statuses,
            patients,
        }
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
    }

    fn put_status(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok_with_no_store_header() {
        let f = fixture(TransitionPolicy::Permissive);
        let response = f.app.oneshot(get_req("/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["transition_policy"], "permissive");
    }

    #[tokio::test]
    async fn list_returns_merged_records() {
        let f = fixture(TransitionPolicy::Permissive);
        let response = f.app.oneshot(get_req("/api/prescriptions")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["total"], 2);
        assert_eq!(json["prescriptions"][0]["id"], "rx-1");
        assert_eq!(json["prescriptions"][0]["status"], "Pending");
        assert_eq!(json["prescriptions"][1]["status"], "Completed");
        assert_eq!(json["prescriptions"][0]["patient_name"], "Nimal Silva");
    }

    #[tokio::test]
    async fn search_filters_list() {
        let f = fixture(TransitionPolicy::Permissive);
        let response = f
            .app
            .clone()
            .oneshot(get_req("/api/prescriptions?search=n123"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["prescriptions"][0]["id"], "rx-1");

        let response = f.app.oneshot(get_req("/api/prescriptions?search=zzz")).await.unwrap();
        assert_eq!(body_json(response).await["total"], 0);
    }

    #[tokio::test]
    async fn detail_and_missing() {
        let f = fixture(TransitionPolicy::Permissive);
        let response = f.app.clone().oneshot(get_req("/api/prescriptions/rx-2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["national_id"], "N999");

        let response = f.app.oneshot(get_req("/api/prescriptions/rx-404")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn status_update_returns_updated_record() {
        let f = fixture(TransitionPolicy::Permissive);
        let response = f
            .app
            .oneshot(put_status(
                "/api/prescriptions/rx-1/status",
                r#"{"action":"Prescription Issued"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["prescription"]["status"], "Prescription Issued");
        assert_eq!(json["transition"]["from"], "Pending");
        assert_eq!(
            f.statuses.snapshot()["rx-1"].action,
            FulfillmentAction::PrescriptionIssued
        );
    }

    #[tokio::test]
    async fn status_update_for_unknown_id_writes_nothing() {
        let f = fixture(TransitionPolicy::Permissive);
        let response = f
            .app
            .oneshot(put_status("/api/prescriptions/ghost/status", r#"{"action":"Completed"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(f.statuses.write_count(), 0);
    }

    #[tokio::test]
    async fn unknown_action_is_422() {
        let f = fixture(TransitionPolicy::Permissive);
        let response = f
            .app
            .oneshot(put_status("/api/prescriptions/rx-1/status", r#"{"action":"Shipped"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_BODY");
        assert_eq!(f.statuses.write_count(), 0);
    }

    #[tokio::test]
    async fn reopening_under_forward_only_is_409() {
        let f = fixture(TransitionPolicy::ForwardOnly);
        let response = f
            .app
            .oneshot(put_status(
                "/api/prescriptions/rx-2/status",
                r#"{"action":"Prescription Issued"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            f.statuses.snapshot()["rx-2"].action,
            FulfillmentAction::Completed
        );
    }

    #[tokio::test]
    async fn store_outage_is_502() {
        let f = fixture(TransitionPolicy::Permissive);
        f.prescriptions
            .fail_reads(Some(StoreError::Unavailable("offline".into())));
        let response = f.app.oneshot(get_req("/api/prescriptions")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"]["code"], "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn dashboard_summary_shape() {
        let f = fixture(TransitionPolicy::Permissive);
        let response = f.app.oneshot(get_req("/api/dashboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["patient_count"], 5);
        assert_eq!(json["prescription_count"], 2);
        let weekly = json["weekly"].as_array().unwrap();
        assert_eq!(weekly.len(), 7);
        assert_eq!(weekly[0], serde_json::json!({ "weekday": "Monday", "prescriptions": 1 }));
        assert_eq!(weekly[2], serde_json::json!({ "weekday": "Wednesday", "prescriptions": 1 }));
    }

    #[tokio::test]
    async fn patient_count_failure_is_502() {
        let f = fixture(TransitionPolicy::Permissive);
        f.patients
            .fail_reads(Some(StoreError::Unavailable("appointments offline".into())));
        let response = f.app.oneshot(get_req("/api/dashboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"]["code"], "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let f = fixture(TransitionPolicy::Permissive);
        let origin = HeaderValue::from_static("http://localhost:3000");
        let app = with_cors(f.app, &origin);

        let req = Request::builder()
            .method("GET")
            .uri("/api/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn status_shown_after_update_matches_store() {
        let f = fixture(TransitionPolicy::Permissive);
        f.app
            .clone()
            .oneshot(put_status("/api/prescriptions/rx-1/status", r#"{"action":"Completed"}"#))
            .await
            .unwrap();
        let response = f.app.oneshot(get_req("/api/prescriptions/rx-1")).await.unwrap();
        assert_eq!(
            body_json(response).await["status"],
            FulfillmentStatus::Completed.as_str()
        );
    }
}
