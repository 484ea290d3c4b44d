//! Prescription endpoints.
//!
//! - `GET /api/prescriptions?search=` lists, optionally filtered
//! - `GET /api/prescriptions/:id` returns one record
//! - `PUT /api/prescriptions/:id/status` applies a fulfillment action

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{FulfillmentAction, PrescriptionRecord};
use crate::workflow::Transition;

#[derive(Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct PrescriptionsResponse {
    pub prescriptions: Vec<PrescriptionRecord>,
    pub total: usize,
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub action: FulfillmentAction,
}

#[derive(Serialize)]
pub struct StatusUpdateResponse {
    pub prescription: PrescriptionRecord,
    pub transition: Transition,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Prescription not found".into())
}

/// `GET /api/prescriptions`: merged list, filtered when `search` is set.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PrescriptionsResponse>, ApiError> {
    let prescriptions = match query.search.as_deref() {
        Some(q) => ctx.service.search(q).await?,
        None => ctx.service.list_records().await?,
    };
    Ok(Json(PrescriptionsResponse {
        total: prescriptions.len(),
        prescriptions,
    }))
}

/// `GET /api/prescriptions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<PrescriptionRecord>, ApiError> {
    ctx.service
        .get_record(&id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// `PUT /api/prescriptions/:id/status`
///
/// Unknown ids are rejected before anything is written. The returned
/// record is re-read after the write.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let Json(request) = body?;

    if ctx.service.get_record(&id).await?.is_none() {
        return Err(not_found());
    }

    let transition = ctx.service.set_status(&id, request.action).await?;
    let prescription = ctx.service.get_record(&id).await?.ok_or_else(not_found)?;

    Ok(Json(StatusUpdateResponse {
        prescription,
        transition,
    }))
}
