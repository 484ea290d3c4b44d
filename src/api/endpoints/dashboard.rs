//! Dashboard summary endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::service::DashboardSummary;

/// `GET /api/dashboard`: patient and prescription counts and the Monday–Sunday chart.
pub async fn summary(State(ctx): State<ApiContext>) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(ctx.service.dashboard_summary().await?))
}
