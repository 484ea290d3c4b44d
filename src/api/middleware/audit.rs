//! Access logging middleware.
//!
//! Logs method, matched route template, response status and latency for
//! every API request. The concrete URI is never logged: prescription ids
//! can be national ID numbers.

use std::time::Instant;

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "<unmatched>".to_owned());
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::warn!(%method, route, status, elapsed_ms, "API request failed");
    } else {
        tracing::info!(%method, route, status, elapsed_ms, "API request");
    }
    response
}
