//! Pharmacy dashboard HTTP API.
//!
//! Routes are nested under `/api/` and every response carries
//! `Cache-Control: no-store`. `pharmacy_api_router()` returns a `Router`
//! that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;

pub use router::{pharmacy_api_router, with_cors};
pub use types::ApiContext;
