//! Shared types for the API layer.

use std::sync::Arc;

use crate::service::PharmacyService;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub service: Arc<PharmacyService>,
}

impl ApiContext {
    pub fn new(service: Arc<PharmacyService>) -> Self {
        Self { service }
    }
}
