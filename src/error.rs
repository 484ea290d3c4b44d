use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::workflow::WorkflowError;

/// Errors surfaced by the presentation boundary.
///
/// Field decryption problems never appear here (they degrade to the
/// sentinel) and a missing record is `Ok(None)`, not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Prescription store error: {0}")]
    Store(#[from] StoreError),

    #[error("Fulfillment update failed: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Errors that stop the service from starting.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
