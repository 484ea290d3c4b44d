//! Runtime configuration, resolved once at startup.
//!
//! Values come from the process environment, which may have been seeded
//! from a `.env` file. Parsing is a pure function over a lookup so it can be driven
//! from a map in tests.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::crypto::SharedKey;
use crate::joiner::{JoinOptions, DEFAULT_MAX_CONCURRENCY};
use crate::store::firestore::DEFAULT_BASE_URL;
use crate::workflow::TransitionPolicy;

/// Application-level constants
pub const APP_NAME: &str = "MediConnect";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const SECRET_KEY_VAR: &str = "MEDICONNECT_SECRET_KEY";
/// Name used by older web deployments.
pub const LEGACY_SECRET_KEY_VAR: &str = "REACT_APP_SECRET_KEY";

pub const DEFAULT_PRESCRIPTIONS_COLLECTION: &str = "prescriptions";
pub const DEFAULT_STATUS_COLLECTION: &str = "ConfirmPrescription";
pub const DEFAULT_APPOINTMENTS_COLLECTION: &str = "Appointments";
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 8787));

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "mediconnect=info,mediconnect_lib=info"
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    #[default]
    Firestore,
    /// Both stores held in process. Starts empty.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreSettings {
    pub project_id: String,
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PharmacyConfig {
    pub secret_key: SharedKey,
    pub backend: StoreBackend,
    /// Present whenever `backend` is Firestore.
    pub firestore: Option<FirestoreSettings>,
    pub prescriptions_collection: String,
    pub status_collection: String,
    /// Counted for the dashboard patient total.
    pub appointments_collection: String,
    pub remote_timeout: Duration,
    pub status_concurrency: usize,
    pub transition_policy: TransitionPolicy,
    pub bind_addr: SocketAddr,
    /// Browser origin allowed to call the API. No CORS headers when unset.
    pub cors_origin: Option<HeaderValue>,
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl PharmacyConfig {
    /// Load from the process environment. `.env` loading happens earlier,
    /// in [`crate::run`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let secret_key = get(SECRET_KEY_VAR)
            .or_else(|| get(LEGACY_SECRET_KEY_VAR))
            .map(SharedKey::new)
            .ok_or(ConfigError::Missing(SECRET_KEY_VAR))?;

        let backend = match get("MEDICONNECT_STORE").as_deref() {
            None | Some("firestore") => StoreBackend::Firestore,
            Some("memory") => StoreBackend::Memory,
            Some(other) => return Err(invalid("MEDICONNECT_STORE", other)),
        };

        let firestore = match backend {
            StoreBackend::Memory => None,
            StoreBackend::Firestore => Some(FirestoreSettings {
                project_id: get("MEDICONNECT_FIRESTORE_PROJECT")
                    .ok_or(ConfigError::Missing("MEDICONNECT_FIRESTORE_PROJECT"))?,
                base_url: get("MEDICONNECT_FIRESTORE_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                bearer_token: get("MEDICONNECT_FIRESTORE_TOKEN"),
                api_key: get("MEDICONNECT_FIRESTORE_API_KEY"),
            }),
        };

        let remote_timeout_secs = parse_or(
            "MEDICONNECT_REMOTE_TIMEOUT_SECS",
            get("MEDICONNECT_REMOTE_TIMEOUT_SECS"),
            DEFAULT_REMOTE_TIMEOUT_SECS,
        )?;
        if remote_timeout_secs == 0 {
            return Err(invalid("MEDICONNECT_REMOTE_TIMEOUT_SECS", "0"));
        }

        let status_concurrency = parse_or(
            "MEDICONNECT_STATUS_CONCURRENCY",
            get("MEDICONNECT_STATUS_CONCURRENCY"),
            DEFAULT_MAX_CONCURRENCY,
        )?;
        if status_concurrency == 0 {
            return Err(invalid("MEDICONNECT_STATUS_CONCURRENCY", "0"));
        }

        let transition_policy = match get("MEDICONNECT_TRANSITION_POLICY") {
            None => TransitionPolicy::default(),
            Some(v) => v
                .parse()
                .map_err(|_| invalid("MEDICONNECT_TRANSITION_POLICY", &v))?,
        };

        let bind_addr = parse_or(
            "MEDICONNECT_BIND_ADDR",
            get("MEDICONNECT_BIND_ADDR"),
            DEFAULT_BIND_ADDR,
        )?;

        let cors_origin = match get("MEDICONNECT_CORS_ORIGIN") {
            None => None,
            Some(v) => Some(
                HeaderValue::from_str(v.trim()).map_err(|_| invalid("MEDICONNECT_CORS_ORIGIN", &v))?,
            ),
        };

        Ok(Self {
            secret_key,
            backend,
            firestore,
            prescriptions_collection: get("MEDICONNECT_PRESCRIPTIONS_COLLECTION")
                .unwrap_or_else(|| DEFAULT_PRESCRIPTIONS_COLLECTION.to_string()),
            status_collection: get("MEDICONNECT_STATUS_COLLECTION")
                .unwrap_or_else(|| DEFAULT_STATUS_COLLECTION.to_string()),
            appointments_collection: get("MEDICONNECT_APPOINTMENTS_COLLECTION")
                .unwrap_or_else(|| DEFAULT_APPOINTMENTS_COLLECTION.to_string()),
            remote_timeout: Duration::from_secs(remote_timeout_secs),
            status_concurrency,
            transition_policy,
            bind_addr,
            cors_origin,
        })
    }

    /// Join settings derived from the remote timeout and concurrency.
    pub fn join_options(&self) -> JoinOptions {
        JoinOptions {
            lookup_timeout: self.remote_timeout,
            max_concurrency: self.status_concurrency,
        }
    }
}

fn invalid(var: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| invalid(var, &v)),
    }
}
