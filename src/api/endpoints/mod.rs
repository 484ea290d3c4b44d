//! API endpoint handlers.
//!
//! Each module corresponds to a dashboard screen. Handlers only translate
//! between HTTP and `PharmacyService`.

pub mod dashboard;
pub mod health;
pub mod prescriptions;
