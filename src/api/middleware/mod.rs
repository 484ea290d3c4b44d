//! API middleware.
//!
//! Only the access logger lives here; the `no-store` header is a
//! tower-http layer applied in the router.

pub mod audit;
