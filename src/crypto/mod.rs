//! Field-level decryption for prescription documents.
//!
//! Every ciphertext-bearing field of a stored prescription is an
//! independent salted envelope. Decryption is fail-soft per field:
//! a broken field degrades to [`UNKNOWN_FIELD`] and never hides the
//! rest of the record.

pub mod keys;
pub mod encryption;
mod phi_audit;

pub use keys::*;
pub use encryption::*;

use thiserror::Error;

/// Placeholder substituted for any field that cannot be decrypted.
pub const UNKNOWN_FIELD: &str = "Unknown";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(&'static str),

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Decrypted bytes are not valid UTF-8")]
    InvalidUtf8,

    #[error("Decrypted text is empty")]
    EmptyPlaintext,
}
