use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::keys::{generate_salt, SharedKey, SALT_LENGTH};
use super::{CryptoError, UNKNOWN_FIELD};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Magic prefix of an OpenSSL salted envelope.
const SALTED_MAGIC: &[u8; 8] = b"Salted__";
const BLOCK_SIZE: usize = 16;

/// Decrypts (and, for seeding, encrypts) individual prescription fields.
///
/// Envelope: `base64("Salted__" || salt[8] || AES-256-CBC/PKCS#7)` with the
/// key and IV derived from the shared passphrase.
#[derive(Clone, Debug)]
pub struct FieldCipher {
    key: SharedKey,
}

impl FieldCipher {
    pub fn new(key: SharedKey) -> Self {
        Self { key }
    }

    /// Decrypt one field, substituting [`UNKNOWN_FIELD`] on any failure.
    pub fn decrypt(&self, ciphertext: &str) -> String {
        match self.try_decrypt(ciphertext) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, len = ciphertext.len(), "Field decryption failed");
                UNKNOWN_FIELD.to_string()
            }
        }
    }

    /// Decrypt an optional field; an absent field is the sentinel.
    pub fn decrypt_opt(&self, ciphertext: Option<&str>) -> String {
        match ciphertext {
            Some(c) => self.decrypt(c),
            None => {
                tracing::debug!("Field absent from stored document");
                UNKNOWN_FIELD.to_string()
            }
        }
    }

    pub fn try_decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let bytes = BASE64
            .decode(ciphertext.trim())
            .map_err(|_| CryptoError::MalformedCiphertext("not base64"))?;

        let (salt, body) = split_envelope(&bytes)?;
        if body.is_empty() || body.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::MalformedCiphertext("length is not a block multiple"));
        }

        let derived = self.key.derive(salt.as_ref());
        let plaintext = Aes256CbcDec::new_from_slices(&derived.key, &derived.iv)
            .map_err(|_| CryptoError::DecryptionFailed)?
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        let text = String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)?;
        if text.is_empty() {
            return Err(CryptoError::EmptyPlaintext);
        }
        Ok(text)
    }

    /// Encrypt with a fresh random salt.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.encrypt_with_salt(plaintext, &generate_salt())
    }

    pub(crate) fn encrypt_with_salt(
        &self,
        plaintext: &str,
        salt: &[u8; SALT_LENGTH],
    ) -> Result<String, CryptoError> {
        let derived = self.key.derive(Some(salt));
        let body = Aes256CbcEnc::new_from_slices(&derived.key, &derived.iv)
            .map_err(|_| CryptoError::EncryptionFailed)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut envelope = Vec::with_capacity(SALTED_MAGIC.len() + SALT_LENGTH + body.len());
        envelope.extend_from_slice(SALTED_MAGIC);
        envelope.extend_from_slice(salt);
        envelope.extend_from_slice(&body);
        Ok(BASE64.encode(envelope))
    }
}

/// Split `[magic][salt][body]`; envelopes without the magic are unsalted.
fn split_envelope(bytes: &[u8]) -> Result<(Option<[u8; SALT_LENGTH]>, &[u8]), CryptoError> {
    if !bytes.starts_with(SALTED_MAGIC) {
        return Ok((None, bytes));
    }
    let header = SALTED_MAGIC.len() + SALT_LENGTH;
    if bytes.len() < header {
        return Err(CryptoError::MalformedCiphertext("truncated salt header"));
    }
    let mut salt = [0u8; SALT_LENGTH];
    salt.copy_from_slice(&bytes[SALTED_MAGIC.len()..header]);
    Ok((Some(salt), &bytes[header..]))
}
