use md5::{Digest, Md5};
use zeroize::Zeroize;

pub const KEY_LENGTH: usize = 32; // AES-256
pub const IV_LENGTH: usize = 16;
pub const SALT_LENGTH: usize = 8;

/// Shared pharmacy passphrase, zeroed on drop.
///
/// Supplied by the hosting environment and handed to the decryptor at
/// construction. Never derived, stored or logged by this crate.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SharedKey {
    passphrase: Vec<u8>,
}

impl SharedKey {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into().into_bytes(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.passphrase.is_empty()
    }

    /// Derive the AES key and IV for one envelope.
    pub(crate) fn derive(&self, salt: Option<&[u8; SALT_LENGTH]>) -> DerivedKey {
        evp_bytes_to_key(&self.passphrase, salt)
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey(<redacted>)")
    }
}

/// Per-envelope key material, zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub(crate) struct DerivedKey {
    pub(crate) key: [u8; KEY_LENGTH],
    pub(crate) iv: [u8; IV_LENGTH],
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration.
///
/// `D_i = MD5(D_{i-1} || passphrase || salt)`, concatenated until
/// key and IV are filled.
fn evp_bytes_to_key(passphrase: &[u8], salt: Option<&[u8; SALT_LENGTH]>) -> DerivedKey {
    let mut material = [0u8; KEY_LENGTH + IV_LENGTH];
    let mut filled = 0;
    let mut previous: Option<[u8; 16]> = None;

    while filled < material.len() {
        let mut hasher = Md5::new();
        if let Some(prev) = &previous {
            hasher.update(prev);
        }
        hasher.update(passphrase);
        if let Some(salt) = salt {
            hasher.update(salt);
        }
        let block: [u8; 16] = hasher.finalize().into();

        let take = (material.len() - filled).min(block.len());
        material[filled..filled + take].copy_from_slice(&block[..take]);
        filled += take;
        previous = Some(block);
    }

    let mut derived = DerivedKey {
        key: [0u8; KEY_LENGTH],
        iv: [0u8; IV_LENGTH],
    };
    derived.key.copy_from_slice(&material[..KEY_LENGTH]);
    derived.iv.copy_from_slice(&material[KEY_LENGTH..]);
    material.zeroize();
    derived
}

/// Generate a random envelope salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let key = SharedKey::new("pharmacy-secret");
        let salt = [7u8; SALT_LENGTH];
        let a = key.derive(Some(&salt));
        let b = key.derive(Some(&salt));
        assert_eq!(a.key, b.key);
        assert_eq!(a.iv, b.iv);
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let key = SharedKey::new("pharmacy-secret");
        let a = key.derive(Some(&[1u8; SALT_LENGTH]));
        let b = key.derive(Some(&[2u8; SALT_LENGTH]));
        assert_ne!(a.key, b.key);
        assert_ne!(a.iv, b.iv);
    }

    #[test]
    fn different_passphrases_produce_different_keys() {
        let salt = [9u8; SALT_LENGTH];
        let a = SharedKey::new("one").derive(Some(&salt));
        let b = SharedKey::new("two").derive(Some(&salt));
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn first_block_is_md5_of_passphrase_and_salt() {
        let salt = [3u8; SALT_LENGTH];
        let derived = SharedKey::new("abc").derive(Some(&salt));

        let mut hasher = Md5::new();
        hasher.update(b"abc");
        hasher.update(salt);
        let expected: [u8; 16] = hasher.finalize().into();
        assert_eq!(&derived.key[..16], &expected);
    }

    #[test]
    fn unsalted_derivation_differs_from_salted() {
        let key = SharedKey::new("abc");
        let salted = key.derive(Some(&[0u8; SALT_LENGTH]));
        let unsalted = key.derive(None);
        assert_ne!(salted.key, unsalted.key);
    }

    #[test]
    fn debug_does_not_reveal_passphrase() {
        let key = SharedKey::new("super-secret-passphrase");
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
