//! Passphrase to key derivation.
//!
//! The key is the SHA-256 digest of the passphrase. There is no salt, so the
//! same passphrase always yields the same key and a container can be opened
//! with nothing but the passphrase.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// A symmetric key derived from a passphrase. Wiped on drop.
pub struct Key {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key").field("bytes", &"[REDACTED]").finish()
    }
}

/// Derive a 32-byte key from a passphrase.
///
/// Used by both the seal and open paths so that derivation can never differ
/// between them.
pub fn derive_key(passphrase: &[u8]) -> Key {
    let mut hasher = Sha256::new();
    hasher.update(passphrase);
    let mut digest = hasher.finalize();

    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(digest.as_slice());
    digest.as_mut_slice().zeroize();

    let key = Key::from_bytes(bytes);
    bytes.zeroize();
    key
}
