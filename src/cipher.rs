//! Authenticated encryption primitive.
//!
//! AES-256-GCM with a 12-byte nonce and a 16-byte tag appended to the
//! ciphertext. The capabilities are split into [`Seal`] and [`Open`] so that
//! callers can depend on only the half they need.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::{ErrorCategory, ErrorKind, Result, SecureError};
use crate::kdf::Key;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the authentication tag appended to every ciphertext
pub const TAG_LEN: usize = 16;

/// Message used for every authentication failure, whatever the cause.
pub const AUTH_FAILED_MSG: &str = "decryption failed: wrong passphrase or corrupted data";

pub trait Seal {
    /// Encrypt `plaintext`, returning ciphertext with the tag appended.
    fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>>;
}

pub trait Open {
    /// Verify the tag and decrypt. Any mismatch is reported as
    /// [`ErrorKind::AuthenticationFailed`] and nothing else.
    fn open(&self, nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Result<Vec<u8>>;
}

pub struct Aes256GcmCipher {
    aead: Aes256Gcm,
}

impl Aes256GcmCipher {
    pub fn new(key: &Key) -> Result<Self> {
        Self::from_slice(key.as_bytes())
    }

    /// Build from raw key material. Anything other than 32 bytes is a
    /// programming error and is reported as such.
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let aead = Aes256Gcm::new_from_slice(key).map_err(|_| {
            SecureError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::CipherConstruction,
                format!("invalid key length {} for AES-256-GCM", key.len()),
            )
        })?;
        Ok(Self { aead })
    }
}

impl Seal for Aes256GcmCipher {
    fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.aead
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| {
                SecureError::with_kind(
                    ErrorCategory::Internal,
                    ErrorKind::CipherConstruction,
                    "encryption failed",
                )
            })
    }
}

impl Open for Aes256GcmCipher {
    fn open(&self, nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Result<Vec<u8>> {
        // The aead error is opaque already; drop it anyway so no detail can
        // reach the caller.
        self.aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| {
                SecureError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::AuthenticationFailed,
                    AUTH_FAILED_MSG,
                )
            })
    }
}
