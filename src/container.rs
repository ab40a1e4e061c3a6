//! Sealed container layout.
//!
//! ```text
//! offset 0         .. NONCE_LEN : nonce
//! offset NONCE_LEN .. end       : AES-256-GCM ciphertext || 16-byte tag
//! ```
//!
//! Nothing else is stored: no salt, no length, no version marker.

use rand::{CryptoRng, RngCore};

use crate::cipher::{Aes256GcmCipher, NONCE_LEN, Open, Seal};
use crate::error::{ErrorCategory, ErrorKind, Result, SecureError};
use crate::kdf::Key;

/// A borrowed view of a container whose length has been validated.
#[derive(Debug, Clone, Copy)]
pub struct SealedContainer<'a> {
    nonce: [u8; NONCE_LEN],
    body: &'a [u8],
}

impl<'a> SealedContainer<'a> {
    /// Split raw bytes into nonce and body.
    ///
    /// Input shorter than a nonce is rejected here, before any key is
    /// derived or cipher touched.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < NONCE_LEN {
            return Err(SecureError::with_kind(
                ErrorCategory::User,
                ErrorKind::TruncatedContainer,
                format!(
                    "input too short to be a sealed container ({} bytes, need at least {})",
                    bytes.len(),
                    NONCE_LEN
                ),
            ));
        }
        let (nonce, body) = bytes.split_at(NONCE_LEN);
        let mut nonce_arr = [0u8; NONCE_LEN];
        nonce_arr.copy_from_slice(nonce);
        Ok(Self {
            nonce: nonce_arr,
            body,
        })
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Ciphertext with the tag still attached.
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// Authenticate and decrypt the body.
    pub fn open(&self, cipher: &impl Open) -> Result<Vec<u8>> {
        cipher.open(&self.nonce, self.body)
    }
}

/// Seal `plaintext` under `key` with a fresh nonce drawn from `rng`.
pub fn seal<R>(key: &Key, plaintext: &[u8], rng: &mut R) -> Result<Vec<u8>>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut nonce = [0u8; NONCE_LEN];
    rng.try_fill_bytes(&mut nonce).map_err(|e| {
        SecureError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::RandomSource,
            "failed to generate nonce",
            e,
        )
    })?;
    seal_with_nonce(key, &nonce, plaintext)
}

/// Seal with a caller-chosen nonce.
///
/// Only for reproducible output in tests. Reusing a nonce under the same
/// key breaks AES-GCM completely; production code goes through [`seal`].
pub fn seal_with_nonce(key: &Key, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256GcmCipher::new(key)?;
    let sealed = cipher.seal(nonce, plaintext)?;

    let mut output = Vec::with_capacity(NONCE_LEN + sealed.len());
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed);
    Ok(output)
}

/// Parse and open a container in one step.
pub fn open(key: &Key, bytes: &[u8]) -> Result<Vec<u8>> {
    let container = SealedContainer::parse(bytes)?;
    let cipher = Aes256GcmCipher::new(key)?;
    container.open(&cipher)
}
