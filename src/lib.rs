//! secure - pack a directory tree and seal it under a passphrase.
//!
//! The key is SHA-256 of the passphrase and the container is
//! `nonce || AES-256-GCM(ciphertext || tag)`.

#![forbid(unsafe_code)]

pub mod archive;
pub mod cipher;
pub mod container;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
pub mod persist;
