//! Cryptographic primitives for HistCrypt.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption of secrets (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - Key material types and HKDF sub-keys (`keys`)
//! - Password-based wrapping of per-record keys (`wrapping`)
//! - Master password fingerprints (`fingerprint`)
//! - Read-only decryption of the deprecated scheme (`legacy`)

pub mod encryption;
pub mod fingerprint;
pub mod kdf;
pub mod keys;
pub mod legacy;
pub mod wrapping;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, KeyWrapper, ...};
pub use encryption::{decrypt, encrypt};
pub use fingerprint::MasterPasswordHash;
pub use kdf::{derive_password_key, generate_salt, Argon2Params};
pub use keys::{MasterPassword, SymmetricKey};
pub use wrapping::{KeyWrapper, MintedKey, SecuredKey};
