//! Key material types and HKDF-SHA256 sub-key derivation.
//!
//! - `MasterPassword` holds the caller-supplied password in a buffer that
//!   is wiped on drop and never shows up in `Debug` output.
//! - `SymmetricKey` holds a per-record 256-bit key, also wiped on drop.
//! - `derive_subkey` expands a stretched password key into an independent
//!   sub-key bound to a context label (RFC 5869).

use std::fmt;

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{HistCryptError, Result};

/// Length of symmetric keys and derived sub-keys (256 bits).
pub const KEY_LEN: usize = 32;

/// The top-level secret every per-record key is wrapped under.
///
/// Not `Clone`; pass it by reference.
pub struct MasterPassword(Zeroizing<String>);

impl MasterPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Zeroizing<String>> for MasterPassword {
    fn from(value: Zeroizing<String>) -> Self {
        Self(value)
    }
}

impl fmt::Debug for MasterPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterPassword(<redacted>)")
    }
}

/// A 32-byte per-record key that automatically zeroes its memory
/// when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Create a new `SymmetricKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        let key = Self::new(bytes);
        bytes.zeroize();
        key
    }

    /// Build a key from a slice, failing if the length is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().ok()?;
        Some(Self::new(array))
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Expand `ikm` into a 32-byte sub-key bound to `info`.
///
/// The extract step is skipped: `ikm` always comes out of Argon2id and
/// already has full entropy.
pub fn derive_subkey(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| HistCryptError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}
