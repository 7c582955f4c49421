//! Master password fingerprints.
//!
//! Every archived record stores the fingerprint of the master password it
//! was encrypted under, so the store can select the records a given
//! password is able to open.  The fingerprint must be stable across runs,
//! so the Argon2id step uses a fixed domain salt and fixed cost
//! parameters, independent of the tunable key-wrapping parameters:
//!
//!   `base64(HMAC-SHA256(Argon2id(password, DOMAIN_SALT), "histcrypt:mpass-hash"))`

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::kdf::{derive_password_key, Argon2Params};
use super::keys::MasterPassword;
use crate::errors::{HistCryptError, Result};

const DOMAIN_SALT: &[u8] = b"histcrypt.master-password.v1";
const HASH_LABEL: &[u8] = b"histcrypt:mpass-hash";

/// Argon2id cost for fingerprints.  Changing this orphans every stored
/// record, so it is not configurable.
pub const FINGERPRINT_PARAMS: Argon2Params = Argon2Params {
    memory_kib: 19_456,
    iterations: 2,
    parallelism: 1,
};

/// One-way fingerprint of a master password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MasterPasswordHash(String);

impl MasterPasswordHash {
    /// Compute the fingerprint of `password`.
    pub fn compute(password: &MasterPassword) -> Result<Self> {
        let stretched =
            derive_password_key(password.as_bytes(), DOMAIN_SALT, &FINGERPRINT_PARAMS)?;

        let mut mac = Hmac::<Sha256>::new_from_slice(stretched.as_slice())
            .map_err(|e| HistCryptError::KeyDerivationFailed(format!("HMAC init failed: {e}")))?;
        mac.update(HASH_LABEL);

        Ok(Self(BASE64.encode(mac.finalize().into_bytes())))
    }

    /// Wrap a fingerprint read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare two fingerprints in constant time.
    pub fn matches(&self, other: &MasterPasswordHash) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl fmt::Debug for MasterPasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterPasswordHash({})", self.0)
    }
}

impl fmt::Display for MasterPasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
