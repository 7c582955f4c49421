//! Read-only support for the deprecated history encryption scheme.
//!
//! Legacy records store 32 bytes of key material next to the ciphertext:
//!
//! ```text
//! key:    [salt: 20][nonce: 12]
//! secret: [ciphertext + 16-byte tag]
//! ```
//!
//! The record key is `PBKDF2-HMAC-SHA256(master password, salt, 5000)`,
//! applied directly to AES-256-GCM.  Nothing in HistCrypt writes this
//! format any more; records are upgraded to the current scheme instead.
//!
//! The adapter is compiled in with the `legacy-crypt` feature.  Builds
//! without it report `LegacyModuleUnavailable`, which makes a legacy
//! upgrade run abort before touching any record.

use zeroize::Zeroizing;

use super::keys::MasterPassword;
use crate::errors::{HistCryptError, Result};

/// Length of the legacy salt prefix in the key material.
pub const LEGACY_SALT_LEN: usize = 20;

/// Length of legacy key material (salt + nonce).
pub const LEGACY_KEY_LEN: usize = LEGACY_SALT_LEN + 12;

/// PBKDF2 rounds used by the legacy scheme.
#[cfg_attr(not(feature = "legacy-crypt"), allow(dead_code))]
const LEGACY_PBKDF2_ROUNDS: u32 = 5_000;

/// Whether the legacy decryption module is compiled into this build.
pub fn check_available() -> Result<()> {
    if cfg!(feature = "legacy-crypt") {
        Ok(())
    } else {
        Err(HistCryptError::LegacyModuleUnavailable)
    }
}

/// Decrypt a legacy secret with its key material and the master password.
#[cfg(feature = "legacy-crypt")]
pub fn decrypt(
    ciphertext: &[u8],
    key_material: &[u8],
    password: &MasterPassword,
) -> Result<Zeroizing<Vec<u8>>> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};
    use pbkdf2::pbkdf2_hmac;
    use sha2::Sha256;

    if key_material.len() != LEGACY_KEY_LEN {
        return Err(HistCryptError::LegacyDecryptFailed(format!(
            "key material must be {LEGACY_KEY_LEN} bytes, got {}",
            key_material.len()
        )));
    }
    if ciphertext.is_empty() {
        return Err(HistCryptError::LegacyDecryptFailed(
            "empty ciphertext".into(),
        ));
    }

    let (salt, nonce) = key_material.split_at(LEGACY_SALT_LEN);

    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, LEGACY_PBKDF2_ROUNDS, &mut key[..]);

    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| HistCryptError::LegacyDecryptFailed(format!("invalid key: {e}")))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| HistCryptError::LegacyDecryptFailed("authentication failed".into()))?;

    Ok(Zeroizing::new(plaintext))
}

/// Decrypt a legacy secret with its key material and the master password.
#[cfg(not(feature = "legacy-crypt"))]
pub fn decrypt(
    _ciphertext: &[u8],
    _key_material: &[u8],
    _password: &MasterPassword,
) -> Result<Zeroizing<Vec<u8>>> {
    Err(HistCryptError::LegacyModuleUnavailable)
}

/// Produce a legacy-format `(secret, key_material)` pair.
///
/// Only for building fixtures of pre-upgrade history.
#[cfg(all(test, feature = "legacy-crypt"))]
pub(crate) fn seal_for_tests(plaintext: &[u8], password: &MasterPassword) -> (Vec<u8>, Vec<u8>) {
    use aes_gcm::aead::{Aead, KeyInit, OsRng};
    use aes_gcm::{AeadCore, Aes256Gcm};
    use pbkdf2::pbkdf2_hmac;
    use rand::RngCore;
    use sha2::Sha256;

    let mut salt = [0u8; LEGACY_SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, LEGACY_PBKDF2_ROUNDS, &mut key);

    let cipher = Aes256Gcm::new_from_slice(&key).unwrap();
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let secret = cipher.encrypt(&nonce, plaintext).unwrap();

    let mut key_material = salt.to_vec();
    key_material.extend_from_slice(&nonce);
    (secret, key_material)
}
