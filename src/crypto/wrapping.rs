//! Password-based wrapping of per-record keys.
//!
//! A secured key is self-describing, so unwrapping needs nothing but the
//! bytes and the master password:
//!
//! ```text
//! [0x01][m_cost u32 LE][t_cost u32 LE][p_cost u32 LE][salt: 16][nonce: 12][wrapped key + tag: 48]
//! ```
//!
//! The key-encryption key is `HKDF-SHA256(Argon2id(password, salt), "histcrypt:key-wrap:v1")`
//! and the per-record key is sealed with AES-256-GCM under it.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use zeroize::Zeroizing;

use super::encryption::{NONCE_LEN, TAG_LEN};
use super::kdf::{derive_password_key, generate_salt, Argon2Params, SALT_LEN};
use super::keys::{derive_subkey, MasterPassword, SymmetricKey, KEY_LEN};
use crate::errors::{HistCryptError, Result};

/// Algorithm tag for Argon2id + HKDF-SHA256 + AES-256-GCM.
const SCHEME_V1: u8 = 0x01;

/// HKDF label binding the derived key to the wrapping purpose.
const WRAP_INFO: &[u8] = b"histcrypt:key-wrap:v1";

/// Tag byte plus three little-endian u32 KDF parameters.
const PARAMS_LEN: usize = 1 + 3 * 4;

/// Total length of a v1 secured key.
pub const SECURED_KEY_LEN: usize = PARAMS_LEN + SALT_LEN + NONCE_LEN + KEY_LEN + TAG_LEN;

/// A per-record key sealed under a master password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuredKey(Vec<u8>);

impl SecuredKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for SecuredKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// A freshly generated per-record key together with its wrapped form.
#[derive(Debug)]
pub struct MintedKey {
    pub key: SymmetricKey,
    pub secured: SecuredKey,
}

/// Wraps and unwraps per-record keys under a master password.
///
/// The Argon2 parameters only apply to new wraps; unwrapping always
/// uses the parameters recorded in the secured key.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyWrapper {
    params: Argon2Params,
}

impl KeyWrapper {
    pub fn new(params: Argon2Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Argon2Params {
        &self.params
    }

    /// Seal `key` under `password` with a fresh salt and nonce.
    pub fn wrap_key(&self, key: &SymmetricKey, password: &MasterPassword) -> Result<SecuredKey> {
        let salt = generate_salt();
        let kek = wrapping_key(password, &salt, &self.params)?;

        let cipher = Aes256Gcm::new_from_slice(kek.as_slice())
            .map_err(|e| HistCryptError::EncryptionFailed(format!("invalid key length: {e}")))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, key.as_bytes().as_slice())
            .map_err(|e| HistCryptError::EncryptionFailed(format!("key wrap error: {e}")))?;

        let mut out = Vec::with_capacity(SECURED_KEY_LEN);
        out.push(SCHEME_V1);
        out.extend_from_slice(&self.params.memory_kib.to_le_bytes());
        out.extend_from_slice(&self.params.iterations.to_le_bytes());
        out.extend_from_slice(&self.params.parallelism.to_le_bytes());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(SecuredKey(out))
    }

    /// Recover the per-record key from `secured`.
    ///
    /// Every failure, whether malformed input or a tag mismatch from a
    /// wrong password, is reported as `KeyUnwrapFailed`.
    pub fn unwrap_key(&self, secured: &[u8], password: &MasterPassword) -> Result<SymmetricKey> {
        let parsed = ParsedKey::parse(secured)?;
        parsed
            .params
            .validate()
            .map_err(|_| HistCryptError::KeyUnwrapFailed)?;

        let kek = wrapping_key(password, parsed.salt, &parsed.params)
            .map_err(|_| HistCryptError::KeyUnwrapFailed)?;
        let cipher = Aes256Gcm::new_from_slice(kek.as_slice())
            .map_err(|_| HistCryptError::KeyUnwrapFailed)?;

        let plain = cipher
            .decrypt(Nonce::from_slice(parsed.nonce), parsed.sealed)
            .map_err(|_| HistCryptError::KeyUnwrapFailed)?;
        let plain = Zeroizing::new(plain);

        SymmetricKey::from_slice(&plain).ok_or(HistCryptError::KeyUnwrapFailed)
    }

    /// Mint a new per-record key for `password`.
    pub fn make_secured_key(&self, password: &MasterPassword) -> Result<MintedKey> {
        let key = SymmetricKey::generate();
        let secured = self.wrap_key(&key, password)?;
        Ok(MintedKey { key, secured })
    }
}

fn wrapping_key(
    password: &MasterPassword,
    salt: &[u8],
    params: &Argon2Params,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let stretched = derive_password_key(password.as_bytes(), salt, params)?;
    derive_subkey(stretched.as_slice(), WRAP_INFO)
}

struct ParsedKey<'a> {
    params: Argon2Params,
    salt: &'a [u8],
    nonce: &'a [u8],
    sealed: &'a [u8],
}

impl<'a> ParsedKey<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() != SECURED_KEY_LEN || bytes[0] != SCHEME_V1 {
            return Err(HistCryptError::KeyUnwrapFailed);
        }

        let read_u32 = |at: usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[at..at + 4]);
            u32::from_le_bytes(word)
        };
        let params = Argon2Params {
            memory_kib: read_u32(1),
            iterations: read_u32(5),
            parallelism: read_u32(9),
        };

        let (salt, rest) = bytes[PARAMS_LEN..].split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        Ok(Self {
            params,
            salt,
            nonce,
            sealed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper() -> KeyWrapper {
        KeyWrapper::new(Argon2Params {
            memory_kib: 8_192,
            iterations: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn secured_key_has_fixed_length_and_tag() {
        let pw = MasterPassword::new("correct horse");
        let minted = wrapper().make_secured_key(&pw).unwrap();
        assert_eq!(minted.secured.len(), SECURED_KEY_LEN);
        assert_eq!(minted.secured.as_bytes()[0], SCHEME_V1);
    }

    #[test]
    fn unwrap_uses_params_embedded_in_key() {
        let pw = MasterPassword::new("correct horse");
        let minted = wrapper().make_secured_key(&pw).unwrap();

        // A wrapper configured with other params still reads the stored ones.
        let other = KeyWrapper::new(Argon2Params {
            memory_kib: 16_384,
            iterations: 2,
            parallelism: 2,
        });
        let key = other.unwrap_key(minted.secured.as_bytes(), &pw).unwrap();
        assert_eq!(key.as_bytes(), minted.key.as_bytes());
    }

    #[test]
    fn unknown_scheme_tag_is_rejected() {
        let pw = MasterPassword::new("correct horse");
        let minted = wrapper().make_secured_key(&pw).unwrap();
        let mut bytes = minted.secured.into_bytes();
        bytes[0] = 0x7f;
        let err = wrapper().unwrap_key(&bytes, &pw).unwrap_err();
        assert!(matches!(err, HistCryptError::KeyUnwrapFailed));
    }

    #[test]
    fn absurd_stored_params_are_rejected_before_derivation() {
        let pw = MasterPassword::new("correct horse");
        let minted = wrapper().make_secured_key(&pw).unwrap();
        let mut bytes = minted.secured.into_bytes();
        bytes[1..5].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = wrapper().unwrap_key(&bytes, &pw).unwrap_err();
        assert!(matches!(err, HistCryptError::KeyUnwrapFailed));
    }

    #[test]
    fn truncated_key_is_rejected() {
        let pw = MasterPassword::new("correct horse");
        let err = wrapper().unwrap_key(&[SCHEME_V1; 20], &pw).unwrap_err();
        assert!(matches!(err, HistCryptError::KeyUnwrapFailed));
    }
}
