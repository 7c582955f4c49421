//! Archived history records and their migrated replacements.

use std::fmt;

use crate::crypto::legacy::LEGACY_KEY_LEN;
use crate::crypto::{MasterPasswordHash, SecuredKey};

/// Encryption scheme of a stored key column, told apart by its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    /// Raw `[salt | nonce]` key material, exactly `LEGACY_KEY_LEN` bytes.
    Legacy,
    /// A wrapped `SecuredKey`; always longer than legacy key material.
    Current,
}

impl KeyScheme {
    /// Classify a key column.  `None` for anything shorter than 256 bits.
    pub fn of(key: &[u8]) -> Option<Self> {
        match key.len() {
            LEGACY_KEY_LEN => Some(KeyScheme::Legacy),
            n if n > LEGACY_KEY_LEN => Some(KeyScheme::Current),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyScheme::Legacy => "legacy",
            KeyScheme::Current => "current",
        }
    }
}

/// One row of archived credential history.
///
/// `key` holds a secured key for current-scheme records and raw key
/// material for legacy records; `secret` is the matching ciphertext.
#[derive(Clone)]
pub struct ArchivedRecord {
    pub id: i64,
    /// Display name, only used to identify failures in reports.
    pub name: String,
    pub secret: Vec<u8>,
    pub key: Vec<u8>,
    pub master_hash: MasterPasswordHash,
}

impl fmt::Debug for ArchivedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchivedRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("secret_len", &self.secret.len())
            .field("key_len", &self.key.len())
            .field("master_hash", &self.master_hash)
            .finish()
    }
}

/// Replacement key material for a record, ready to be persisted.
///
/// Both fields are always written together.
#[derive(Debug, Clone)]
pub struct MigratedRecord {
    pub id: i64,
    pub secured_key: SecuredKey,
    pub secret: Vec<u8>,
    /// Fingerprint of the master password the new key is wrapped under.
    pub master_hash: MasterPasswordHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_scheme_by_length() {
        assert_eq!(KeyScheme::of(&[0u8; LEGACY_KEY_LEN]), Some(KeyScheme::Legacy));
        assert_eq!(KeyScheme::of(&[1u8; 89]), Some(KeyScheme::Current));
        assert_eq!(KeyScheme::of(&[1u8; 8]), None);
    }
}
