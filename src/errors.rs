use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in HistCrypt.
#[derive(Debug, Error)]
pub enum HistCryptError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key unwrap failed — wrong master password or corrupted key")]
    KeyUnwrapFailed,

    #[error("Secret decryption failed — corrupted data or wrong key")]
    SecretDecryptFailed,

    #[error("Legacy decryption failed: {0}")]
    LegacyDecryptFailed(String),

    #[error("Legacy encryption module is not available in this build")]
    LegacyModuleUnavailable,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Internal error — {field} is {len} bytes, limit is {limit}")]
    InternalLimit {
        field: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("Record master password hash does not match the current master password")]
    MasterPasswordMismatch,

    // --- Store errors ---
    #[error("Record store error: {0}")]
    StoreError(String),

    #[error("Record {0} not found")]
    RecordNotFound(i64),

    #[error("Record store not found at {0}")]
    StoreNotFound(PathBuf),

    // --- Audit / notification errors ---
    #[error("Audit error: {0}")]
    AuditError(String),

    #[error("Notification failed: {0}")]
    NotifyError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Rotation aborted: {0}")]
    RotationAborted(String),
}

impl From<rusqlite::Error> for HistCryptError {
    fn from(e: rusqlite::Error) -> Self {
        HistCryptError::StoreError(e.to_string())
    }
}

/// Convenience type alias for HistCrypt results.
pub type Result<T> = std::result::Result<T, HistCryptError>;
