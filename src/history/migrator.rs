//! Per-record migration protocol.
//!
//! A `RecordMigrator` turns one archived record into replacement key
//! material under the target master password.  Nothing is written here;
//! the orchestrator persists successes, so a failed record is simply left
//! as it was.
//!
//! Legacy upgrade:  legacy-decrypt(current) → mint key(current) → encrypt
//! Rotation:        unwrap(current) → decrypt → mint key(new) → encrypt

use serde::Serialize;

use super::record::{ArchivedRecord, KeyScheme, MigratedRecord};
use crate::crypto::{self, legacy, KeyWrapper, MasterPassword, MasterPasswordHash, SecuredKey};
use crate::errors::{HistCryptError, Result};

/// Which scheme the candidate records are currently encrypted with.
#[derive(Debug, Clone, Copy)]
pub enum MigrationMode<'a> {
    /// Records use the legacy scheme; re-encrypt them under the same password.
    LegacyUpgrade { current: &'a MasterPassword },
    /// Records use the current scheme; move them to a new password.
    Rotate {
        current: &'a MasterPassword,
        new: &'a MasterPassword,
    },
}

impl<'a> MigrationMode<'a> {
    /// Password the candidate records are encrypted under today.
    pub fn current(&self) -> &'a MasterPassword {
        match *self {
            MigrationMode::LegacyUpgrade { current } => current,
            MigrationMode::Rotate { current, .. } => current,
        }
    }

    /// Password the migrated records end up under.
    pub fn target(&self) -> &'a MasterPassword {
        match *self {
            MigrationMode::LegacyUpgrade { current } => current,
            MigrationMode::Rotate { new, .. } => new,
        }
    }

    /// Scheme the candidate records are expected to use.
    pub fn scheme(&self) -> KeyScheme {
        match self {
            MigrationMode::LegacyUpgrade { .. } => KeyScheme::Legacy,
            MigrationMode::Rotate { .. } => KeyScheme::Current,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, MigrationMode::LegacyUpgrade { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            MigrationMode::LegacyUpgrade { .. } => "legacy-upgrade",
            MigrationMode::Rotate { .. } => "rotate",
        }
    }
}

/// Why a record could not be migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    MasterPasswordMismatch,
    KeyUnwrap,
    SecretDecrypt,
    LegacyDecrypt,
    Encryption,
    KeyDerivation,
    InternalLimit,
    Persist,
    Internal,
}

impl FailureKind {
    /// Classify an error raised while migrating or persisting a record.
    pub fn classify(err: &HistCryptError) -> Self {
        match err {
            HistCryptError::MasterPasswordMismatch => FailureKind::MasterPasswordMismatch,
            HistCryptError::KeyUnwrapFailed => FailureKind::KeyUnwrap,
            HistCryptError::SecretDecryptFailed => FailureKind::SecretDecrypt,
            HistCryptError::LegacyDecryptFailed(_) | HistCryptError::LegacyModuleUnavailable => {
                FailureKind::LegacyDecrypt
            }
            HistCryptError::EncryptionFailed(_) => FailureKind::Encryption,
            HistCryptError::KeyDerivationFailed(_) => FailureKind::KeyDerivation,
            HistCryptError::InternalLimit { .. } => FailureKind::InternalLimit,
            HistCryptError::StoreError(_)
            | HistCryptError::RecordNotFound(_)
            | HistCryptError::StoreNotFound(_) => FailureKind::Persist,
            _ => FailureKind::Internal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MasterPasswordMismatch => "master password mismatch",
            FailureKind::KeyUnwrap => "key unwrap failed",
            FailureKind::SecretDecrypt => "secret decryption failed",
            FailureKind::LegacyDecrypt => "legacy decryption failed",
            FailureKind::Encryption => "re-encryption failed",
            FailureKind::KeyDerivation => "key derivation failed",
            FailureKind::InternalLimit => "internal size limit exceeded",
            FailureKind::Persist => "could not be saved",
            FailureKind::Internal => "internal error",
        }
    }
}

/// A record that was left untouched, with enough identity to find it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub kind: FailureKind,
    pub record_id: i64,
    pub record_name: String,
}

impl RecordFailure {
    pub fn new(kind: FailureKind, record: &ArchivedRecord) -> Self {
        Self {
            kind,
            record_id: record.id,
            record_name: record.name.clone(),
        }
    }
}

/// Result of migrating a single record.
#[derive(Debug)]
pub enum RotationOutcome {
    Success(MigratedRecord),
    Failure(RecordFailure),
}

/// Runs the per-record protocol for one mode.
pub struct RecordMigrator<'a> {
    mode: MigrationMode<'a>,
    wrapper: KeyWrapper,
    expected_hash: MasterPasswordHash,
    target_hash: MasterPasswordHash,
    verify_record_hash: bool,
    max_field_len: usize,
}

impl<'a> RecordMigrator<'a> {
    /// `expected_hash` fingerprints the current password and
    /// `target_hash` the password records end up under.
    pub fn new(
        mode: MigrationMode<'a>,
        wrapper: KeyWrapper,
        expected_hash: MasterPasswordHash,
        target_hash: MasterPasswordHash,
    ) -> Self {
        Self {
            mode,
            wrapper,
            expected_hash,
            target_hash,
            verify_record_hash: false,
            max_field_len: 1_000,
        }
    }

    /// Re-check each record's stored fingerprint before migrating it.
    pub fn verify_record_hash(mut self, enabled: bool) -> Self {
        self.verify_record_hash = enabled;
        self
    }

    /// Largest key or secret, in bytes, accepted on input and output.
    pub fn max_field_len(mut self, limit: usize) -> Self {
        self.max_field_len = limit;
        self
    }

    pub fn mode(&self) -> &MigrationMode<'a> {
        &self.mode
    }

    /// Migrate one record, classifying any failure.
    pub fn migrate(&self, record: &ArchivedRecord) -> RotationOutcome {
        match self.try_migrate(record) {
            Ok(migrated) => RotationOutcome::Success(migrated),
            Err(e) => RotationOutcome::Failure(RecordFailure::new(FailureKind::classify(&e), record)),
        }
    }

    fn try_migrate(&self, record: &ArchivedRecord) -> Result<MigratedRecord> {
        if self.verify_record_hash && !record.master_hash.matches(&self.expected_hash) {
            return Err(HistCryptError::MasterPasswordMismatch);
        }

        check_field_len("stored key", record.key.len(), self.max_field_len)?;
        check_field_len("stored secret", record.secret.len(), self.max_field_len)?;

        let plaintext = match self.mode {
            MigrationMode::LegacyUpgrade { current } => {
                legacy::decrypt(&record.secret, &record.key, current)?
            }
            MigrationMode::Rotate { current, .. } => {
                let key = self.wrapper.unwrap_key(&record.key, current)?;
                crypto::decrypt(&key, &record.secret)?
            }
        };

        let (secured_key, secret) = seal_secret(
            &self.wrapper,
            self.mode.target(),
            &plaintext,
            self.max_field_len,
        )?;

        Ok(MigratedRecord {
            id: record.id,
            secured_key,
            secret,
            master_hash: self.target_hash.clone(),
        })
    }
}

/// Encrypt `plaintext` under a freshly minted key for `password`.
///
/// Fails with `InternalLimit` if either output exceeds `max_field_len`.
pub fn seal_secret(
    wrapper: &KeyWrapper,
    password: &MasterPassword,
    plaintext: &[u8],
    max_field_len: usize,
) -> Result<(SecuredKey, Vec<u8>)> {
    let minted = wrapper.make_secured_key(password)?;
    let secret = crypto::encrypt(&minted.key, plaintext)?;

    check_field_len("secured key", minted.secured.len(), max_field_len)?;
    check_field_len("encrypted secret", secret.len(), max_field_len)?;

    Ok((minted.secured, secret))
}

fn check_field_len(field: &'static str, len: usize, limit: usize) -> Result<()> {
    if len > limit {
        return Err(HistCryptError::InternalLimit { field, len, limit });
    }
    Ok(())
}
