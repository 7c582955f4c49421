//! Integration tests for master password rotation over a SQLite store.
//!
//! Every test uses a cheap Argon2 profile so whole runs stay fast.

use std::cell::Cell;
use std::path::Path;

use histcrypt::audit::{AuditLog, SqliteAuditLog};
use histcrypt::crypto::{decrypt, Argon2Params, KeyWrapper, MasterPassword, MasterPasswordHash};
use histcrypt::errors::{HistCryptError, Result};
use histcrypt::history::{
    seal_secret, AbortReason, ArchivedRecord, FailureKind, KeyScheme, MigratedRecord,
    MigrationMode, RecordMigrator, RecordStore, RotationOptions, RotationOrchestrator,
    RotationOutcome, RotationReport, RunOutcome, SqliteRecordStore,
};
use histcrypt::notify::{LogNotifier, Notifier};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fast_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    }
}

fn options() -> RotationOptions {
    RotationOptions {
        argon2: fast_params(),
        ..RotationOptions::default()
    }
}

/// Archive `count` records named `record-<i>` with value `secret-<i>`.
fn seed(store: &mut SqliteRecordStore, password: &MasterPassword, count: usize) -> Vec<i64> {
    let wrapper = KeyWrapper::new(fast_params());
    let hash = MasterPasswordHash::compute(password).unwrap();

    (0..count)
        .map(|i| {
            let (key, secret) =
                seal_secret(&wrapper, password, format!("secret-{i}").as_bytes(), 1_000).unwrap();
            store
                .insert(&format!("record-{i}"), &secret, key.as_bytes(), &hash)
                .unwrap()
        })
        .collect()
}

/// Decrypt a stored record with the current scheme.
fn open_record(record: &ArchivedRecord, password: &MasterPassword) -> Result<String> {
    let key = KeyWrapper::new(fast_params()).unwrap_key(&record.key, password)?;
    let plaintext = decrypt(&key, &record.secret)?;
    Ok(String::from_utf8(plaintext.to_vec()).unwrap())
}

/// File-backed store, so tests can reach the rows with a second connection.
fn file_store(dir: &TempDir) -> (SqliteRecordStore, std::path::PathBuf) {
    let path = dir.path().join("history.db");
    (SqliteRecordStore::open(&path).unwrap(), path)
}

/// Damage a stored key column behind the store's back.
fn corrupt_key(db: &Path, id: i64, key: &[u8]) {
    let conn = rusqlite::Connection::open(db).unwrap();
    conn.execute(
        "UPDATE account_history SET key = ?1 WHERE id = ?2",
        rusqlite::params![key, id],
    )
    .unwrap();
}

fn run(
    store: &mut dyn RecordStore,
    audit: &mut SqliteAuditLog,
    notifier: &dyn Notifier,
    options: RotationOptions,
    mode: MigrationMode<'_>,
) -> RunOutcome {
    RotationOrchestrator::new(store, audit, notifier, options).run(mode)
}

fn completed(outcome: RunOutcome) -> RotationReport {
    match outcome {
        RunOutcome::Completed(report) => report,
        RunOutcome::Aborted(reason) => panic!("run aborted: {reason}"),
    }
}

/// Store wrapper that counts persist calls.
struct CountingStore {
    inner: SqliteRecordStore,
    persists: usize,
}

impl RecordStore for CountingStore {
    fn fetch_candidates(
        &self,
        expected: &MasterPasswordHash,
        scheme: KeyScheme,
    ) -> Result<Vec<ArchivedRecord>> {
        self.inner.fetch_candidates(expected, scheme)
    }

    fn persist(&mut self, record: &MigratedRecord) -> Result<()> {
        self.persists += 1;
        self.inner.persist(record)
    }
}

/// Store whose reads always fail.
struct BrokenStore;

impl RecordStore for BrokenStore {
    fn fetch_candidates(
        &self,
        _expected: &MasterPasswordHash,
        _scheme: KeyScheme,
    ) -> Result<Vec<ArchivedRecord>> {
        Err(HistCryptError::StoreError("disk on fire".into()))
    }

    fn persist(&mut self, _record: &MigratedRecord) -> Result<()> {
        Err(HistCryptError::StoreError("disk on fire".into()))
    }
}

/// Store that refuses to write one particular record.
struct RejectingStore {
    inner: SqliteRecordStore,
    reject_id: i64,
}

impl RecordStore for RejectingStore {
    fn fetch_candidates(
        &self,
        expected: &MasterPasswordHash,
        scheme: KeyScheme,
    ) -> Result<Vec<ArchivedRecord>> {
        self.inner.fetch_candidates(expected, scheme)
    }

    fn persist(&mut self, record: &MigratedRecord) -> Result<()> {
        if record.id == self.reject_id {
            return Err(HistCryptError::StoreError("database is locked".into()));
        }
        self.inner.persist(record)
    }
}

struct FailingNotifier {
    calls: Cell<usize>,
}

impl Notifier for FailingNotifier {
    fn send(&self, _report: &RotationReport) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        Err(HistCryptError::NotifyError("smtp unreachable".into()))
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

#[test]
fn rotation_moves_every_record_to_new_password() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let ids = seed(&mut store, &old, 3);
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    let report = completed(run(
        &mut store,
        &mut audit,
        &LogNotifier,
        options(),
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    assert_eq!(report.total_candidates, 3);
    assert_eq!(report.succeeded, ids);
    assert_eq!(report.persisted, 3);
    assert_eq!(report.error_count, 0);

    let new_hash = MasterPasswordHash::compute(&new).unwrap();
    for (i, id) in ids.iter().enumerate() {
        let record = store.get(*id).unwrap();
        assert!(record.master_hash.matches(&new_hash));
        assert_eq!(open_record(&record, &new).unwrap(), format!("secret-{i}"));
    }
}

#[test]
fn rotated_record_no_longer_opens_with_old_password() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let ids = seed(&mut store, &old, 1);
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    completed(run(
        &mut store,
        &mut audit,
        &LogNotifier,
        options(),
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    let record = store.get(ids[0]).unwrap();
    let err = open_record(&record, &old).unwrap_err();
    assert!(matches!(err, HistCryptError::KeyUnwrapFailed));
}

#[test]
fn corrupted_records_fail_and_stay_unchanged() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let dir = TempDir::new().unwrap();
    let (mut store, db) = file_store(&dir);
    let ids = seed(&mut store, &old, 6);

    // Corrupt every third key, keeping it long enough to stay a candidate.
    let garbage = vec![0x5Au8; 89];
    let corrupted: Vec<i64> = ids.iter().copied().skip(2).step_by(3).collect();
    for id in &corrupted {
        corrupt_key(&db, *id, &garbage);
    }

    let mut audit = SqliteAuditLog::open_in_memory().unwrap();
    let report = completed(run(
        &mut store,
        &mut audit,
        &LogNotifier,
        options(),
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    assert_eq!(report.total_candidates, 6);
    assert_eq!(report.error_count, corrupted.len());
    assert_eq!(report.persisted, 6 - corrupted.len());
    for failure in &report.failures {
        assert!(corrupted.contains(&failure.record_id));
        assert_eq!(failure.kind, FailureKind::KeyUnwrap);
        let index = ids.iter().position(|id| *id == failure.record_id).unwrap();
        assert_eq!(failure.record_name, format!("record-{index}"));
    }

    let old_hash = MasterPasswordHash::compute(&old).unwrap();
    for id in &corrupted {
        let record = store.get(*id).unwrap();
        assert_eq!(record.key, garbage);
        assert!(record.master_hash.matches(&old_hash));
    }
}

#[test]
fn staged_pair_leaves_old_pair_usable_until_persisted() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let ids = seed(&mut store, &old, 1);

    let old_hash = MasterPasswordHash::compute(&old).unwrap();
    let new_hash = MasterPasswordHash::compute(&new).unwrap();
    let record = store
        .fetch_candidates(&old_hash, KeyScheme::Current)
        .unwrap()
        .remove(0);

    let wrapper = KeyWrapper::new(fast_params());
    let migrator = RecordMigrator::new(
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
        wrapper,
        old_hash.clone(),
        new_hash.clone(),
    );
    let staged = match migrator.migrate(&record) {
        RotationOutcome::Success(staged) => staged,
        RotationOutcome::Failure(failure) => panic!("migration failed: {failure:?}"),
    };
    assert!(staged.master_hash.matches(&new_hash));

    // The new pair opens under the new password only.
    let new_key = wrapper
        .unwrap_key(staged.secured_key.as_bytes(), &new)
        .unwrap();
    assert_eq!(
        decrypt(&new_key, &staged.secret).unwrap().as_slice(),
        b"secret-0"
    );
    assert!(matches!(
        wrapper.unwrap_key(staged.secured_key.as_bytes(), &old),
        Err(HistCryptError::KeyUnwrapFailed)
    ));

    // The retained old pair still opens under the current password.
    assert_eq!(open_record(&record, &old).unwrap(), "secret-0");

    // Nothing reached the store.
    let stored = store.get(ids[0]).unwrap();
    assert_eq!(stored.key, record.key);
    assert_eq!(stored.secret, record.secret);
    assert!(stored.master_hash.matches(&old_hash));
}

#[test]
fn persist_failure_is_reported_and_run_continues() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let ids = seed(&mut store, &old, 3);

    let mut rejecting = RejectingStore {
        inner: store,
        reject_id: ids[1],
    };
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();
    let report = completed(run(
        &mut rejecting,
        &mut audit,
        &LogNotifier,
        options(),
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    assert_eq!(report.error_count, 1);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.failures[0].kind, FailureKind::Persist);
    assert_eq!(report.failures[0].record_id, ids[1]);
    assert_eq!(report.failures[0].record_name, "record-1");

    let old_hash = MasterPasswordHash::compute(&old).unwrap();
    let new_hash = MasterPasswordHash::compute(&new).unwrap();
    let stored = |id: i64| rejecting.inner.get(id).unwrap();
    assert!(stored(ids[0]).master_hash.matches(&new_hash));
    assert!(stored(ids[1]).master_hash.matches(&old_hash));
    assert!(stored(ids[2]).master_hash.matches(&new_hash));
    assert_eq!(open_record(&stored(ids[1]), &old).unwrap(), "secret-1");
}

#[test]
fn wrap_params_change_keeps_records_rotatable() {
    // Records archived under one Argon2 profile rotate under another.
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let ids = seed(&mut store, &old, 2);
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    let tuned = Argon2Params {
        memory_kib: 16_384,
        iterations: 2,
        parallelism: 1,
    };
    let report = completed(run(
        &mut store,
        &mut audit,
        &LogNotifier,
        RotationOptions {
            argon2: tuned,
            ..options()
        },
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    assert_eq!(report.total_candidates, 2);
    assert_eq!(report.persisted, 2);
    let record = store.get(ids[0]).unwrap();
    assert_eq!(open_record(&record, &new).unwrap(), "secret-0");
}

#[test]
fn oversized_output_is_internal_limit_and_not_persisted() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();

    let wrapper = KeyWrapper::new(fast_params());
    let hash = MasterPasswordHash::compute(&old).unwrap();
    let (key, secret) = seal_secret(&wrapper, &old, &[b'x'; 200], 1_000).unwrap();
    let id = store.insert("big", &secret, key.as_bytes(), &hash).unwrap();

    let mut counting = CountingStore {
        inner: store,
        persists: 0,
    };
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();
    let report = completed(run(
        &mut counting,
        &mut audit,
        &LogNotifier,
        RotationOptions {
            max_field_len: 150,
            ..options()
        },
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    assert_eq!(report.error_count, 1);
    assert_eq!(report.failures[0].kind, FailureKind::InternalLimit);
    assert_eq!(counting.persists, 0);
    assert_eq!(counting.inner.get(id).unwrap().secret, secret);
}

// ---------------------------------------------------------------------------
// Demo mode
// ---------------------------------------------------------------------------

#[test]
fn demo_mode_counts_successes_without_writing() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let ids = seed(&mut store, &old, 4);
    let before: Vec<Vec<u8>> = ids.iter().map(|id| store.get(*id).unwrap().key).collect();

    let mut counting = CountingStore {
        inner: store,
        persists: 0,
    };
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();
    let report = completed(run(
        &mut counting,
        &mut audit,
        &LogNotifier,
        RotationOptions {
            demo_mode: true,
            ..options()
        },
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    assert!(report.demo);
    assert_eq!(report.succeeded.len(), 4);
    assert_eq!(report.persisted, 0);
    assert_eq!(counting.persists, 0);

    let after: Vec<Vec<u8>> = ids
        .iter()
        .map(|id| counting.inner.get(*id).unwrap().key)
        .collect();
    assert_eq!(before, after);
}

// ---------------------------------------------------------------------------
// Aborts
// ---------------------------------------------------------------------------

#[test]
fn wrong_password_finds_no_candidates() {
    let old = MasterPassword::new("old-master-pw");
    let wrong = MasterPassword::new("not-the-password");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    seed(&mut store, &old, 2);
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    let outcome = run(
        &mut store,
        &mut audit,
        &LogNotifier,
        options(),
        MigrationMode::Rotate {
            current: &wrong,
            new: &new,
        },
    );

    assert!(matches!(
        outcome,
        RunOutcome::Aborted(AbortReason::NoCandidates)
    ));
}

#[test]
fn empty_store_aborts_with_error_audit_entry() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    let outcome = run(
        &mut store,
        &mut audit,
        &LogNotifier,
        options(),
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    );
    assert!(!outcome.is_success());

    let entries = audit.query(10, None).unwrap();
    assert!(entries
        .iter()
        .any(|e| e.level == histcrypt::audit::AuditLevel::Error));
}

#[test]
fn unreadable_store_aborts() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    let outcome = run(
        &mut BrokenStore,
        &mut audit,
        &LogNotifier,
        options(),
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    );

    assert!(matches!(
        outcome,
        RunOutcome::Aborted(AbortReason::StoreUnavailable(_))
    ));
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[test]
fn notifier_failure_does_not_fail_the_run() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    seed(&mut store, &old, 2);
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();
    let notifier = FailingNotifier {
        calls: Cell::new(0),
    };

    let report = completed(run(
        &mut store,
        &mut audit,
        &notifier,
        options(),
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    assert_eq!(notifier.calls.get(), 1);
    assert_eq!(report.persisted, 2);
}

#[test]
fn audit_buffer_is_flushed_at_threshold() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let dir = TempDir::new().unwrap();
    let (mut store, db) = file_store(&dir);
    let ids = seed(&mut store, &old, 5);
    for id in &ids {
        corrupt_key(&db, *id, &[0u8; 89]);
    }
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    let report = completed(run(
        &mut store,
        &mut audit,
        &LogNotifier,
        RotationOptions {
            flush_threshold: 2,
            ..options()
        },
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));
    assert_eq!(report.error_count, 5);
    assert_eq!(audit.detail_count(), 0);

    let entries = audit.query(100, None).unwrap();
    let partial = entries.iter().filter(|e| e.intermediate).count();
    assert_eq!(partial, 2);

    let last = &entries[0];
    assert!(!last.intermediate);
    assert!(last
        .details
        .iter()
        .any(|d| d.label == "Errors" && d.value == "5"));
}

#[test]
fn progress_samples_follow_interval() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    seed(&mut store, &old, 5);
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    let report = completed(run(
        &mut store,
        &mut audit,
        &LogNotifier,
        RotationOptions {
            progress_interval: 2,
            ..options()
        },
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    let processed: Vec<usize> = report.progress.iter().map(|p| p.processed).collect();
    assert_eq!(processed, vec![2, 4]);
    assert!(report.progress.iter().all(|p| p.total == 5));
}

#[test]
fn record_hash_check_passes_for_matching_rows() {
    let old = MasterPassword::new("old-master-pw");
    let new = MasterPassword::new("new-master-pw");
    let mut store = SqliteRecordStore::open_in_memory().unwrap();
    seed(&mut store, &old, 2);
    let mut audit = SqliteAuditLog::open_in_memory().unwrap();

    // Every candidate matches by construction, so the check passes.
    let report = completed(run(
        &mut store,
        &mut audit,
        &LogNotifier,
        RotationOptions {
            verify_record_hash: true,
            ..options()
        },
        MigrationMode::Rotate {
            current: &old,
            new: &new,
        },
    ));

    assert_eq!(report.persisted, 2);
    assert_eq!(report.error_count, 0);
}
