//! Batch driver for master password rotation.
//!
//! A run walks the candidate records strictly in stored order, one at a
//! time.  Each record is either rewritten with both a new secured key and
//! a new secret, or left exactly as it was.  Per-record failures are
//! counted and reported; only problems found before the loop starts
//! abort the run.

use std::time::Instant;

use crate::audit::{AuditLevel, AuditLog};
use crate::config::Settings;
use crate::crypto::{legacy, Argon2Params, KeyWrapper, MasterPasswordHash};
use crate::notify::Notifier;

use super::migrator::{FailureKind, MigrationMode, RecordFailure, RecordMigrator, RotationOutcome};
use super::report::{Eta, ProgressSample, RotationReport};
use super::store::RecordStore;

/// Audit action name for history rotations.
pub const ACTION: &str = "Update Master Password (H)";

const DESC_START: &str = "Start";
const DESC_MODULE_ERROR: &str = "Error in encryption module";
const DESC_FETCH_ERROR: &str = "Error fetching record passwords";
const DESC_KDF_ERROR: &str = "Error deriving master password hash";
const DETAIL_FAILED: &str = "Failed to update history password";
const DETAIL_UPDATED: &str = "Updated records";
const DETAIL_ERRORS: &str = "Errors";

/// Knobs for a single run, usually taken from `Settings`.
#[derive(Debug, Clone)]
pub struct RotationOptions {
    pub demo_mode: bool,
    pub argon2: Argon2Params,
    pub verify_record_hash: bool,
    pub flush_threshold: usize,
    pub progress_interval: usize,
    pub max_field_len: usize,
    pub max_report_failures: usize,
}

impl Default for RotationOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for RotationOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            demo_mode: settings.demo_mode,
            argon2: settings.argon2_params(),
            verify_record_hash: settings.verify_record_hash,
            flush_threshold: settings.flush_threshold.max(1),
            progress_interval: settings.progress_interval.max(1),
            max_field_len: settings.max_field_len,
            max_report_failures: settings.max_report_failures,
        }
    }
}

/// Why a run stopped before processing any record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    LegacyModuleUnavailable,
    NoCandidates,
    StoreUnavailable(String),
    KeyDerivation(String),
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::LegacyModuleUnavailable => {
                f.write_str("legacy encryption module is not available")
            }
            AbortReason::NoCandidates => f.write_str("no records found for this master password"),
            AbortReason::StoreUnavailable(e) => write!(f, "could not read records: {e}"),
            AbortReason::KeyDerivation(e) => write!(f, "could not fingerprint master password: {e}"),
        }
    }
}

/// Result of a run.
///
/// A completed run may still contain per-record failures; see
/// `RotationReport::error_count`.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RotationReport),
    Aborted(AbortReason),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&RotationReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Aborted(_) => None,
        }
    }
}

/// Drives one rotation run over a record store.
pub struct RotationOrchestrator<'a, S: ?Sized, A: ?Sized, N: ?Sized> {
    store: &'a mut S,
    audit: &'a mut A,
    notifier: &'a N,
    options: RotationOptions,
}

impl<'a, S, A, N> RotationOrchestrator<'a, S, A, N>
where
    S: RecordStore + ?Sized,
    A: AuditLog + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(
        store: &'a mut S,
        audit: &'a mut A,
        notifier: &'a N,
        options: RotationOptions,
    ) -> Self {
        Self {
            store,
            audit,
            notifier,
            options,
        }
    }

    /// Run the rotation to completion.
    pub fn run(&mut self, mode: MigrationMode<'_>) -> RunOutcome {
        self.audit.begin(ACTION, DESC_START);
        self.audit.flush(AuditLevel::Info, false);
        tracing::info!(
            mode = mode.label(),
            demo = self.options.demo_mode,
            "starting master password rotation"
        );

        if mode.is_legacy() && legacy::check_available().is_err() {
            return self.abort(DESC_MODULE_ERROR, AbortReason::LegacyModuleUnavailable);
        }

        let expected_hash = match MasterPasswordHash::compute(mode.current()) {
            Ok(hash) => hash,
            Err(e) => {
                return self.abort(DESC_KDF_ERROR, AbortReason::KeyDerivation(e.to_string()))
            }
        };

        let candidates = match self.store.fetch_candidates(&expected_hash, mode.scheme()) {
            Ok(records) if records.is_empty() => {
                return self.abort(DESC_FETCH_ERROR, AbortReason::NoCandidates)
            }
            Ok(records) => records,
            Err(e) => {
                return self.abort(DESC_FETCH_ERROR, AbortReason::StoreUnavailable(e.to_string()))
            }
        };

        let target_hash = match mode {
            MigrationMode::LegacyUpgrade { .. } => expected_hash.clone(),
            MigrationMode::Rotate { new, .. } => match MasterPasswordHash::compute(new) {
                Ok(hash) => hash,
                Err(e) => {
                    return self.abort(DESC_KDF_ERROR, AbortReason::KeyDerivation(e.to_string()))
                }
            },
        };

        let migrator = RecordMigrator::new(
            mode,
            KeyWrapper::new(self.options.argon2),
            expected_hash,
            target_hash,
        )
        .verify_record_hash(self.options.verify_record_hash)
        .max_field_len(self.options.max_field_len);

        let total = candidates.len();
        let mut report = RotationReport::new(
            ACTION,
            mode.label(),
            self.options.demo_mode,
            total,
            self.options.max_report_failures,
        );
        let started = Instant::now();

        for record in &candidates {
            // Demo installations must not mutate data.
            if self.options.demo_mode {
                report.record_success(record.id, false);
                continue;
            } else if self.audit.detail_count() >= self.options.flush_threshold {
                self.audit.flush(AuditLevel::Info, true);
            }

            let processed = report.processed();
            if processed % self.options.progress_interval == 0 {
                let elapsed = started.elapsed();
                let eta = Eta::estimate(elapsed, processed, total);
                tracing::debug!(
                    processed,
                    total,
                    eta_seconds = eta.eta_seconds,
                    rate = format_args!("{:.2}/s", eta.rate),
                    "{ACTION}: records updated"
                );
                if processed > 0 {
                    report.record_progress(ProgressSample {
                        processed,
                        total,
                        elapsed_secs: elapsed.as_secs_f64(),
                        eta,
                    });
                }
            }

            let failure = match migrator.migrate(record) {
                RotationOutcome::Success(migrated) => match self.store.persist(&migrated) {
                    Ok(()) => {
                        report.record_success(record.id, true);
                        None
                    }
                    Err(e) => {
                        tracing::warn!(record_id = record.id, error = %e, "failed to persist record");
                        Some(RecordFailure::new(FailureKind::Persist, record))
                    }
                },
                RotationOutcome::Failure(failure) => Some(failure),
            };

            if let Some(failure) = failure {
                tracing::warn!(
                    record_id = failure.record_id,
                    record = %failure.record_name,
                    reason = failure.kind.as_str(),
                    "record left unchanged"
                );
                self.audit.add_detail(
                    DETAIL_FAILED,
                    &format!("{} ({})", failure.record_name, failure.record_id),
                );
                report.record_failure(&failure);
            }
        }

        self.audit.add_detail(DETAIL_UPDATED, &report.succeeded_list());
        self.audit
            .add_detail(DETAIL_ERRORS, &report.error_count.to_string());
        self.audit.flush(AuditLevel::Info, false);

        report.finish();
        tracing::info!(
            succeeded = report.succeeded.len(),
            persisted = report.persisted,
            errors = report.error_count,
            "master password rotation finished"
        );

        if let Err(e) = self.notifier.send(&report) {
            tracing::warn!(error = %e, "failed to deliver rotation report");
        }

        RunOutcome::Completed(report)
    }

    fn abort(&mut self, description: &str, reason: AbortReason) -> RunOutcome {
        tracing::error!(%reason, "master password rotation aborted");
        self.audit.add_description(description);
        self.audit.flush(AuditLevel::Error, false);
        RunOutcome::Aborted(reason)
    }
}
