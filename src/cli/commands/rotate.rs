//! `histcrypt rotate` — change the master password of the archived history.
//!
//! Every record sealed under the current master password is decrypted
//! and re-sealed under the new one, with a fresh data key.  Records that
//! fail stay untouched and are listed in the summary.

use crate::audit::SqliteAuditLog;
use crate::cli::output;
use crate::cli::{prompt_new_password, prompt_password, Cli, Context};
use crate::errors::{HistCryptError, Result};
use crate::history::{
    MigrationMode, RotationOptions, RotationOrchestrator, RunOutcome, SqliteRecordStore,
};
use crate::notify::{JsonFileNotifier, LogNotifier, Notifier};

/// Execute the `rotate` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let mut store = SqliteRecordStore::open_existing(&ctx.database)?;

    output::info("Enter the current master password.");
    let current = prompt_password()?;

    output::info("Choose the new master password.");
    let new = prompt_new_password()?;

    if current.as_bytes() == new.as_bytes() {
        return Err(HistCryptError::CommandFailed(
            "new master password must differ from the current one".into(),
        ));
    }

    run(
        &ctx,
        &mut store,
        MigrationMode::Rotate {
            current: &current,
            new: &new,
        },
    )
}

/// Run the orchestrator against an opened store and print the outcome.
///
/// Shared by `rotate` and `upgrade`.
pub(crate) fn run(
    ctx: &Context,
    store: &mut SqliteRecordStore,
    mode: MigrationMode<'_>,
) -> Result<()> {
    let mut audit = SqliteAuditLog::open(&ctx.audit_dir());
    if !audit.is_persistent() {
        output::warning("Audit database unavailable; continuing without an audit trail.");
    }

    let notifier: Box<dyn Notifier> = match ctx.settings.report_path(&ctx.project_dir) {
        Some(dir) => Box::new(JsonFileNotifier::new(dir)),
        None => Box::new(LogNotifier),
    };

    let options = RotationOptions::from(&ctx.settings);
    let outcome =
        RotationOrchestrator::new(store, &mut audit, notifier.as_ref(), options).run(mode);

    match outcome {
        RunOutcome::Completed(report) => {
            output::print_report(&report);
            if report.error_count > 0 {
                output::warning("Some records could not be updated and were left unchanged.");
            }
            Ok(())
        }
        RunOutcome::Aborted(reason) => Err(HistCryptError::RotationAborted(reason.to_string())),
    }
}
