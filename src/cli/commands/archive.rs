//! `histcrypt archive` — seal a credential into the history database.
//!
//! Usage:
//!   histcrypt archive mail.example.com             # prompts for the value
//!   histcrypt archive mail.example.com "hunter2"   # value on the command line

use zeroize::Zeroizing;

use crate::audit::{AuditLevel, AuditLog, SqliteAuditLog};
use crate::cli::output;
use crate::cli::{prompt_password, validate_record_name, Cli, Context};
use crate::crypto::{KeyWrapper, MasterPasswordHash};
use crate::errors::{HistCryptError, Result};
use crate::history::{seal_secret, SqliteRecordStore};

/// Execute the `archive` command.
pub fn execute(cli: &Cli, name: &str, value: Option<&str>) -> Result<()> {
    validate_record_name(name)?;

    let ctx = Context::load(cli)?;
    let mut store = SqliteRecordStore::open(&ctx.database)?;

    let password = prompt_password()?;

    let value = match value {
        Some(v) => Zeroizing::new(v.to_string()),
        None => Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Value for {name}"))
                .interact()
                .map_err(|e| HistCryptError::CommandFailed(format!("input prompt: {e}")))?,
        ),
    };

    let params = ctx.settings.argon2_params();
    let hash = MasterPasswordHash::compute(&password)?;
    let (key, secret) = seal_secret(
        &KeyWrapper::new(params),
        &password,
        value.as_bytes(),
        ctx.settings.max_field_len,
    )?;

    let id = store.insert(name, &secret, key.as_bytes(), &hash)?;
    tracing::debug!(record_id = id, "archived record");

    let mut audit = SqliteAuditLog::open(&ctx.audit_dir());
    audit.begin("Archive record", "Start");
    audit.add_detail("Record", &format!("{name} ({id})"));
    audit.flush(AuditLevel::Info, false);

    output::success(&format!("Archived '{name}' as record {id}"));

    Ok(())
}
