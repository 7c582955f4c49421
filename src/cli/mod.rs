//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::MasterPassword;
use crate::errors::{HistCryptError, Result};

/// Minimum password length to prevent trivially weak master passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Longest record name accepted by `archive`.
const MAX_NAME_LEN: usize = 255;

/// HistCrypt CLI: master password rotation for archived credentials.
#[derive(Parser)]
#[command(
    name = "histcrypt",
    about = "Master password rotation for archived credential history",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// History database (default: value from .histcrypt.toml)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Archive a credential under the current master password
    Archive {
        /// Display name of the record (e.g. "mail.example.com")
        name: String,
        /// Secret value (omit for interactive prompt)
        value: Option<String>,
    },

    /// Re-encrypt every archived record under a new master password
    Rotate,

    /// Upgrade records from the legacy encryption scheme
    Upgrade,

    /// List archived records (no secret values)
    List,

    /// View the audit log of rotation runs
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Show version information
    Version,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Settings from `<cwd>/.histcrypt.toml`, plus the resolved database path.
pub struct Context {
    pub project_dir: PathBuf,
    pub settings: Settings,
    pub database: PathBuf,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let project_dir = std::env::current_dir()?;
        let settings = Settings::load(&project_dir)?;
        let database = match &cli.database {
            Some(path) => project_dir.join(path),
            None => settings.database_path(&project_dir),
        };
        Ok(Self {
            project_dir,
            settings,
            database,
        })
    }

    /// Directory holding the audit database (next to the history database).
    pub fn audit_dir(&self) -> PathBuf {
        self.database
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.project_dir.clone())
    }
}

/// Get the current master password, trying in order:
/// 1. `HISTCRYPT_PASSWORD` env var (scripted runs)
/// 2. Interactive prompt
pub fn prompt_password() -> Result<MasterPassword> {
    if let Some(pw) = password_from_env("HISTCRYPT_PASSWORD") {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter current master password")
        .interact()
        .map_err(|e| HistCryptError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(MasterPassword::from(Zeroizing::new(pw)))
}

/// Prompt for a new master password with confirmation.
///
/// Respects `HISTCRYPT_NEW_PASSWORD` for scripted usage and enforces a
/// minimum password length.
pub fn prompt_new_password() -> Result<MasterPassword> {
    if let Some(pw) = password_from_env("HISTCRYPT_NEW_PASSWORD") {
        check_password_len(&pw)?;
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose new master password")
            .with_confirmation(
                "Confirm new master password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| HistCryptError::CommandFailed(format!("password prompt: {e}")))?;
        let password = MasterPassword::from(Zeroizing::new(password));

        if check_password_len(&password).is_err() {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(password);
    }
}

fn password_from_env(var: &str) -> Option<MasterPassword> {
    let pw = Zeroizing::new(std::env::var(var).ok()?);
    if pw.is_empty() {
        None
    } else {
        Some(MasterPassword::from(pw))
    }
}

fn check_password_len(password: &MasterPassword) -> Result<()> {
    if password.as_bytes().len() < MIN_PASSWORD_LEN {
        return Err(HistCryptError::CommandFailed(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate that a record name is usable in reports.
///
/// Must not be empty or blank, must not exceed 255 characters, and must
/// not contain control characters (names end up in audit lines).
pub fn validate_record_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(HistCryptError::CommandFailed(
            "record name cannot be empty".into(),
        ));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(HistCryptError::CommandFailed(format!(
            "record name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(HistCryptError::CommandFailed(
            "record name cannot contain control characters".into(),
        ));
    }

    Ok(())
}
