//! `histcrypt upgrade` — move records off the legacy encryption scheme.
//!
//! The master password stays the same; only the key and secret formats
//! change.

use crate::cli::commands::rotate;
use crate::cli::output;
use crate::cli::{prompt_password, Cli, Context};
use crate::errors::Result;
use crate::history::{MigrationMode, SqliteRecordStore};

/// Execute the `upgrade` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let mut store = SqliteRecordStore::open_existing(&ctx.database)?;

    output::info("Enter the master password.");
    let current = prompt_password()?;

    rotate::run(
        &ctx,
        &mut store,
        MigrationMode::LegacyUpgrade { current: &current },
    )
}
