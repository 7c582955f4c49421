//! `histcrypt list` — display archived records in a table.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;
use crate::history::SqliteRecordStore;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let store = SqliteRecordStore::open_existing(&ctx.database)?;

    let records = store.list()?;

    output::info(&format!(
        "{} — {} record(s)",
        ctx.database.display(),
        records.len()
    ));

    output::print_records_table(&records);

    Ok(())
}
