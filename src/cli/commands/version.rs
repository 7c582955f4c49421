//! `histcrypt version` — display version and build features.

use console::style;

use crate::crypto::legacy;
use crate::errors::Result;

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    println!("histcrypt {current}");

    let legacy_support = if legacy::check_available().is_ok() {
        style("enabled").green()
    } else {
        style("disabled").yellow()
    };
    println!("legacy decryption: {legacy_support}");

    Ok(())
}
