//! `histcrypt completions` — generate shell completion scripts.
//!
//! Usage:
//!   histcrypt completions bash > ~/.bash_completion.d/histcrypt
//!   histcrypt completions zsh

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::{HistCryptError, Result};

/// Execute the `completions` command.
pub fn execute(shell: &str) -> Result<()> {
    let shell = parse_shell(shell)?;
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "histcrypt", &mut io::stdout());
    Ok(())
}

/// Case-insensitive shell lookup; `ps` is accepted for PowerShell.
fn parse_shell(name: &str) -> Result<Shell> {
    let lowered = name.trim().to_lowercase();
    let lookup = if lowered == "ps" { "powershell" } else { lowered.as_str() };

    lookup.parse::<Shell>().map_err(|_| {
        HistCryptError::CommandFailed(format!(
            "unknown shell '{name}'; supported: bash, zsh, fish, powershell, elvish"
        ))
    })
}
