use clap::Parser;
use histcrypt::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Archive {
            ref name,
            ref value,
        } => histcrypt::cli::commands::archive::execute(&cli, name, value.as_deref()),
        Commands::Rotate => histcrypt::cli::commands::rotate::execute(&cli),
        Commands::Upgrade => histcrypt::cli::commands::upgrade::execute(&cli),
        Commands::List => histcrypt::cli::commands::list::execute(&cli),
        Commands::Audit { last, ref since } => {
            histcrypt::cli::commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
        Commands::Version => histcrypt::cli::commands::version::execute(),
        Commands::Completions { ref shell } => {
            histcrypt::cli::commands::completions::execute(shell)
        }
    };

    if let Err(e) = result {
        histcrypt::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Logs go to stderr. `HISTCRYPT_LOG` overrides the `-v` level.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("HISTCRYPT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
