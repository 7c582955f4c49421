//! `histcrypt audit` — display the audit log.
//!
//! Usage:
//!   histcrypt audit               # show last 50 entries
//!   histcrypt audit --last 20     # show last 20
//!   histcrypt audit --since 7d    # entries from last 7 days

use chrono::Utc;

use crate::audit::{AuditEntry, AuditLevel, SqliteAuditLog};
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{HistCryptError, Result};

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let audit = SqliteAuditLog::open(&ctx.audit_dir());

    let since_dt = match since {
        Some(s) => Some(parse_duration(s)?),
        None => None,
    };

    let entries = audit.query(last, since_dt)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);

    Ok(())
}

/// Parse a human-friendly duration string like "7d", "24h", "30m".
fn parse_duration(input: &str) -> Result<chrono::DateTime<Utc>> {
    let input = input.trim();

    let (num_str, unit) = if let Some(s) = input.strip_suffix('d') {
        (s, 'd')
    } else if let Some(s) = input.strip_suffix('h') {
        (s, 'h')
    } else if let Some(s) = input.strip_suffix('m') {
        (s, 'm')
    } else {
        return Err(HistCryptError::CommandFailed(format!(
            "invalid duration '{input}'; use a format like 7d, 24h, or 30m"
        )));
    };

    let num: i64 = num_str.parse().map_err(|_| {
        HistCryptError::CommandFailed(format!("invalid duration '{input}': bad number"))
    })?;

    let duration = match unit {
        'd' => chrono::Duration::days(num),
        'h' => chrono::Duration::hours(num),
        _ => chrono::Duration::minutes(num),
    };

    Ok(Utc::now() - duration)
}

/// Print audit entries in a formatted table.
fn print_audit_table(entries: &[AuditEntry]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Action", "Level", "Description", "Details"]);

    for entry in entries {
        let time = entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut level = colorize_level(entry.level);
        if entry.intermediate {
            level.push_str(" (partial)");
        }
        let details = if entry.details.is_empty() {
            "-".to_string()
        } else {
            entry
                .details
                .iter()
                .map(|d| format!("{}: {}", d.label, d.value))
                .collect::<Vec<_>>()
                .join("\n")
        };

        table.add_row(vec![
            time,
            entry.action.clone(),
            level,
            entry.description.clone().unwrap_or_else(|| "-".into()),
            details,
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

fn colorize_level(level: AuditLevel) -> String {
    use console::style;

    match level {
        AuditLevel::Info => style(level.as_str()).green().to_string(),
        AuditLevel::Error => style(level.as_str()).red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;

    #[test]
    fn parse_duration_days() {
        let dt = parse_duration("7d").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_days() - 7).abs() <= 1);
    }

    #[test]
    fn parse_duration_hours() {
        let dt = parse_duration("24h").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_hours() - 24).abs() <= 1);
    }

    #[test]
    fn parse_duration_minutes() {
        let dt = parse_duration("30m").unwrap();
        let diff = Utc::now() - dt;
        assert!((diff.num_minutes() - 30).abs() <= 1);
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("7x").is_err());
        assert!(parse_duration("d").is_err());
    }

    #[test]
    fn colorize_level_keeps_name() {
        assert!(colorize_level(AuditLevel::Info).contains("info"));
        assert!(colorize_level(AuditLevel::Error).contains("error"));
    }

    #[test]
    fn since_filter_includes_recent_entries() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut audit = SqliteAuditLog::open(dir.path());

        audit.begin("Update Master Password (H)", "Start");
        audit.flush(AuditLevel::Info, false);

        let since = parse_duration("1h").unwrap();
        let entries = audit.query(10, Some(since)).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
