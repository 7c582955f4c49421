//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::history::{ArchivedRecord, FailureDetail, KeyScheme, RotationReport};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of archived records (Id, Name, Scheme, Sizes).
pub fn print_records_table(records: &[ArchivedRecord]) {
    if records.is_empty() {
        info("No archived records yet.");
        tip("Run `histcrypt archive <NAME>` to add one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Scheme", "Key bytes", "Secret bytes"]);

    for r in records {
        table.add_row(vec![
            r.id.to_string(),
            r.name.clone(),
            scheme_of(&r.key).to_string(),
            r.key.len().to_string(),
            r.secret.len().to_string(),
        ]);
    }

    println!("{table}");
}

/// Print the outcome of a completed rotation run.
pub fn print_report(report: &RotationReport) {
    if report.demo {
        warning("Demo mode is active: no records were modified.");
    }

    success(&format!(
        "{} of {} records updated ({} errors)",
        report.succeeded.len(),
        report.total_candidates,
        report.error_count
    ));

    if report.failures.is_empty() {
        return;
    }

    print_failures_table(&report.failures);
    if report.omitted_failures() > 0 {
        tip(&format!(
            "{} more failures are recorded in the audit log.",
            report.omitted_failures()
        ));
    }
}

fn print_failures_table(failures: &[FailureDetail]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Name", "Reason"]);

    for f in failures {
        table.add_row(vec![
            f.record_id.to_string(),
            f.record_name.clone(),
            f.kind.as_str().to_string(),
        ]);
    }

    println!("{table}");
}

fn scheme_of(key: &[u8]) -> &'static str {
    KeyScheme::of(key).map_or("unknown", |scheme| scheme.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::legacy::LEGACY_KEY_LEN;
    use crate::crypto::wrapping::SECURED_KEY_LEN;

    #[test]
    fn scheme_detection() {
        let mut current = vec![0u8; SECURED_KEY_LEN];
        current[0] = 0x01;
        assert_eq!(scheme_of(&current), "current");
        assert_eq!(scheme_of(&[0u8; LEGACY_KEY_LEN]), "legacy");
        assert_eq!(scheme_of(&[0u8; 5]), "unknown");
    }
}
