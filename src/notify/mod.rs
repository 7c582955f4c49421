//! Delivery of the final rotation report.
//!
//! The orchestrator hands every completed report to a `Notifier` and
//! ignores delivery failures beyond logging them.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{HistCryptError, Result};
use crate::history::RotationReport;

/// Receives the report of a completed run.
pub trait Notifier {
    fn send(&self, report: &RotationReport) -> Result<()>;
}

/// Emits the report summary through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, report: &RotationReport) -> Result<()> {
        tracing::info!(
            action = %report.action,
            mode = %report.mode,
            demo = report.demo,
            candidates = report.total_candidates,
            succeeded = report.succeeded.len(),
            persisted = report.persisted,
            errors = report.error_count,
            "rotation report"
        );
        for failure in &report.failures {
            tracing::info!(
                record_id = failure.record_id,
                record = %failure.record_name,
                reason = failure.kind.as_str(),
                "record not migrated"
            );
        }
        Ok(())
    }
}

/// Writes each report as a JSON file into a directory.
#[derive(Debug, Clone)]
pub struct JsonFileNotifier {
    dir: PathBuf,
}

impl JsonFileNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the report for a run started at `report.started_at` goes to.
    pub fn report_path(&self, report: &RotationReport) -> PathBuf {
        let stamp = report.started_at.format("%Y%m%d-%H%M%S-%3f");
        self.dir.join(format!("rotation-{stamp}.json"))
    }
}

impl Notifier for JsonFileNotifier {
    fn send(&self, report: &RotationReport) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| HistCryptError::NotifyError(format!("cannot create report dir: {e}")))?;

        let json = serde_json::to_string_pretty(report)
            .map_err(|e| HistCryptError::SerializationError(format!("report: {e}")))?;

        let path = self.report_path(report);
        fs::write(&path, json).map_err(|e| {
            HistCryptError::NotifyError(format!("cannot write {}: {e}", path.display()))
        })?;

        tracing::info!(path = %path.display(), "rotation report written");
        Ok(())
    }
}
