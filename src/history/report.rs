//! Run report and progress estimation.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::migrator::{FailureKind, RecordFailure};

/// Estimated time remaining and throughput for a partially finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Eta {
    pub eta_seconds: u64,
    /// Records per second.
    pub rate: f64,
}

impl Eta {
    /// Extrapolate from `completed` of `total` records in `elapsed`.
    ///
    /// `eta = elapsed * remaining / completed`, `rate = completed / elapsed`.
    /// Nothing completed yet means nothing to extrapolate from: both are zero.
    pub fn estimate(elapsed: Duration, completed: usize, total: usize) -> Self {
        if completed == 0 || total == 0 {
            return Self {
                eta_seconds: 0,
                rate: 0.0,
            };
        }

        let secs = elapsed.as_secs_f64();
        let remaining = total.saturating_sub(completed) as f64;
        let eta = secs * remaining / completed as f64;
        let rate = if secs > 0.0 {
            completed as f64 / secs
        } else {
            0.0
        };

        Self {
            eta_seconds: eta.round() as u64,
            rate,
        }
    }
}

/// A progress line captured during the run.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSample {
    pub processed: usize,
    pub total: usize,
    pub elapsed_secs: f64,
    #[serde(flatten)]
    pub eta: Eta,
}

/// One record that was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub record_id: i64,
    pub record_name: String,
    pub kind: FailureKind,
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.record_name, self.record_id)
    }
}

impl From<&RecordFailure> for FailureDetail {
    fn from(failure: &RecordFailure) -> Self {
        Self {
            record_id: failure.record_id,
            record_name: failure.record_name.clone(),
            kind: failure.kind,
        }
    }
}

/// Audit summary of one rotation run.
///
/// Built up record by record and handed to the notifier once the run
/// completes.  Failure details are capped; `error_count` is not.
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    pub action: String,
    pub mode: String,
    pub demo: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_candidates: usize,
    /// Ids of records counted as successful, in processing order.
    pub succeeded: Vec<i64>,
    /// Records actually rewritten in the store.
    pub persisted: usize,
    pub error_count: usize,
    pub failures: Vec<FailureDetail>,
    pub progress: Vec<ProgressSample>,
    #[serde(skip)]
    max_failures: usize,
}

impl RotationReport {
    pub fn new(
        action: &str,
        mode: &str,
        demo: bool,
        total_candidates: usize,
        max_failures: usize,
    ) -> Self {
        Self {
            action: action.to_string(),
            mode: mode.to_string(),
            demo,
            started_at: Utc::now(),
            finished_at: None,
            total_candidates,
            succeeded: Vec::new(),
            persisted: 0,
            error_count: 0,
            failures: Vec::new(),
            progress: Vec::new(),
            max_failures,
        }
    }

    /// Count `id` as successful; `persisted` is false in demo mode.
    pub fn record_success(&mut self, id: i64, persisted: bool) {
        self.succeeded.push(id);
        if persisted {
            self.persisted += 1;
        }
    }

    pub fn record_failure(&mut self, failure: &RecordFailure) {
        self.error_count += 1;
        if self.failures.len() < self.max_failures {
            self.failures.push(FailureDetail::from(failure));
        }
    }

    pub fn record_progress(&mut self, sample: ProgressSample) {
        self.progress.push(sample);
    }

    /// Records processed so far, successful or not.
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.error_count
    }

    /// Failures beyond the retained detail cap.
    pub fn omitted_failures(&self) -> usize {
        self.error_count - self.failures.len()
    }

    /// Comma-separated ids of successful records.
    pub fn succeeded_list(&self) -> String {
        self.succeeded
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
