//! History module — archived credentials and master password rotation.
//!
//! This module provides:
//! - `ArchivedRecord` and `MigratedRecord` types (`record`)
//! - The `RecordStore` trait and its SQLite backend (`store`)
//! - The per-record migration protocol (`migrator`)
//! - The batch driver for a whole run (`orchestrator`)
//! - The run report and ETA estimation (`report`)

pub mod migrator;
pub mod orchestrator;
pub mod record;
pub mod report;
pub mod store;

// Re-export the most commonly used items.
pub use migrator::{
    seal_secret, FailureKind, MigrationMode, RecordFailure, RecordMigrator, RotationOutcome,
};
pub use orchestrator::{AbortReason, RotationOptions, RotationOrchestrator, RunOutcome};
pub use record::{ArchivedRecord, KeyScheme, MigratedRecord};
pub use report::{Eta, FailureDetail, ProgressSample, RotationReport};
pub use store::{RecordStore, SqliteRecordStore};
