//! Audit log — SQLite-based history of rotation runs.
//!
//! A run builds one audit message at a time: an action, free-form
//! descriptions, and labelled detail lines.  `flush` writes the buffered
//! message as a row in `<store_dir>/audit.db` and clears the buffer, so
//! long runs can flush periodically instead of holding every detail line.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, the run silently continues without an audit trail.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::errors::{HistCryptError, Result};

/// Severity of a flushed audit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Error,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "info",
            AuditLevel::Error => "error",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "error" => AuditLevel::Error,
            _ => AuditLevel::Info,
        }
    }
}

/// A labelled detail line, e.g. ("Errors", "3").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDetail {
    pub label: String,
    pub value: String,
}

/// The message currently being built.
#[derive(Debug, Clone, Default)]
pub struct AuditMessage {
    pub action: String,
    pub descriptions: Vec<String>,
    pub details: Vec<AuditDetail>,
}

impl AuditMessage {
    fn is_empty(&self) -> bool {
        self.descriptions.is_empty() && self.details.is_empty()
    }
}

/// Sink for the audit trail of a rotation run.
pub trait AuditLog {
    /// Start a new message for `action` with an initial description.
    fn begin(&mut self, action: &str, description: &str);

    /// Add a description line to the current message.
    fn add_description(&mut self, description: &str);

    /// Add a labelled detail line to the current message.
    fn add_detail(&mut self, label: &str, value: &str);

    /// Number of detail lines buffered since the last flush.
    fn detail_count(&self) -> usize;

    /// Write the buffered message and clear it.
    ///
    /// `intermediate` marks a partial flush in the middle of a run.
    /// Never fails the caller.
    fn flush(&mut self, level: AuditLevel, intermediate: bool);
}

/// A single stored audit entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub level: AuditLevel,
    pub intermediate: bool,
    pub description: Option<String>,
    pub details: Vec<AuditDetail>,
}

/// SQLite-backed audit log.
pub struct SqliteAuditLog {
    conn: Option<Connection>,
    pending: AuditMessage,
}

impl SqliteAuditLog {
    /// Open (or create) the audit database at `<dir>/audit.db`.
    ///
    /// If the database can't be opened the log still works as a buffer,
    /// it just never persists anything.
    pub fn open(dir: &Path) -> Self {
        let db_path = Self::db_path(dir);
        let conn = Connection::open(&db_path).ok().and_then(|conn| {
            // Set restrictive permissions on the audit database (owner-only).
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o600);
                let _ = std::fs::set_permissions(&db_path, perms);
            }
            Self::init_schema(&conn).ok()?;
            Some(conn)
        });

        if conn.is_none() {
            tracing::warn!(path = %db_path.display(), "audit log unavailable, continuing without it");
        }

        Self {
            conn,
            pending: AuditMessage::default(),
        }
    }

    /// Open a throwaway in-memory audit database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HistCryptError::AuditError(format!("open: {e}")))?;
        Self::init_schema(&conn).map_err(|e| HistCryptError::AuditError(format!("schema: {e}")))?;
        Ok(Self {
            conn: Some(conn),
            pending: AuditMessage::default(),
        })
    }

    /// Whether entries are actually being persisted.
    pub fn is_persistent(&self) -> bool {
        self.conn.is_some()
    }

    /// The message buffered since the last flush.
    pub fn pending(&self) -> &AuditMessage {
        &self.pending
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp    TEXT NOT NULL,
                action       TEXT NOT NULL,
                level        TEXT NOT NULL,
                intermediate INTEGER NOT NULL DEFAULT 0,
                description  TEXT,
                details      TEXT NOT NULL
            );",
        )
    }

    fn write(&self, level: AuditLevel, intermediate: bool) -> Result<()> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };

        let description = if self.pending.descriptions.is_empty() {
            None
        } else {
            Some(self.pending.descriptions.join("; "))
        };
        let details = serde_json::to_string(&self.pending.details)
            .map_err(|e| HistCryptError::SerializationError(format!("audit details: {e}")))?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, action, level, intermediate, description, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                Utc::now().to_rfc3339(),
                self.pending.action,
                level.as_str(),
                intermediate,
                description,
                details
            ],
        )
        .map_err(|e| HistCryptError::AuditError(format!("insert: {e}")))?;

        Ok(())
    }

    /// Query recent audit entries.
    ///
    /// - `limit`: maximum number of entries to return (most recent first).
    /// - `since`: if provided, only return entries newer than this timestamp.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let Some(conn) = &self.conn else {
            return Err(HistCryptError::AuditError(
                "audit database is not available".into(),
            ));
        };

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        // RFC 3339 timestamps sort lexically, and every one sorts after "".
        let since_str = since.map(|ts| ts.to_rfc3339()).unwrap_or_default();

        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, action, level, intermediate, description, details
                 FROM audit_log
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| HistCryptError::AuditError(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![since_str, limit_i64], |row| {
                let ts_str: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));
                let level: String = row.get(3)?;
                let details: String = row.get(6)?;

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    action: row.get(2)?,
                    level: AuditLevel::parse(&level),
                    intermediate: row.get(4)?,
                    description: row.get(5)?,
                    details: serde_json::from_str(&details).unwrap_or_default(),
                })
            })
            .map_err(|e| HistCryptError::AuditError(format!("query exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| HistCryptError::AuditError(format!("row parse: {e}")))?);
        }

        Ok(entries)
    }

    /// Return the path to the audit database (for testing/display).
    pub fn db_path(dir: &Path) -> PathBuf {
        dir.join("audit.db")
    }
}

impl AuditLog for SqliteAuditLog {
    fn begin(&mut self, action: &str, description: &str) {
        self.pending = AuditMessage {
            action: action.to_string(),
            descriptions: vec![description.to_string()],
            details: Vec::new(),
        };
    }

    fn add_description(&mut self, description: &str) {
        self.pending.descriptions.push(description.to_string());
    }

    fn add_detail(&mut self, label: &str, value: &str) {
        self.pending.details.push(AuditDetail {
            label: label.to_string(),
            value: value.to_string(),
        });
    }

    fn detail_count(&self) -> usize {
        self.pending.details.len()
    }

    fn flush(&mut self, level: AuditLevel, intermediate: bool) {
        if self.pending.is_empty() {
            return;
        }

        if let Err(e) = self.write(level, intermediate) {
            tracing::warn!(error = %e, "failed to write audit entry");
        }

        self.pending.descriptions.clear();
        self.pending.details.clear();
    }
}
