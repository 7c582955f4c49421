//! Record storage for archived history.
//!
//! The rotation pipeline only needs two operations, captured by the
//! `RecordStore` trait.  `SqliteRecordStore` is the concrete backend used
//! by the CLI; it keeps records in an `account_history` table:
//!
//! ```text
//! id | name | pass (BLOB) | key (BLOB) | mpass_hash | changed_at
//! ```

use std::fs;
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::record::{ArchivedRecord, KeyScheme, MigratedRecord};
use crate::crypto::legacy::LEGACY_KEY_LEN;
use crate::crypto::MasterPasswordHash;
use crate::errors::{HistCryptError, Result};

/// Storage operations the rotation pipeline depends on.
pub trait RecordStore {
    /// Records encrypted under the master password with fingerprint
    /// `expected` whose key column belongs to `scheme`, with a non-empty
    /// secret, in id order.
    fn fetch_candidates(
        &self,
        expected: &MasterPasswordHash,
        scheme: KeyScheme,
    ) -> Result<Vec<ArchivedRecord>>;

    /// Replace a record's key, secret and fingerprint in one write.
    fn persist(&mut self, record: &MigratedRecord) -> Result<()>;
}

/// SQLite-backed history store.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Open (or create) the history database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(path, perms);
        }

        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an existing history database, failing if it does not exist.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HistCryptError::StoreNotFound(path.to_path_buf()));
        }
        Self::open(path)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS account_history (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                pass        BLOB NOT NULL,
                key         BLOB NOT NULL,
                mpass_hash  TEXT NOT NULL,
                changed_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_account_history_mpass
                ON account_history (mpass_hash);",
        )?;
        Ok(())
    }

    /// Archive a new record and return its id.
    pub fn insert(
        &mut self,
        name: &str,
        secret: &[u8],
        key: &[u8],
        master_hash: &MasterPasswordHash,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO account_history (name, pass, key, mpass_hash, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                name,
                secret,
                key,
                master_hash.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch one record by id.
    pub fn get(&self, id: i64) -> Result<ArchivedRecord> {
        self.conn
            .query_row(
                "SELECT id, name, pass, key, mpass_hash FROM account_history WHERE id = ?1",
                [id],
                row_to_record,
            )
            .optional()?
            .ok_or(HistCryptError::RecordNotFound(id))
    }

    /// All records, in id order.
    pub fn list(&self) -> Result<Vec<ArchivedRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, pass, key, mpass_hash FROM account_history ORDER BY id")?;
        let rows = stmt.query_map([], row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl RecordStore for SqliteRecordStore {
    fn fetch_candidates(
        &self,
        expected: &MasterPasswordHash,
        scheme: KeyScheme,
    ) -> Result<Vec<ArchivedRecord>> {
        // Mirrors `KeyScheme::of`.
        let key_filter = match scheme {
            KeyScheme::Legacy => "length(key) = ?1",
            KeyScheme::Current => "length(key) > ?1",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, pass, key, mpass_hash
             FROM account_history
             WHERE {key_filter}
               AND length(pass) > 0
               AND mpass_hash = ?2
             ORDER BY id"
        ))?;
        let legacy_len = i64::try_from(LEGACY_KEY_LEN).unwrap_or(i64::MAX);
        let rows = stmt.query_map(
            rusqlite::params![legacy_len, expected.as_str()],
            row_to_record,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn persist(&mut self, record: &MigratedRecord) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE account_history
             SET pass = ?1, key = ?2, mpass_hash = ?3, changed_at = ?4
             WHERE id = ?5",
            rusqlite::params![
                record.secret,
                record.secured_key.as_bytes(),
                record.master_hash.as_str(),
                Utc::now().to_rfc3339(),
                record.id
            ],
        )?;

        if changed == 0 {
            return Err(HistCryptError::RecordNotFound(record.id));
        }
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArchivedRecord> {
    let hash: String = row.get(4)?;
    Ok(ArchivedRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        secret: row.get(2)?,
        key: row.get(3)?,
        master_hash: MasterPasswordHash::from_stored(hash),
    })
}
