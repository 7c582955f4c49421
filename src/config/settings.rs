use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::Argon2Params;
use crate::errors::{HistCryptError, Result};

/// Installation-level configuration, loaded from `.histcrypt.toml`.
///
/// Every field has a sensible default so HistCrypt works out-of-the-box
/// without any config file at all.  A `Settings` value is built once by
/// the caller and passed by reference to whatever needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite database holding the archived history (relative to the project root).
    #[serde(default = "default_database")]
    pub database: String,

    /// Demo installations never modify stored records.
    #[serde(default)]
    pub demo_mode: bool,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Re-check each record's stored master password hash before migrating it.
    #[serde(default)]
    pub verify_record_hash: bool,

    /// Buffered audit details that trigger an intermediate flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Processed records between two progress lines.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Largest secured key or encrypted secret the store accepts, in bytes.
    #[serde(default = "default_max_field_len")]
    pub max_field_len: usize,

    /// Failure detail lines kept in the final report.
    #[serde(default = "default_max_report_failures")]
    pub max_report_failures: usize,

    /// Directory that receives JSON rotation reports (logged only if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<String>,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_database() -> String {
    ".histcrypt/history.db".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_flush_threshold() -> usize {
    100
}

fn default_progress_interval() -> usize {
    100
}

fn default_max_field_len() -> usize {
    1_000
}

fn default_max_report_failures() -> usize {
    1_000
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database(),
            demo_mode: false,
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            verify_record_hash: false,
            flush_threshold: default_flush_threshold(),
            progress_interval: default_progress_interval(),
            max_field_len: default_max_field_len(),
            max_report_failures: default_max_report_failures(),
            report_dir: None,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".histcrypt.toml";

    /// Environment variable that forces demo mode on.
    const DEMO_ENV: &'static str = "HISTCRYPT_DEMO";

    /// Load settings from `<project_dir>/.histcrypt.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    /// `HISTCRYPT_DEMO=1` turns demo mode on regardless of the file.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        let mut settings = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&contents).map_err(|e| {
                HistCryptError::ConfigError(format!(
                    "Failed to parse {}: {e}",
                    config_path.display()
                ))
            })?
        } else {
            Self::default()
        };

        if matches!(
            std::env::var(Self::DEMO_ENV).as_deref(),
            Ok("1") | Ok("true")
        ) {
            settings.demo_mode = true;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would make a rotation run misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(HistCryptError::ConfigError(
                "flush_threshold must be at least 1".into(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(HistCryptError::ConfigError(
                "progress_interval must be at least 1".into(),
            ));
        }
        if self.max_field_len == 0 {
            return Err(HistCryptError::ConfigError(
                "max_field_len must be at least 1".into(),
            ));
        }
        self.argon2_params().validate()
    }

    /// Full path to the history database.
    pub fn database_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.database)
    }

    /// Full path to the report directory, if one is configured.
    pub fn report_path(&self, project_dir: &Path) -> Option<PathBuf> {
        self.report_dir.as_ref().map(|dir| project_dir.join(dir))
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
