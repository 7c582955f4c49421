//! Configuration loaded from `.histcrypt.toml`.

pub mod settings;

pub use settings::Settings;
