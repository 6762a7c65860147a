//! Runtime configuration read from the environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable overriding the database location.
pub const DB_PATH_VAR: &str = "NOTEMAKER_DB";
/// Environment variable holding the log filter directive.
pub const LOG_VAR: &str = "NOTEMAKER_LOG";

/// Settings shared by the CLI entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Location of the SQLite database file.
    pub database_path: PathBuf,
    /// `tracing` filter directive, if configured.
    pub log_filter: Option<String>,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    ///
    /// # Environment Variables
    ///
    /// - `NOTEMAKER_DB`: database path (default `{data_dir}/notemaker/notes.db`)
    /// - `NOTEMAKER_LOG`: log filter such as `debug` or `notemaker=trace`
    ///
    /// # Errors
    ///
    /// Returns an error if no database path is configured and the platform
    /// data directory cannot be determined.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let database_path = match std::env::var_os(DB_PATH_VAR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => default_database_path()?,
        };
        let log_filter = std::env::var(LOG_VAR).ok().filter(|s| !s.trim().is_empty());

        Ok(Self {
            database_path,
            log_filter,
        })
    }

    /// Replaces the database path, e.g. from a command-line flag.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }
}

/// Gets the cross-platform default database path.
///
/// Returns the path as `{data_dir}/notemaker/notes.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn default_database_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("notemaker").join("notes.db"))
}

/// Ensures the parent directory of the database file exists.
///
/// Creates the directory structure if it doesn't exist using `create_dir_all`.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}
