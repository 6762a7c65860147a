//! Error types shared by the storage, repository and view-model layers.

use thiserror::Error;

/// Failures of a storage operation.
///
/// "No such row" is never an error: single-row lookups return `Option`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite rejected or failed the statement.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The blocking worker running the statement panicked or was cancelled.
    #[error("Storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// A user intent that was rejected before any storage call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Notes need a non-blank title to be saved.
    #[error("Note title cannot be empty")]
    EmptyTitle,

    /// The intent only applies to a note that has been saved before.
    #[error("Note has not been saved yet")]
    NotPersisted,
}

pub type StoreResult<T> = Result<T, StoreError>;
