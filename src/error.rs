//! Error types for import and export operations.

use std::io;
use thiserror::Error;

/// Errors that can occur while fetching, storing or exporting snapshots.
#[derive(Error, Debug)]
pub enum ImportError {
    /// I/O error during file operations.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// HTTP request error during a snapshot fetch.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    /// SQLite error from the local store.
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    /// Snapshot endpoint answered with a non-success status.
    #[error("Snapshot fetch failed: {0}")]
    FetchFailed(String),

    /// An object in a snapshot had no integer `id`.
    #[error("object #{index} in {resource} snapshot has no integer id")]
    MissingId { resource: String, index: usize },

    /// A resource name outside the fixed set.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
}
