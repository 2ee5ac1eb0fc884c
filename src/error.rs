//! Error types for the ingestion pipeline.
//!
//! Transport and payload failures are absorbed by the fetch layer and only
//! surface through logs. Persistence failures propagate to the caller.
//! Configuration failures stop the process before any work starts.

use thiserror::Error;

/// Failure to obtain a usable payload from the completion API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// The storage collaborator rejected a read or write.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// A batch merge halted partway through.
///
/// Records before the failing one are durably merged; the failing record
/// and everything after it are unprocessed.
#[derive(Error, Debug)]
#[error("merge halted at '{name}' after {committed} committed record(s): {source}")]
pub struct MergeError {
    pub committed: usize,
    pub name: String,
    #[source]
    pub source: StoreError,
}

/// Missing or invalid startup configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
