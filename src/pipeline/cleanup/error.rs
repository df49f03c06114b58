//! Error types for the question cleanup pipeline.
//!
//! Agent transport failures are kept apart from store failures so the
//! per-record boundary can report which side broke.

use thiserror::Error;

use crate::db::DatabaseError;

/// Failure talking to an extraction or review agent.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent is not reachable at {0}")]
    Connection(String),

    #[error("Agent returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed agent response: {0}")]
    MalformedResponse(String),

    #[error("Timed out after {0}ms in {1}")]
    Timeout(u64, &'static str),

    #[error("Agent call cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record {0} not found")]
    RecordNotFound(i64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cleanup cancelled")]
    Cancelled,
}

impl From<rusqlite::Error> for CleanupError {
    fn from(e: rusqlite::Error) -> Self {
        CleanupError::Database(DatabaseError::Sqlite(e))
    }
}
