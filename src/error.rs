//! Error types for Synheart Face

use thiserror::Error;

use crate::types::Stage;

/// Errors that can occur while running a capture session
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Acquisition failed: {0}")]
    Acquisition(String),

    #[error("Session already in progress (stage: {0})")]
    SessionInProgress(Stage),

    #[error("Frame source ended before the session finished (stage: {0})")]
    SourceExhausted(Stage),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Errors reported by a record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store rejected record: {0}")]
    Rejected(String),
}
