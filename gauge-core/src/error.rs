//! Error types for gauge-core

use thiserror::Error;

/// Top-level error type for gauge-core
#[derive(Error, Debug)]
pub enum GaugeError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by the session state machine and its collaborators
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Out of order answer: current question is {expected}, got {actual}")]
    OutOfOrder { expected: String, actual: String },

    #[error("Student {student_id} already has an active session: {session_id}")]
    SessionAlreadyActive {
        student_id: String,
        session_id: String,
    },

    #[error("Session {0} is already processing another request")]
    Conflict(String),

    #[error("Question pool exhausted for subject '{subject}' after {served} questions")]
    QuestionPoolExhausted { subject: String, served: usize },

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from session, profile and question storage
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors from loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
