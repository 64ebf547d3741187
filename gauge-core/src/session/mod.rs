//! Diagnostic session lifecycle

pub mod manager;
pub mod response;
pub mod state;

pub use manager::{NextStep, QuestionPrompt, SessionManager, SessionSummary, SubmitResult};
pub use response::{AnswerSubmission, ResponseRecord};
pub use state::{SessionStatus, TestSession};
