//! Answer submissions and the records they produce

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::pattern::ResponsePattern;
use crate::types::{DifficultyTier, QuestionId, SessionId};

/// An answer as submitted by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub answer: String,
    pub response_time_seconds: f64,
    #[serde(default)]
    pub correction_count: u32,
    /// Hesitation markers, when the client reports them
    #[serde(default)]
    pub hesitation_count: Option<u32>,
}

impl AnswerSubmission {
    pub fn new(
        question_id: impl Into<QuestionId>,
        answer: impl Into<String>,
        response_time_seconds: f64,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            answer: answer.into(),
            response_time_seconds,
            correction_count: 0,
            hesitation_count: None,
        }
    }

    pub fn with_corrections(mut self, count: u32) -> Self {
        self.correction_count = count;
        self
    }

    pub fn with_hesitations(mut self, count: u32) -> Self {
        self.hesitation_count = Some(count);
        self
    }

    /// Reject submissions that cannot be scored
    pub fn validate(&self) -> Result<(), SessionError> {
        if !self.response_time_seconds.is_finite() || self.response_time_seconds < 0.0 {
            return Err(SessionError::InvalidSubmission(format!(
                "response time must be a non-negative number, got {}",
                self.response_time_seconds
            )));
        }
        Ok(())
    }
}

/// One answered question. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub session_id: SessionId,
    pub question_id: QuestionId,
    /// 1-based position within the session
    pub position: usize,
    pub submitted_answer: String,
    pub is_correct: bool,
    pub response_time_seconds: f64,
    pub correction_count: u32,
    #[serde(default)]
    pub hesitation_count: u32,
    pub pattern: ResponsePattern,
    pub cognitive_load: f64,
    pub topic: String,
    pub subject: String,
    pub difficulty: u8,
    pub tier: DifficultyTier,
    pub estimate_before: f64,
    pub estimate_after: f64,
    pub answered_at: DateTime<Utc>,
}
