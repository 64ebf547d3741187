//! Diagnostic session value and its state machine
//!
//! `TestSession` is a plain value: the manager loads it from the store,
//! applies one transition and saves it back. Every transition checks the
//! current status and fails with `InvalidState` otherwise, so terminal
//! sessions can never be mutated.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::repository::DifficultyRange;
use crate::types::{Question, QuestionId, SessionId, StudentId, QUESTIONS_PER_SESSION};

use super::response::ResponseRecord;

/// Lifecycle status of a diagnostic session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, first question not yet served
    NotStarted,
    /// Questions are being served and answered
    InProgress,
    /// All questions answered, profile generated
    Completed,
    /// Ended early, no profile
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One student's run through the diagnostic test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSession {
    id: SessionId,
    student_id: StudentId,
    subject: String,
    status: SessionStatus,
    /// Every served question in order, including the current unanswered one
    questions_served: Vec<QuestionId>,
    current_question_id: Option<QuestionId>,
    /// Served questions per topic
    topic_coverage: BTreeMap<String, usize>,
    current_difficulty_estimate: f64,
    difficulty_range: DifficultyRange,
    responses: Vec<ResponseRecord>,
    abandon_reason: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    last_activity_at: DateTime<Utc>,
}

impl TestSession {
    /// Create a session that has not served anything yet
    pub fn new(
        student_id: StudentId,
        subject: impl Into<String>,
        initial_estimate: f64,
        difficulty_range: DifficultyRange,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            student_id,
            subject: subject.into(),
            status: SessionStatus::NotStarted,
            questions_served: Vec::new(),
            current_question_id: None,
            topic_coverage: BTreeMap::new(),
            current_difficulty_estimate: difficulty_range.clamp(initial_estimate),
            difficulty_range,
            responses: Vec::new(),
            abandon_reason: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            last_activity_at: now,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn questions_served(&self) -> &[QuestionId] {
        &self.questions_served
    }

    pub fn current_question_id(&self) -> Option<&QuestionId> {
        self.current_question_id.as_ref()
    }

    pub fn topic_coverage(&self) -> &BTreeMap<String, usize> {
        &self.topic_coverage
    }

    pub fn current_difficulty_estimate(&self) -> f64 {
        self.current_difficulty_estimate
    }

    pub fn difficulty_range(&self) -> DifficultyRange {
        self.difficulty_range
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    pub fn abandon_reason(&self) -> Option<&str> {
        self.abandon_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub fn correct_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_correct).count()
    }

    /// 1-based position of the next answer
    pub fn next_position(&self) -> usize {
        self.responses.len() + 1
    }

    /// Whether every question of the session has been answered
    pub fn all_answered(&self) -> bool {
        self.responses.len() >= QUESTIONS_PER_SESSION
    }

    /// Serve the first question and move to `InProgress`
    pub fn begin(&mut self, first: &Question, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.expect_status(SessionStatus::NotStarted)?;
        self.status = SessionStatus::InProgress;
        self.started_at = Some(now);
        self.serve(first, now)
    }

    /// Serve the next question. The previous one must have been answered.
    pub fn serve(&mut self, question: &Question, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.expect_status(SessionStatus::InProgress)?;
        if let Some(current) = &self.current_question_id {
            return Err(SessionError::InvalidState {
                expected: "answered current question".to_string(),
                actual: format!("question {current} still open"),
            });
        }
        if self.questions_served.len() >= QUESTIONS_PER_SESSION {
            return Err(SessionError::InvalidState {
                expected: format!("fewer than {QUESTIONS_PER_SESSION} questions served"),
                actual: format!("{} served", self.questions_served.len()),
            });
        }
        if self.questions_served.contains(&question.id) {
            return Err(SessionError::InvalidState {
                expected: "unserved question".to_string(),
                actual: format!("question {} already served", question.id),
            });
        }

        self.questions_served.push(question.id.clone());
        *self.topic_coverage.entry(question.topic.clone()).or_insert(0) += 1;
        self.current_question_id = Some(question.id.clone());
        self.last_activity_at = now;
        Ok(())
    }

    /// Check that `question_id` is the question awaiting an answer
    pub fn ensure_current(&self, question_id: &QuestionId) -> Result<(), SessionError> {
        self.expect_status(SessionStatus::InProgress)?;
        match &self.current_question_id {
            Some(current) if current == question_id => Ok(()),
            Some(current) => Err(SessionError::OutOfOrder {
                expected: current.to_string(),
                actual: question_id.to_string(),
            }),
            None => Err(SessionError::OutOfOrder {
                expected: "no open question".to_string(),
                actual: question_id.to_string(),
            }),
        }
    }

    /// Append the answer to the current question and adopt its estimate
    pub fn record_response(&mut self, record: ResponseRecord) -> Result<(), SessionError> {
        self.ensure_current(&record.question_id)?;
        self.current_difficulty_estimate = record.estimate_after;
        self.last_activity_at = record.answered_at;
        self.current_question_id = None;
        self.responses.push(record);
        Ok(())
    }

    /// Move to `Completed` once every question has been answered
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.expect_status(SessionStatus::InProgress)?;
        if !self.all_answered() {
            return Err(SessionError::InvalidState {
                expected: format!("{QUESTIONS_PER_SESSION} answers"),
                actual: format!("{} answers", self.responses.len()),
            });
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.last_activity_at = now;
        Ok(())
    }

    /// End the session early
    pub fn abandon(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::InvalidState {
                expected: "not_started or in_progress".to_string(),
                actual: self.status.to_string(),
            });
        }
        self.status = SessionStatus::Abandoned;
        self.current_question_id = None;
        self.abandon_reason = Some(reason.into());
        self.completed_at = Some(now);
        self.last_activity_at = now;
        Ok(())
    }

    fn expect_status(&self, expected: SessionStatus) -> Result<(), SessionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected: expected.to_string(),
                actual: self.status.to_string(),
            })
        }
    }
}
