//! gauge-core: Adaptive diagnostic assessment engine
//!
//! This crate runs fixed-length diagnostic tests and turns them into learner
//! profiles:
//!
//! - **Question selection** - [`QuestionSelector`] picks each next question
//!   around the running difficulty estimate, balancing topics and avoiding
//!   repetition
//! - **Difficulty estimate** - [`DifficultyAdapter`] moves the estimate after
//!   every answer
//! - **Response patterns** - [`PatternAnalyzer`] classifies each answer from
//!   timing and corrections
//! - **Sessions** - [`SessionManager`] drives the [`TestSession`] state machine
//!   against injected stores
//! - **Profiles** - [`ProfileGenerator`] synthesizes a [`LearnerProfile`] from
//!   a completed session
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gauge_core::{
//!     AnswerSubmission, AssessmentConfig, InMemoryProfileStore, InMemoryQuestionRepository,
//!     InMemorySessionStore, NextStep, SessionManager, StudentId,
//! };
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AssessmentConfig::default();
//!     let pool = InMemoryQuestionRepository::load_json("pool.json".as_ref(), &config.difficulty).await?;
//!     let manager = SessionManager::new(
//!         config,
//!         Arc::new(pool),
//!         Arc::new(InMemorySessionStore::new()),
//!         Arc::new(InMemoryProfileStore::new()),
//!     )?;
//!
//!     let mut prompt = manager.start_session(&StudentId::new("student-1")).await?;
//!     loop {
//!         let answer = AnswerSubmission::new(prompt.question.id.clone(), "my answer", 12.0);
//!         match manager.submit_answer(prompt.session_id, answer).await?.next {
//!             NextStep::Question(next) => prompt = next,
//!             NextStep::Completed(profile) => {
//!                 println!("Level: {}", profile.proficiency_level);
//!                 break;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────── SessionManager ─────────────────────────┐
//! │  QuestionSelector ── QuestionRepository, AntiRepetitionTracker   │
//! │  DifficultyAdapter   PatternAnalyzer   ProfileGenerator          │
//! │                                          └── ErrorAggregator     │
//! └────────────── SessionStore ──────────── ProfileStore ────────────┘
//! ```

pub mod aggregate;
pub mod anti_repetition;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod pattern;
pub mod profile;
pub mod repository;
pub mod selector;
pub mod session;
pub mod store;
pub mod types;

// Re-export key types for convenience
pub use aggregate::{BucketStats, ErrorAggregator, ErrorReport, WeakTopic};
pub use anti_repetition::AntiRepetitionTracker;
pub use config::{
    AggregationConfig, AssessmentConfig, DifficultyConfig, HistoryConfig, ProfileConfig,
    SelectionConfig, SessionConfig, StyleGroups, TimingBand, TimingConfig,
};
pub use difficulty::{AnswerOutcome, DifficultyAdapter};
pub use error::{ConfigError, GaugeError, SessionError, StoreError};
pub use pattern::{Classification, PatternAnalyzer, PatternSummary, ResponsePattern};
pub use profile::{LearnerProfile, LearningStyle, ProficiencyLevel, ProfileGenerator};
pub use repository::{
    DifficultyRange, DifficultyStats, InMemoryQuestionRepository, QuestionRepository,
};
pub use selector::{QuestionSelector, Relaxation, Selection, SelectionRequest};
pub use session::{
    AnswerSubmission, NextStep, QuestionPrompt, ResponseRecord, SessionManager, SessionStatus,
    SessionSummary, SubmitResult, TestSession,
};
pub use store::{
    InMemoryProfileStore, InMemorySessionStore, JsonProfileStore, ProfileStore, SessionStore,
};
pub use types::{
    DifficultyTier, Question, QuestionId, SessionId, StudentId, QUESTIONS_PER_SESSION,
};
