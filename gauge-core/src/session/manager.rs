//! SessionManager orchestrating diagnostic sessions
//!
//! Each public operation loads the session from the store, applies one
//! transition of the state machine and saves it once, so a partially applied
//! answer is never visible. A completed session is saved before its profile.
//! Starts are serialized per student; overlapping requests against one session
//! are rejected with `Conflict`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::anti_repetition::AntiRepetitionTracker;
use crate::config::AssessmentConfig;
use crate::difficulty::{AnswerOutcome, DifficultyAdapter};
use crate::error::{ConfigError, SessionError};
use crate::pattern::PatternAnalyzer;
use crate::profile::{LearnerProfile, ProfileGenerator};
use crate::repository::QuestionRepository;
use crate::selector::{QuestionSelector, SelectionRequest};
use crate::store::{ProfileStore, SessionStore};
use crate::types::{Question, QuestionId, SessionId, StudentId, QUESTIONS_PER_SESSION};

use super::response::{AnswerSubmission, ResponseRecord};
use super::state::{SessionStatus, TestSession};

/// A question handed to the student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPrompt {
    pub session_id: SessionId,
    /// 1-based position within the session
    pub position: usize,
    pub total: usize,
    pub question: Question,
}

/// What follows an accepted answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum NextStep {
    Question(QuestionPrompt),
    Completed(Box<LearnerProfile>),
}

/// Result of `submit_answer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub record: ResponseRecord,
    pub next: NextStep,
}

/// Read-only view of a session's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub subject: String,
    pub status: SessionStatus,
    pub answered: usize,
    pub served: usize,
    pub total: usize,
    pub correct: usize,
    pub current_question_id: Option<QuestionId>,
    pub current_difficulty_estimate: f64,
    pub abandon_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

impl From<&TestSession> for SessionSummary {
    fn from(session: &TestSession) -> Self {
        Self {
            session_id: session.id(),
            student_id: session.student_id().clone(),
            subject: session.subject().to_string(),
            status: session.status(),
            answered: session.responses().len(),
            served: session.questions_served().len(),
            total: QUESTIONS_PER_SESSION,
            correct: session.correct_count(),
            current_question_id: session.current_question_id().cloned(),
            current_difficulty_estimate: session.current_difficulty_estimate(),
            abandon_reason: session.abandon_reason().map(str::to_string),
            started_at: session.started_at(),
            completed_at: session.completed_at(),
            last_activity_at: session.last_activity_at(),
        }
    }
}

/// Marks a session as busy until dropped
struct InFlight<'a> {
    set: &'a StdMutex<HashSet<SessionId>>,
    id: SessionId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Holds a student's start lock. The map entry is dropped with the last holder.
struct StudentSlot<'a> {
    locks: &'a StdMutex<HashMap<StudentId, Arc<Mutex<()>>>>,
    student_id: StudentId,
    lock: Arc<Mutex<()>>,
}

impl Drop for StudentSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here
        if locks
            .get(&self.student_id)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2)
        {
            locks.remove(&self.student_id);
        }
    }
}

/// Runs diagnostic sessions against injected stores
pub struct SessionManager {
    config: AssessmentConfig,
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn SessionStore>,
    profiles: Arc<dyn ProfileStore>,
    tracker: Arc<AntiRepetitionTracker>,
    selector: QuestionSelector,
    adapter: DifficultyAdapter,
    analyzer: PatternAnalyzer,
    generator: ProfileGenerator,
    /// Per-student locks serializing session starts
    student_locks: StdMutex<HashMap<StudentId, Arc<Mutex<()>>>>,
    /// Sessions with a request currently being applied
    in_flight: StdMutex<HashSet<SessionId>>,
}

impl SessionManager {
    /// Create a manager, validating the configuration
    pub fn new(
        config: AssessmentConfig,
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn SessionStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Result<Self, ConfigError> {
        let tracker = Arc::new(AntiRepetitionTracker::new(&config.history));
        Self::with_tracker(config, questions, sessions, profiles, tracker)
    }

    /// Create a manager sharing an existing anti-repetition tracker
    pub fn with_tracker(
        config: AssessmentConfig,
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn SessionStore>,
        profiles: Arc<dyn ProfileStore>,
        tracker: Arc<AntiRepetitionTracker>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            selector: QuestionSelector::new(
                questions.clone(),
                tracker.clone(),
                config.selection.clone(),
            ),
            adapter: DifficultyAdapter::new(config.difficulty.clone()),
            analyzer: PatternAnalyzer::new(config.timing.clone()),
            generator: ProfileGenerator::new(config.profile.clone(), config.aggregation.clone()),
            config,
            questions,
            sessions,
            profiles,
            tracker,
            student_locks: StdMutex::new(HashMap::new()),
            in_flight: StdMutex::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    // ==================== Lifecycle ====================

    /// Start a session in the default subject
    pub async fn start_session(&self, student_id: &StudentId) -> Result<QuestionPrompt, SessionError> {
        let subject = self.config.session.default_subject.clone();
        self.start_session_for_subject(student_id, &subject).await
    }

    /// Start a session and serve its first question
    pub async fn start_session_for_subject(
        &self,
        student_id: &StudentId,
        subject: &str,
    ) -> Result<QuestionPrompt, SessionError> {
        let slot = self.student_slot(student_id);
        let _guard = slot.lock.lock().await;

        if let Some(active) = self.sessions.find_active(student_id).await? {
            return Err(SessionError::SessionAlreadyActive {
                student_id: student_id.to_string(),
                session_id: active.id().to_string(),
            });
        }

        let stats = self.questions.difficulty_stats(subject).await?;
        let estimate = self.adapter.initial_estimate(stats.as_ref());
        let range = self.adapter.range_for(stats.as_ref());
        let now = Utc::now();
        let mut session = TestSession::new(student_id.clone(), subject, estimate, range, now);

        let question = self.select_or_abandon(&mut session).await?;
        session.begin(&question, now)?;
        self.sessions.save(&session).await?;
        self.tracker.record_served(student_id, &question).await;

        info!(
            session_id = %session.id(),
            student_id = %student_id,
            subject,
            initial_estimate = estimate,
            "Diagnostic session started"
        );
        Ok(prompt(&session, question))
    }

    /// Score an answer and either serve the next question or finish the session
    pub async fn submit_answer(
        &self,
        session_id: SessionId,
        submission: AnswerSubmission,
    ) -> Result<SubmitResult, SessionError> {
        let _flight = self.begin_request(session_id)?;
        let mut session = self.load(session_id).await?;
        session.ensure_current(&submission.question_id)?;
        submission.validate()?;

        let question = self
            .questions
            .get(&submission.question_id)
            .await?
            .ok_or_else(|| SessionError::QuestionNotFound(submission.question_id.to_string()))?;

        let now = Utc::now();
        let record = self.score(&session, &question, &submission, now);
        debug!(
            session_id = %session_id,
            position = record.position,
            correct = record.is_correct,
            pattern = %record.pattern,
            estimate = record.estimate_after,
            "Answer recorded"
        );
        session.record_response(record.clone())?;

        if session.all_answered() {
            session.complete(now)?;
            let profile = self.generator.generate_at(&session, now);
            self.sessions.save(&session).await?;
            self.profiles.save_profile(&profile).await?;

            info!(
                session_id = %session_id,
                student_id = %session.student_id(),
                correct = session.correct_count(),
                level = %profile.proficiency_level,
                "Diagnostic session completed"
            );
            return Ok(SubmitResult {
                record,
                next: NextStep::Completed(Box::new(profile)),
            });
        }

        let question = self.select_or_abandon(&mut session).await?;
        session.serve(&question, now)?;
        self.sessions.save(&session).await?;
        self.tracker
            .record_served(session.student_id(), &question)
            .await;

        Ok(SubmitResult {
            record,
            next: NextStep::Question(prompt(&session, question)),
        })
    }

    /// End an in-progress session without a profile
    pub async fn abandon_session(
        &self,
        session_id: SessionId,
        reason: &str,
    ) -> Result<SessionSummary, SessionError> {
        let _flight = self.begin_request(session_id)?;
        let mut session = self.load(session_id).await?;
        if session.status() != SessionStatus::InProgress {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::InProgress.to_string(),
                actual: session.status().to_string(),
            });
        }

        session.abandon(reason, Utc::now())?;
        self.sessions.save(&session).await?;

        info!(
            session_id = %session_id,
            student_id = %session.student_id(),
            reason,
            "Diagnostic session abandoned"
        );
        Ok(SessionSummary::from(&session))
    }

    // ==================== Inspection ====================

    pub async fn get_session_status(
        &self,
        session_id: SessionId,
    ) -> Result<SessionSummary, SessionError> {
        let session = self.load(session_id).await?;
        Ok(SessionSummary::from(&session))
    }

    /// Answers recorded so far, in order
    pub async fn session_responses(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ResponseRecord>, SessionError> {
        let session = self.load(session_id).await?;
        Ok(session.responses().to_vec())
    }

    /// Rebuild and store the profile of a completed session. The stored
    /// profile is replaced, never duplicated.
    pub async fn regenerate_profile(
        &self,
        session_id: SessionId,
    ) -> Result<LearnerProfile, SessionError> {
        let session = self.load(session_id).await?;
        if session.status() != SessionStatus::Completed {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::Completed.to_string(),
                actual: session.status().to_string(),
            });
        }

        let profile = self.generator.generate(&session);
        self.profiles.save_profile(&profile).await?;
        info!(session_id = %session_id, "Profile regenerated");
        Ok(profile)
    }

    /// Profile from the answers so far, without storing it. Too few answers
    /// give the default profile with `insufficient_data` set.
    pub async fn preview_profile(
        &self,
        session_id: SessionId,
    ) -> Result<LearnerProfile, SessionError> {
        let session = self.load(session_id).await?;
        Ok(self.generator.generate(&session))
    }

    pub async fn latest_profile(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<LearnerProfile>, SessionError> {
        Ok(self.profiles.get_latest_profile(student_id).await?)
    }

    // ==================== Idle sessions ====================

    /// In-progress sessions with no activity since `cutoff`
    pub async fn idle_sessions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SessionId>, SessionError> {
        Ok(self
            .sessions
            .list_in_progress()
            .await?
            .iter()
            .filter(|s| s.last_activity_at() < cutoff)
            .map(TestSession::id)
            .collect())
    }

    /// Abandon every idle session. Sessions busy with a request are skipped.
    pub async fn abandon_idle(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<SessionId>, SessionError> {
        let mut abandoned = Vec::new();
        for session_id in self.idle_sessions(cutoff).await? {
            let Ok(_flight) = self.begin_request(session_id) else {
                continue;
            };
            let mut session = self.load(session_id).await?;
            // Re-check under the in-flight mark
            if session.status() != SessionStatus::InProgress || session.last_activity_at() >= cutoff
            {
                continue;
            }
            session.abandon(reason, Utc::now())?;
            self.sessions.save(&session).await?;
            abandoned.push(session_id);
        }

        if !abandoned.is_empty() {
            warn!(count = abandoned.len(), reason, "Idle sessions abandoned");
        }
        Ok(abandoned)
    }

    // ==================== Internals ====================

    fn student_slot(&self, student_id: &StudentId) -> StudentSlot<'_> {
        let lock = self
            .student_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(student_id.clone())
            .or_default()
            .clone();
        StudentSlot {
            locks: &self.student_locks,
            student_id: student_id.clone(),
            lock,
        }
    }

    fn begin_request(&self, session_id: SessionId) -> Result<InFlight<'_>, SessionError> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(session_id) {
            return Err(SessionError::Conflict(session_id.to_string()));
        }
        Ok(InFlight {
            set: &self.in_flight,
            id: session_id,
        })
    }

    async fn load(&self, session_id: SessionId) -> Result<TestSession, SessionError> {
        self.sessions
            .load(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Select the next question. On exhaustion the session is abandoned and
    /// saved before the error is returned.
    async fn select_or_abandon(&self, session: &mut TestSession) -> Result<Question, SessionError> {
        let request = SelectionRequest {
            student_id: session.student_id(),
            subject: session.subject(),
            target: session.current_difficulty_estimate(),
            served: session.questions_served(),
            topic_coverage: session.topic_coverage(),
        };

        match self.selector.select_next(&request).await {
            Ok(selection) => Ok(selection.question),
            Err(err @ SessionError::QuestionPoolExhausted { .. }) => {
                session.abandon(err.to_string(), Utc::now())?;
                self.sessions.save(session).await?;
                warn!(
                    session_id = %session.id(),
                    student_id = %session.student_id(),
                    "Session abandoned: question pool exhausted"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn score(
        &self,
        session: &TestSession,
        question: &Question,
        submission: &AnswerSubmission,
        now: DateTime<Utc>,
    ) -> ResponseRecord {
        let is_correct = question.is_correct(&submission.answer);
        let tier = self.config.timing.tier_for(question.difficulty);
        let classification = self.analyzer.classify_with_hesitation(
            submission.response_time_seconds,
            tier,
            submission.correction_count,
            submission.hesitation_count,
            is_correct,
        );

        let estimate_before = session.current_difficulty_estimate();
        let outcome = AnswerOutcome {
            is_correct,
            response_time_seconds: submission.response_time_seconds,
            question_difficulty: question.difficulty,
            expected_time_seconds: question.expected_time(),
        };
        let estimate_after = self
            .adapter
            .update(estimate_before, &outcome, session.difficulty_range());

        ResponseRecord {
            session_id: session.id(),
            question_id: question.id.clone(),
            position: session.next_position(),
            submitted_answer: submission.answer.clone(),
            is_correct,
            response_time_seconds: submission.response_time_seconds,
            correction_count: submission.correction_count,
            hesitation_count: submission.hesitation_count.unwrap_or(0),
            pattern: classification.pattern,
            cognitive_load: classification.cognitive_load,
            topic: question.topic.clone(),
            subject: question.subject.clone(),
            difficulty: question.difficulty,
            tier,
            estimate_before,
            estimate_after,
            answered_at: now,
        }
    }
}

fn prompt(session: &TestSession, question: Question) -> QuestionPrompt {
    QuestionPrompt {
        session_id: session.id(),
        position: session.questions_served().len(),
        total: QUESTIONS_PER_SESSION,
        question,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::StoreError;
    use crate::pattern::ResponsePattern;
    use crate::repository::InMemoryQuestionRepository;
    use crate::store::{InMemoryProfileStore, InMemorySessionStore};

    /// Session store whose `fail_on`-th save (1-based) fails
    struct FlakySessionStore {
        inner: InMemorySessionStore,
        saves: AtomicUsize,
        fail_on: usize,
    }

    impl FlakySessionStore {
        fn failing_on(fail_on: usize) -> Self {
            Self {
                inner: InMemorySessionStore::new(),
                saves: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl SessionStore for FlakySessionStore {
        async fn load(&self, id: SessionId) -> Result<Option<TestSession>, StoreError> {
            self.inner.load(id).await
        }

        async fn save(&self, session: &TestSession) -> Result<(), StoreError> {
            if self.saves.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(StoreError::InvalidData("disk full".into()));
            }
            self.inner.save(session).await
        }

        async fn find_active(
            &self,
            student_id: &StudentId,
        ) -> Result<Option<TestSession>, StoreError> {
            self.inner.find_active(student_id).await
        }

        async fn list_in_progress(&self) -> Result<Vec<TestSession>, StoreError> {
            self.inner.list_in_progress().await
        }
    }

    fn manager_with_sessions(sessions: Arc<dyn SessionStore>) -> SessionManager {
        SessionManager::new(
            AssessmentConfig::default(),
            Arc::new(InMemoryQuestionRepository::new(pool(2)).unwrap()),
            sessions,
            Arc::new(InMemoryProfileStore::new()),
        )
        .unwrap()
    }

    const TOPICS: [&str; 4] = ["grammar", "vocabulary", "reading", "listening"];

    fn pool(per_level: usize) -> Vec<Question> {
        let mut questions = Vec::new();
        for topic in TOPICS {
            for difficulty in 1..=10u8 {
                for n in 0..per_level {
                    questions.push(Question {
                        id: QuestionId::new(format!("{topic}-{difficulty}-{n}")),
                        text: format!("{topic} question at level {difficulty}"),
                        options: vec!["right".into(), "wrong".into()],
                        correct_answer: "right".into(),
                        difficulty,
                        topic: topic.into(),
                        subject: "english".into(),
                        estimated_time_seconds: 30,
                    });
                }
            }
        }
        questions
    }

    fn manager_with(questions: Vec<Question>) -> SessionManager {
        SessionManager::new(
            AssessmentConfig::default(),
            Arc::new(InMemoryQuestionRepository::new(questions).unwrap()),
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryProfileStore::new()),
        )
        .unwrap()
    }

    fn manager() -> SessionManager {
        manager_with(pool(2))
    }

    fn correct(prompt: &QuestionPrompt) -> AnswerSubmission {
        AnswerSubmission::new(prompt.question.id.clone(), "right", 5.0)
    }

    /// Answer every question correctly and return the profile
    async fn run_to_completion(manager: &SessionManager, first: QuestionPrompt) -> LearnerProfile {
        let mut prompt = first;
        loop {
            let result = manager
                .submit_answer(prompt.session_id, correct(&prompt))
                .await
                .unwrap();
            match result.next {
                NextStep::Question(next) => prompt = next,
                NextStep::Completed(profile) => return *profile,
            }
        }
    }

    // ==================== Start Tests ====================

    #[tokio::test]
    async fn start_serves_first_question() {
        let manager = manager();
        let student = StudentId::new("alice");

        let prompt = manager.start_session(&student).await.unwrap();

        assert_eq!(prompt.position, 1);
        assert_eq!(prompt.total, QUESTIONS_PER_SESSION);
        let summary = manager.get_session_status(prompt.session_id).await.unwrap();
        assert_eq!(summary.status, SessionStatus::InProgress);
        assert_eq!(summary.served, 1);
        assert_eq!(summary.current_question_id, Some(prompt.question.id));
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_active() {
        let manager = manager();
        let student = StudentId::new("alice");
        let first = manager.start_session(&student).await.unwrap();

        let err = manager.start_session(&student).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionAlreadyActive { .. }));

        manager
            .abandon_session(first.session_id, "restart")
            .await
            .unwrap();
        assert!(manager.start_session(&student).await.is_ok());
    }

    #[tokio::test]
    async fn start_in_empty_subject_is_exhausted() {
        let manager = manager();
        let err = manager
            .start_session_for_subject(&StudentId::new("alice"), "history")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::QuestionPoolExhausted { served: 0, .. }));
    }

    // ==================== Submit Tests ====================

    #[tokio::test]
    async fn answer_advances_to_next_question() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();

        let result = manager
            .submit_answer(prompt.session_id, correct(&prompt))
            .await
            .unwrap();

        assert!(result.record.is_correct);
        assert_eq!(result.record.position, 1);
        assert_eq!(result.record.pattern, ResponsePattern::Confident);
        assert!(result.record.estimate_after > result.record.estimate_before);
        let NextStep::Question(next) = result.next else {
            panic!("expected another question");
        };
        assert_eq!(next.position, 2);
        assert_ne!(next.question.id, prompt.question.id);
    }

    #[tokio::test]
    async fn full_session_completes_with_profile() {
        let manager = manager();
        let student = StudentId::new("alice");
        let prompt = manager.start_session(&student).await.unwrap();
        let session_id = prompt.session_id;

        let profile = run_to_completion(&manager, prompt).await;

        let summary = manager.get_session_status(session_id).await.unwrap();
        assert_eq!(summary.status, SessionStatus::Completed);
        assert_eq!(summary.answered, QUESTIONS_PER_SESSION);
        assert_eq!(summary.served, QUESTIONS_PER_SESSION);
        assert_eq!(profile.session_id, session_id);

        let latest = manager.latest_profile(&student).await.unwrap().unwrap();
        assert_eq!(latest, profile);
    }

    #[tokio::test]
    async fn answering_a_completed_session_is_invalid() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();
        let session_id = prompt.session_id;
        let last_question = prompt.question.id.clone();
        run_to_completion(&manager, prompt).await;

        let err = manager
            .submit_answer(session_id, AnswerSubmission::new(last_question, "right", 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn out_of_order_answer_leaves_session_unchanged() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();
        let before = manager.get_session_status(prompt.session_id).await.unwrap();

        let err = manager
            .submit_answer(
                prompt.session_id,
                AnswerSubmission::new("grammar-1-0-not-served", "right", 5.0),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::OutOfOrder { .. }));
        let after = manager.get_session_status(prompt.session_id).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let manager = manager();
        let err = manager
            .submit_answer(SessionId::new(), AnswerSubmission::new("q", "a", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));

        // The session lookup comes before the submission checks
        let err = manager
            .submit_answer(SessionId::new(), AnswerSubmission::new("q", "a", -1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_response_time_is_rejected_without_change() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();
        let before = manager.get_session_status(prompt.session_id).await.unwrap();

        let err = manager
            .submit_answer(
                prompt.session_id,
                AnswerSubmission::new(prompt.question.id.clone(), "right", f64::NAN),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::InvalidSubmission(_)));
        let after = manager.get_session_status(prompt.session_id).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn overlapping_request_conflicts() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();

        let _busy = manager.begin_request(prompt.session_id).unwrap();
        let err = manager
            .submit_answer(prompt.session_id, correct(&prompt))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Conflict(_)));
    }

    #[tokio::test]
    async fn in_flight_mark_is_released_after_request() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();

        // A failed request must release the mark too
        let _ = manager
            .submit_answer(prompt.session_id, AnswerSubmission::new("other", "x", 1.0))
            .await;

        assert!(manager.begin_request(prompt.session_id).is_ok());
    }

    #[tokio::test]
    async fn small_pool_abandons_session_on_exhaustion() {
        let questions: Vec<Question> = pool(1).into_iter().take(5).collect();
        let manager = manager_with(questions);
        let mut prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();
        let session_id = prompt.session_id;

        let err = loop {
            match manager.submit_answer(session_id, correct(&prompt)).await {
                Ok(SubmitResult {
                    next: NextStep::Question(next),
                    ..
                }) => prompt = next,
                Ok(_) => panic!("session cannot complete with five questions"),
                Err(err) => break err,
            }
        };

        assert!(matches!(err, SessionError::QuestionPoolExhausted { .. }));
        let summary = manager.get_session_status(session_id).await.unwrap();
        assert_eq!(summary.status, SessionStatus::Abandoned);
        assert!(summary.abandon_reason.unwrap().contains("exhausted"));
        let responses = manager.session_responses(session_id).await.unwrap();
        assert!(!responses.is_empty());
        assert!(responses.len() < 5);
        assert_eq!(summary.answered, responses.len());
    }

    // ==================== Abandon Tests ====================

    #[tokio::test]
    async fn abandon_requires_in_progress() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();

        let summary = manager
            .abandon_session(prompt.session_id, "closed tab")
            .await
            .unwrap();
        assert_eq!(summary.status, SessionStatus::Abandoned);
        assert_eq!(summary.abandon_reason.as_deref(), Some("closed tab"));

        let err = manager
            .abandon_session(prompt.session_id, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert!(
            manager
                .latest_profile(&StudentId::new("alice"))
                .await
                .unwrap()
                .is_none()
        );
    }

    // ==================== Profile Tests ====================

    #[tokio::test]
    async fn regenerate_replaces_stored_profile() {
        let manager = manager();
        let student = StudentId::new("alice");
        let prompt = manager.start_session(&student).await.unwrap();
        let session_id = prompt.session_id;
        let original = run_to_completion(&manager, prompt).await;

        let regenerated = manager.regenerate_profile(session_id).await.unwrap();

        assert!(original.same_assessment(&regenerated));
        let latest = manager.latest_profile(&student).await.unwrap().unwrap();
        assert_eq!(latest.generated_at, regenerated.generated_at);
    }

    #[tokio::test]
    async fn regenerate_requires_completed_session() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();

        let err = manager.regenerate_profile(prompt.session_id).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn preview_with_few_answers_is_default_profile() {
        let manager = manager();
        let mut prompt = manager.start_session(&StudentId::new("alice")).await.unwrap();
        let session_id = prompt.session_id;

        let early = manager.preview_profile(session_id).await.unwrap();
        assert!(early.insufficient_data);
        assert_eq!(early.session_id, session_id);
        assert!(
            manager
                .latest_profile(&StudentId::new("alice"))
                .await
                .unwrap()
                .is_none()
        );

        for _ in 0..5 {
            let result = manager
                .submit_answer(session_id, correct(&prompt))
                .await
                .unwrap();
            if let NextStep::Question(next) = result.next {
                prompt = next;
            }
        }
        let preview = manager.preview_profile(session_id).await.unwrap();
        assert!(!preview.insufficient_data);
    }

    // ==================== Store Failure Tests ====================

    #[tokio::test]
    async fn failed_completion_save_stores_no_profile() {
        // Save 1 is the start, saves 2..=20 follow answers 1..=19
        let sessions = Arc::new(FlakySessionStore::failing_on(21));
        let manager = manager_with_sessions(sessions.clone());
        let student = StudentId::new("alice");
        let mut prompt = manager.start_session(&student).await.unwrap();
        let session_id = prompt.session_id;

        let err = loop {
            match manager.submit_answer(session_id, correct(&prompt)).await {
                Ok(SubmitResult {
                    next: NextStep::Question(next),
                    ..
                }) => prompt = next,
                Ok(_) => panic!("completion save should have failed"),
                Err(err) => break err,
            }
        };

        assert!(matches!(err, SessionError::Store(_)));
        let summary = manager.get_session_status(session_id).await.unwrap();
        assert_eq!(summary.status, SessionStatus::InProgress);
        assert_eq!(summary.answered, QUESTIONS_PER_SESSION - 1);
        assert!(manager.latest_profile(&student).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_save_leaves_question_out_of_history() {
        let sessions = Arc::new(FlakySessionStore::failing_on(1));
        let manager = manager_with_sessions(sessions);
        let student = StudentId::new("alice");

        let err = manager.start_session(&student).await.unwrap_err();

        assert!(matches!(err, SessionError::Store(_)));
        assert!(manager.tracker.recent_ids(&student).await.is_empty());

        // The next attempt saves normally
        let prompt = manager.start_session(&student).await.unwrap();
        let recent = manager.tracker.recent_ids(&student).await;
        assert_eq!(recent.len(), 1);
        assert!(recent.contains(&prompt.question.id));
    }

    // ==================== Lock Tests ====================

    fn student_lock_count(manager: &SessionManager) -> usize {
        manager
            .student_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[tokio::test]
    async fn student_locks_are_released_after_start() {
        let manager = manager();

        for n in 0..50 {
            let student = StudentId::new(format!("student-{n}"));
            let prompt = manager.start_session(&student).await.unwrap();
            manager
                .abandon_session(prompt.session_id, "done")
                .await
                .unwrap();
        }
        assert_eq!(student_lock_count(&manager), 0);

        // Rejected starts release the lock too
        let student = StudentId::new("alice");
        manager.start_session(&student).await.unwrap();
        assert!(manager.start_session(&student).await.is_err());
        assert_eq!(student_lock_count(&manager), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_starts_release_student_lock() {
        let manager = Arc::new(manager());
        let student = StudentId::new("alice");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let student = student.clone();
                tokio::spawn(async move { manager.start_session(&student).await.is_ok() })
            })
            .collect();
        let mut started = 0;
        for handle in handles {
            if handle.await.unwrap() {
                started += 1;
            }
        }

        assert_eq!(started, 1);
        assert_eq!(student_lock_count(&manager), 0);
    }

    // ==================== Idle Tests ====================

    #[tokio::test]
    async fn idle_sessions_are_found_and_abandoned() {
        let manager = manager();
        let a = manager.start_session(&StudentId::new("a")).await.unwrap();
        let b = manager.start_session(&StudentId::new("b")).await.unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(manager.idle_sessions(past).await.unwrap().is_empty());

        let future = Utc::now() + chrono::Duration::seconds(1);
        let mut idle = manager.idle_sessions(future).await.unwrap();
        idle.sort();
        let mut expected = vec![a.session_id, b.session_id];
        expected.sort();
        assert_eq!(idle, expected);

        let abandoned = manager.abandon_idle(future, "idle timeout").await.unwrap();
        assert_eq!(abandoned.len(), 2);
        let summary = manager.get_session_status(a.session_id).await.unwrap();
        assert_eq!(summary.status, SessionStatus::Abandoned);
        assert!(manager.idle_sessions(future).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn busy_sessions_are_skipped_by_idle_reaper() {
        let manager = manager();
        let prompt = manager.start_session(&StudentId::new("a")).await.unwrap();
        let _busy = manager.begin_request(prompt.session_id).unwrap();

        let future = Utc::now() + chrono::Duration::seconds(1);
        let abandoned = manager.abandon_idle(future, "idle").await.unwrap();
        assert!(abandoned.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = AssessmentConfig::default();
        config.profile.level_cutoffs = [0.9, 0.4, 0.6, 0.8];

        let result = SessionManager::new(
            config,
            Arc::new(InMemoryQuestionRepository::default()),
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryProfileStore::new()),
        );
        assert!(result.is_err());
    }
}
