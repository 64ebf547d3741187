//! Shared fixtures for gauge-core integration tests

#![allow(dead_code)]

use std::sync::Arc;

use gauge_core::{
    AnswerSubmission, AssessmentConfig, InMemoryProfileStore, InMemoryQuestionRepository,
    InMemorySessionStore, LearnerProfile, NextStep, ProfileStore, Question, QuestionId,
    QuestionPrompt, SessionManager, StudentId,
};

pub const TOPICS: [&str; 4] = ["grammar", "vocabulary", "reading", "listening"];
pub const CORRECT: &str = "right";

/// English pool: every topic at every level 1..=10, three variants each
pub fn pool() -> Vec<Question> {
    let mut questions = Vec::new();
    for topic in TOPICS {
        for difficulty in 1..=10u8 {
            for variant in 0..3 {
                questions.push(Question {
                    id: QuestionId::new(format!("{topic}-{difficulty:02}-{variant}")),
                    text: format!("{topic} question, level {difficulty}, variant {variant}"),
                    options: vec![CORRECT.into(), "wrong".into(), "other".into()],
                    correct_answer: CORRECT.into(),
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

pub fn manager_with_profiles(profiles: Arc<dyn ProfileStore>) -> SessionManager {
    SessionManager::new(
        AssessmentConfig::default(),
        Arc::new(InMemoryQuestionRepository::new(pool()).expect("valid pool")),
        Arc::new(InMemorySessionStore::new()),
        profiles,
    )
    .expect("valid config")
}

pub fn manager() -> SessionManager {
    manager_with_profiles(Arc::new(InMemoryProfileStore::new()))
}

/// Correct answer given quickly
pub fn fast_correct(prompt: &QuestionPrompt) -> AnswerSubmission {
    AnswerSubmission::new(prompt.question.id.clone(), CORRECT, 5.0)
}

/// Wrong answer given at a moderate pace
pub fn wrong(prompt: &QuestionPrompt) -> AnswerSubmission {
    AnswerSubmission::new(prompt.question.id.clone(), "wrong", 25.0)
}

/// Outcome of a scripted session
pub struct Transcript {
    pub served: Vec<QuestionPrompt>,
    pub profile: LearnerProfile,
}

/// Run a whole session, answering each prompt with `answer`
pub async fn run_session<F>(manager: &SessionManager, student: &str, answer: F) -> Transcript
where
    F: Fn(&QuestionPrompt) -> AnswerSubmission,
{
    let mut prompt = manager
        .start_session(&StudentId::new(student))
        .await
        .expect("session starts");
    let mut served = Vec::new();
    loop {
        let submission = answer(&prompt);
        served.push(prompt.clone());
        let result = manager
            .submit_answer(prompt.session_id, submission)
            .await
            .expect("answer accepted");
        match result.next {
            NextStep::Question(next) => prompt = next,
            NextStep::Completed(profile) => {
                return Transcript {
                    served,
                    profile: *profile,
                };
            }
        }
    }
}
