//! Read-only access to the tagged question pool.
//!
//! The engine only ever reads questions. [`QuestionRepository`] is the seam a
//! database-backed pool plugs into; [`InMemoryQuestionRepository`] serves
//! tests and pools loaded from JSON files.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::config::DifficultyConfig;
use crate::error::StoreError;
use crate::types::{Question, QuestionId};

/// Inclusive range on the numeric difficulty scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyRange {
    pub min: f64,
    pub max: f64,
}

impl DifficultyRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Band of half-width `width` around `center`.
    pub fn around(center: f64, width: f64) -> Self {
        Self {
            min: center - width,
            max: center + width,
        }
    }

    pub fn contains(&self, difficulty: u8) -> bool {
        let d = f64::from(difficulty);
        d >= self.min && d <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Difficulty distribution of a subject's pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyStats {
    pub min: u8,
    pub max: u8,
    pub median: f64,
    pub count: usize,
}

impl DifficultyStats {
    /// Compute stats from a list of difficulty levels. `None` when empty.
    pub fn from_levels(mut levels: Vec<u8>) -> Option<Self> {
        if levels.is_empty() {
            return None;
        }
        levels.sort_unstable();
        let count = levels.len();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (f64::from(levels[mid - 1]) + f64::from(levels[mid])) / 2.0
        } else {
            f64::from(levels[mid])
        };
        Some(Self {
            min: levels[0],
            max: levels[count - 1],
            median,
            count,
        })
    }

    pub fn range(&self) -> DifficultyRange {
        DifficultyRange::new(f64::from(self.min), f64::from(self.max))
    }
}

/// Read-only question pool
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Questions of `subject` within `difficulty`, restricted to `topics` when
    /// given, never returning an id from `exclude_ids`.
    async fn find_candidates(
        &self,
        subject: &str,
        difficulty: DifficultyRange,
        topics: Option<&BTreeSet<String>>,
        exclude_ids: &HashSet<QuestionId>,
    ) -> Result<Vec<Question>, StoreError>;

    /// Retrieve a question by ID
    async fn get(&self, id: &QuestionId) -> Result<Option<Question>, StoreError>;

    /// Difficulty distribution of a subject, `None` when it has no questions
    async fn difficulty_stats(&self, subject: &str) -> Result<Option<DifficultyStats>, StoreError>;

    /// Distinct topics of a subject, sorted
    async fn topics(&self, subject: &str) -> Result<Vec<String>, StoreError>;
}

/// In-memory question pool.
#[derive(Debug, Default)]
pub struct InMemoryQuestionRepository {
    questions: Vec<Question>,
    index: HashMap<QuestionId, usize>,
}

impl InMemoryQuestionRepository {
    /// Build a pool on the default 1..=10 scale, rejecting duplicate ids
    /// and malformed entries.
    pub fn new(questions: Vec<Question>) -> Result<Self, StoreError> {
        Self::with_scale(questions, &DifficultyConfig::default())
    }

    /// Build a pool whose difficulties must lie on the configured scale.
    pub fn with_scale(questions: Vec<Question>, scale: &DifficultyConfig) -> Result<Self, StoreError> {
        let mut index = HashMap::with_capacity(questions.len());
        for (pos, question) in questions.iter().enumerate() {
            validate_question(question, scale)?;
            if index.insert(question.id.clone(), pos).is_some() {
                return Err(StoreError::InvalidData(format!(
                    "duplicate question id: {}",
                    question.id
                )));
            }
        }
        Ok(Self { questions, index })
    }

    /// Load a pool from a JSON array of questions.
    pub async fn load_json(path: &Path, scale: &DifficultyConfig) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).await?;
        let questions: Vec<Question> = serde_json::from_str(&content)?;
        debug!(path = %path.display(), count = questions.len(), "Loaded question pool");
        Self::with_scale(questions, scale)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Distinct subjects in the pool, sorted
    pub fn subjects(&self) -> Vec<String> {
        self.questions
            .iter()
            .map(|q| q.subject.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    fn by_subject<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a Question> + 'a {
        self.questions.iter().filter(move |q| q.subject == subject)
    }
}

fn validate_question(question: &Question, scale: &DifficultyConfig) -> Result<(), StoreError> {
    if question.id.as_str().is_empty() {
        return Err(StoreError::InvalidData("question id must not be empty".into()));
    }
    if !(scale.scale_min..=scale.scale_max).contains(&question.difficulty) {
        return Err(StoreError::InvalidData(format!(
            "question {} has difficulty {} outside {}..={}",
            question.id, question.difficulty, scale.scale_min, scale.scale_max
        )));
    }
    if question.estimated_time_seconds == 0 {
        return Err(StoreError::InvalidData(format!(
            "question {} has no estimated time",
            question.id
        )));
    }
    if !question.options.is_empty() && !question.options.iter().any(|o| question.is_correct(o)) {
        return Err(StoreError::InvalidData(format!(
            "question {} lists options without its correct answer",
            question.id
        )));
    }
    Ok(())
}

#[async_trait]
impl QuestionRepository for InMemoryQuestionRepository {
    async fn find_candidates(
        &self,
        subject: &str,
        difficulty: DifficultyRange,
        topics: Option<&BTreeSet<String>>,
        exclude_ids: &HashSet<QuestionId>,
    ) -> Result<Vec<Question>, StoreError> {
        Ok(self
            .by_subject(subject)
            .filter(|q| difficulty.contains(q.difficulty))
            .filter(|q| topics.is_none_or(|allowed| allowed.contains(&q.topic)))
            .filter(|q| !exclude_ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &QuestionId) -> Result<Option<Question>, StoreError> {
        Ok(self.index.get(id).map(|&pos| self.questions[pos].clone()))
    }

    async fn difficulty_stats(&self, subject: &str) -> Result<Option<DifficultyStats>, StoreError> {
        Ok(DifficultyStats::from_levels(
            self.by_subject(subject).map(|q| q.difficulty).collect(),
        ))
    }

    async fn topics(&self, subject: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .by_subject(subject)
            .map(|q| q.topic.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }
}
