//! Next-question selection.
//!
//! Candidates come from the repository within a difficulty band around the
//! current estimate. Questions already served in the session are always
//! excluded. Questions the student saw in recent sessions and topics that have
//! used up their per-session quota are excluded too, until the relaxation
//! ladder gives them up:
//!
//! 1. strict: base band, topic quota, recent-history exclusion
//! 2. the band widens, `band_relaxation_steps` times
//! 3. topic balancing is dropped
//! 4. recent-history exclusion is dropped
//!
//! When even the last step finds nothing the pool is exhausted.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::anti_repetition::AntiRepetitionTracker;
use crate::config::SelectionConfig;
use crate::error::SessionError;
use crate::repository::{DifficultyRange, QuestionRepository};
use crate::types::{Question, QuestionId, StudentId, QUESTIONS_PER_SESSION};

/// How far the constraints had to be relaxed to find a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "level", content = "steps")]
pub enum Relaxation {
    Strict,
    /// Band widened this many times.
    WidenedBand(u32),
    TopicBalanceDropped,
    RecentHistoryDropped,
}

impl fmt::Display for Relaxation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relaxation::Strict => f.write_str("strict"),
            Relaxation::WidenedBand(n) => write!(f, "widened band x{n}"),
            Relaxation::TopicBalanceDropped => f.write_str("topic balance dropped"),
            Relaxation::RecentHistoryDropped => f.write_str("recent history dropped"),
        }
    }
}

/// Everything the selector needs to know about the session.
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    pub student_id: &'a StudentId,
    pub subject: &'a str,
    /// Current difficulty estimate
    pub target: f64,
    /// Questions already served in this session
    pub served: &'a [QuestionId],
    /// Served questions per topic in this session
    pub topic_coverage: &'a BTreeMap<String, usize>,
}

/// Selected question with the diagnostics of how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub question: Question,
    pub relaxation: Relaxation,
    /// Candidates that survived filtering at the final relaxation level
    pub candidates: usize,
}

#[derive(Debug, Clone, Copy)]
struct Attempt {
    relaxation: Relaxation,
    half_width: f64,
    balance_topics: bool,
    exclude_recent: bool,
}

pub struct QuestionSelector {
    repository: Arc<dyn QuestionRepository>,
    tracker: Arc<AntiRepetitionTracker>,
    config: SelectionConfig,
}

impl QuestionSelector {
    pub fn new(
        repository: Arc<dyn QuestionRepository>,
        tracker: Arc<AntiRepetitionTracker>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            repository,
            tracker,
            config,
        }
    }

    /// Choose the next question. Does not record anything; the caller serves
    /// the question and updates the tracker.
    pub async fn select_next(
        &self,
        request: &SelectionRequest<'_>,
    ) -> Result<Selection, SessionError> {
        let topics = self.repository.topics(request.subject).await?;
        let quota = self.topic_quota(topics.len());
        let allowed_topics: BTreeSet<String> = topics
            .into_iter()
            .filter(|t| request.topic_coverage.get(t).copied().unwrap_or(0) < quota)
            .collect();

        let hard: HashSet<QuestionId> = request.served.iter().cloned().collect();
        let recent = self.tracker.recent_ids(request.student_id).await;

        for attempt in self.ladder() {
            let range = DifficultyRange::around(request.target, attempt.half_width);
            let topic_filter = attempt.balance_topics.then_some(&allowed_topics);

            let mut candidates = self
                .repository
                .find_candidates(request.subject, range, topic_filter, &hard)
                .await?;
            if attempt.exclude_recent {
                candidates.retain(|q| !recent.contains(&q.id));
            }
            if candidates.is_empty() {
                continue;
            }

            if attempt.relaxation != Relaxation::Strict {
                warn!(
                    student_id = %request.student_id,
                    subject = request.subject,
                    relaxation = %attempt.relaxation,
                    "Selection constraints relaxed"
                );
            }

            let count = candidates.len();
            let Some(question) = self.best(candidates, request).await else {
                continue;
            };
            debug!(
                student_id = %request.student_id,
                question_id = %question.id,
                difficulty = question.difficulty,
                target = request.target,
                candidates = count,
                "Selected question"
            );
            return Ok(Selection {
                question,
                relaxation: attempt.relaxation,
                candidates: count,
            });
        }

        warn!(
            student_id = %request.student_id,
            subject = request.subject,
            served = request.served.len(),
            "Question pool exhausted"
        );
        Err(SessionError::QuestionPoolExhausted {
            subject: request.subject.to_string(),
            served: request.served.len(),
        })
    }

    /// Per-topic cap: configured, or the session spread evenly over topics.
    pub fn topic_quota(&self, topic_count: usize) -> usize {
        self.config
            .max_questions_per_topic
            .unwrap_or_else(|| QUESTIONS_PER_SESSION.div_ceil(topic_count.max(1)))
    }

    fn ladder(&self) -> Vec<Attempt> {
        let mut attempts = vec![Attempt {
            relaxation: Relaxation::Strict,
            half_width: self.config.band_width,
            balance_topics: true,
            exclude_recent: true,
        }];
        for step in 1..=self.config.band_relaxation_steps {
            attempts.push(Attempt {
                relaxation: Relaxation::WidenedBand(step),
                half_width: self.config.band_width
                    + f64::from(step) * self.config.band_relaxation_step,
                balance_topics: true,
                exclude_recent: true,
            });
        }
        let widest = self.config.band_width
            + f64::from(self.config.band_relaxation_steps) * self.config.band_relaxation_step;
        attempts.push(Attempt {
            relaxation: Relaxation::TopicBalanceDropped,
            half_width: widest,
            balance_topics: false,
            exclude_recent: true,
        });
        attempts.push(Attempt {
            relaxation: Relaxation::RecentHistoryDropped,
            half_width: widest,
            balance_topics: false,
            exclude_recent: false,
        });
        attempts
    }

    /// Pick the best candidate: uncovered topic, fewer topic uses, farthest
    /// difficulty from the target within the band, least recently used
    /// anywhere, then id.
    async fn best(
        &self,
        candidates: Vec<Question>,
        request: &SelectionRequest<'_>,
    ) -> Option<Question> {
        let ids: Vec<QuestionId> = candidates.iter().map(|q| q.id.clone()).collect();
        let last_used = self.tracker.last_used(&ids).await;

        candidates
            .into_iter()
            .min_by(|a, b| compare(a, b, request, &last_used))
    }
}

fn compare(
    a: &Question,
    b: &Question,
    request: &SelectionRequest<'_>,
    last_used: &HashMap<QuestionId, u64>,
) -> Ordering {
    let uses = |q: &Question| request.topic_coverage.get(&q.topic).copied().unwrap_or(0);
    let distance = |q: &Question| (f64::from(q.difficulty) - request.target).abs();
    let tick = |q: &Question| last_used.get(&q.id).copied().unwrap_or(0);

    (uses(a) > 0)
        .cmp(&(uses(b) > 0))
        .then_with(|| uses(a).cmp(&uses(b)))
        .then_with(|| distance(b).total_cmp(&distance(a)))
        .then_with(|| tick(a).cmp(&tick(b)))
        .then_with(|| a.id.cmp(&b.id))
}
