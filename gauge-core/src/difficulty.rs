//! Running ability/difficulty estimate.
//!
//! A deliberately simple analogue of item-response-theory ability estimation:
//! the estimate moves toward the difficulty of the question just answered,
//! up on correct answers and down on incorrect ones, with the step scaled by
//! how fluently the answer came. Deterministic for identical input sequences.

use tracing::trace;

use crate::config::DifficultyConfig;
use crate::repository::{DifficultyRange, DifficultyStats};

/// What happened on one answered question, as far as the estimate cares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub response_time_seconds: f64,
    pub question_difficulty: u8,
    /// Expected answer time for the question.
    pub expected_time_seconds: f64,
}

/// Maintains the scalar difficulty estimate.
#[derive(Debug, Clone)]
pub struct DifficultyAdapter {
    config: DifficultyConfig,
}

impl DifficultyAdapter {
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    /// Starting estimate for a subject: the median difficulty of its pool.
    /// Falls back to the scale midpoint for an empty pool.
    pub fn initial_estimate(&self, stats: Option<&DifficultyStats>) -> f64 {
        stats.map_or_else(|| self.config.scale_midpoint(), |s| s.median)
    }

    /// Valid estimate range for a pool, falling back to the full scale.
    pub fn range_for(&self, stats: Option<&DifficultyStats>) -> DifficultyRange {
        stats.map_or_else(
            || {
                DifficultyRange::new(
                    f64::from(self.config.scale_min),
                    f64::from(self.config.scale_max),
                )
            },
            DifficultyStats::range,
        )
    }

    /// Next estimate after an answer, clamped to `range`.
    pub fn update(&self, estimate: f64, outcome: &AnswerOutcome, range: DifficultyRange) -> f64 {
        let question = f64::from(outcome.question_difficulty);
        let gap = if outcome.is_correct {
            question - estimate
        } else {
            estimate - question
        };
        let base = (self.config.gain * gap).clamp(self.config.min_step, self.config.max_step);
        let step = base * self.time_factor(outcome);

        let next = if outcome.is_correct {
            estimate + step
        } else {
            estimate - step
        };
        let clamped = range.clamp(next);

        trace!(
            estimate,
            question,
            correct = outcome.is_correct,
            step,
            next = clamped,
            "Difficulty estimate updated"
        );
        clamped
    }

    /// Step multiplier from response time. Only correct answers are
    /// modulated: fluent ones signal mastery, laboured ones guessing or fatigue.
    fn time_factor(&self, outcome: &AnswerOutcome) -> f64 {
        if !outcome.is_correct || outcome.expected_time_seconds <= 0.0 {
            return 1.0;
        }
        let ratio = outcome.response_time_seconds / outcome.expected_time_seconds;
        if ratio < self.config.fast_ratio {
            self.config.fast_multiplier
        } else if ratio > self.config.slow_ratio {
            self.config.slow_multiplier
        } else {
            1.0
        }
    }
}

impl Default for DifficultyAdapter {
    fn default() -> Self {
        Self::new(DifficultyConfig::default())
    }
}
