//! Error aggregation over a session's answers.
//!
//! Groups answers by topic, subject and difficulty tier, flags weak topics and
//! turns the skews it finds into a short list of recommendations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AggregationConfig;
use crate::pattern::ResponsePattern;
use crate::session::ResponseRecord;
use crate::types::DifficultyTier;

/// Correct/total counts for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub total: usize,
    pub correct: usize,
}

impl BucketStats {
    fn record(&mut self, is_correct: bool) {
        self.total += 1;
        if is_correct {
            self.correct += 1;
        }
    }

    /// Share of correct answers; 0.0 for an empty bucket.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// A topic whose success rate fell below the weak threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakTopic {
    pub topic: String,
    pub success_rate: f64,
    pub samples: usize,
}

/// Aggregated view of a set of answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub total: usize,
    pub error_count: usize,
    pub accuracy: f64,
    pub by_topic: BTreeMap<String, BucketStats>,
    pub by_subject: BTreeMap<String, BucketStats>,
    pub by_tier: BTreeMap<DifficultyTier, BucketStats>,
    /// Incorrect answers per behavioral pattern.
    pub errors_by_pattern: BTreeMap<ResponsePattern, usize>,
    /// Weak topics, weakest first.
    pub weak_topics: Vec<WeakTopic>,
    pub recommendations: Vec<String>,
}

/// Builds [`ErrorReport`]s.
#[derive(Debug, Clone)]
pub struct ErrorAggregator {
    config: AggregationConfig,
}

impl ErrorAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn aggregate(&self, records: &[ResponseRecord]) -> ErrorReport {
        let mut report = ErrorReport {
            total: records.len(),
            ..ErrorReport::default()
        };

        for record in records {
            report
                .by_topic
                .entry(record.topic.clone())
                .or_default()
                .record(record.is_correct);
            report
                .by_subject
                .entry(record.subject.clone())
                .or_default()
                .record(record.is_correct);
            report
                .by_tier
                .entry(record.tier)
                .or_default()
                .record(record.is_correct);
            if !record.is_correct {
                report.error_count += 1;
                *report.errors_by_pattern.entry(record.pattern).or_insert(0) += 1;
            }
        }

        report.accuracy = if report.total == 0 {
            0.0
        } else {
            (report.total - report.error_count) as f64 / report.total as f64
        };
        report.weak_topics = self.weak_topics(&report.by_topic);
        report.recommendations = self.recommendations(&report);

        debug!(
            total = report.total,
            errors = report.error_count,
            weak_topics = report.weak_topics.len(),
            "Aggregated responses"
        );
        report
    }

    fn weak_topics(&self, by_topic: &BTreeMap<String, BucketStats>) -> Vec<WeakTopic> {
        let mut weak: Vec<WeakTopic> = by_topic
            .iter()
            .filter(|(_, stats)| {
                stats.total >= self.config.min_samples
                    && stats.success_rate() < self.config.weak_threshold
            })
            .map(|(topic, stats)| WeakTopic {
                topic: topic.clone(),
                success_rate: stats.success_rate(),
                samples: stats.total,
            })
            .collect();

        weak.sort_by(|a, b| {
            a.success_rate
                .total_cmp(&b.success_rate)
                .then_with(|| b.samples.cmp(&a.samples))
                .then_with(|| a.topic.cmp(&b.topic))
        });
        weak
    }

    fn recommendations(&self, report: &ErrorReport) -> Vec<String> {
        let mut out = Vec::new();

        if report.total > 0 && report.accuracy < self.config.very_low_score {
            out.push(format!(
                "Revisit the fundamentals of the subject before moving on; overall accuracy was {}%.",
                percent(report.accuracy)
            ));
        }

        if let Some(recommendation) = self.difficulty_skew(&report.by_tier) {
            out.push(recommendation);
        }

        if let Some(recommendation) = self.subject_skew(&report.by_subject) {
            out.push(recommendation);
        }

        for weak in &report.weak_topics {
            out.push(format!(
                "Practice {}: {}% correct over {} questions.",
                weak.topic,
                percent(weak.success_rate),
                weak.samples
            ));
        }

        out.truncate(self.config.max_recommendations);
        out
    }

    fn sampled(&self, stats: Option<&BucketStats>) -> Option<f64> {
        stats
            .filter(|s| s.total >= self.config.min_samples)
            .map(BucketStats::success_rate)
    }

    fn difficulty_skew(&self, by_tier: &BTreeMap<DifficultyTier, BucketStats>) -> Option<String> {
        let easy = self.sampled(by_tier.get(&DifficultyTier::Easy))?;
        let hard = self.sampled(by_tier.get(&DifficultyTier::Hard))?;

        if easy - hard >= self.config.skew_gap {
            Some(
                "Consolidate intermediate material before attempting harder questions."
                    .to_string(),
            )
        } else if hard - easy >= self.config.skew_gap {
            Some("Slow down on easier questions; careless mistakes cost more than hard ones.".to_string())
        } else {
            None
        }
    }

    fn subject_skew(&self, by_subject: &BTreeMap<String, BucketStats>) -> Option<String> {
        let rated: Vec<(&String, f64)> = by_subject
            .iter()
            .filter_map(|(subject, stats)| self.sampled(Some(stats)).map(|rate| (subject, rate)))
            .collect();

        let best = rated.iter().max_by(|a, b| a.1.total_cmp(&b.1))?;
        let worst = rated.iter().min_by(|a, b| a.1.total_cmp(&b.1))?;

        (best.1 - worst.1 >= self.config.skew_gap).then(|| {
            format!(
                "Shift practice time toward {}; it trails {} by {} points.",
                worst.0,
                best.0,
                percent(best.1 - worst.1)
            )
        })
    }
}

impl Default for ErrorAggregator {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}

fn percent(rate: f64) -> u32 {
    (rate * 100.0).round() as u32
}
