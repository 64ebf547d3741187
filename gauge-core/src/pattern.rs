//! Behavioral classification of single answers.
//!
//! Each answer is classified from its response time (against the widening
//! optimal/acceptable/concerning bands of its difficulty tier), its
//! correctness and how often the student changed the answer before
//! submitting. The analyzer is a pure function of its inputs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{TimingBand, TimingConfig};
use crate::types::DifficultyTier;

/// Behavioral pattern of one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePattern {
    /// Fast and correct.
    Confident,
    /// Within the expected time, no strong signal either way.
    Analytical,
    /// Slow but correct.
    Thorough,
    /// Repeated hesitation markers from client telemetry.
    Hesitant,
    /// Very fast and wrong.
    Impulsive,
    /// Beyond the concerning threshold.
    Struggling,
    /// Answer changed more than the correction threshold.
    Corrective,
}

impl ResponsePattern {
    pub const ALL: [ResponsePattern; 7] = [
        ResponsePattern::Confident,
        ResponsePattern::Analytical,
        ResponsePattern::Thorough,
        ResponsePattern::Hesitant,
        ResponsePattern::Impulsive,
        ResponsePattern::Struggling,
        ResponsePattern::Corrective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponsePattern::Confident => "confident",
            ResponsePattern::Analytical => "analytical",
            ResponsePattern::Thorough => "thorough",
            ResponsePattern::Hesitant => "hesitant",
            ResponsePattern::Impulsive => "impulsive",
            ResponsePattern::Struggling => "struggling",
            ResponsePattern::Corrective => "corrective",
        }
    }
}

impl fmt::Display for ResponsePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub pattern: ResponsePattern,
    pub cognitive_load: f64,
}

/// Classifies answers into behavioral patterns.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    config: TimingConfig,
}

impl PatternAnalyzer {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    pub fn band(&self, tier: DifficultyTier) -> TimingBand {
        self.config.band(tier)
    }

    /// Classify an answer without hesitation telemetry.
    pub fn classify(
        &self,
        response_time: f64,
        tier: DifficultyTier,
        correction_count: u32,
        is_correct: bool,
    ) -> Classification {
        self.classify_with_hesitation(response_time, tier, correction_count, None, is_correct)
    }

    /// Classify an answer. `hesitations` is `None` when the client does not
    /// report hesitation markers, in which case `Hesitant` is never produced.
    pub fn classify_with_hesitation(
        &self,
        response_time: f64,
        tier: DifficultyTier,
        correction_count: u32,
        hesitations: Option<u32>,
        is_correct: bool,
    ) -> Classification {
        let time = sanitize(response_time);
        let band = self.config.band(tier);

        let pattern = if correction_count > self.config.correction_threshold {
            ResponsePattern::Corrective
        } else if hesitations.is_some_and(|h| h >= self.config.hesitation_threshold) {
            ResponsePattern::Hesitant
        } else if time < band.optimal / 2.0 && is_correct {
            ResponsePattern::Confident
        } else if time > band.concerning {
            ResponsePattern::Struggling
        } else if time > band.acceptable && is_correct {
            ResponsePattern::Thorough
        } else if time < band.optimal / 3.0 && !is_correct {
            ResponsePattern::Impulsive
        } else {
            ResponsePattern::Analytical
        };

        Classification {
            pattern,
            cognitive_load: self.cognitive_load(time, tier),
        }
    }

    /// Effort estimate from response time relative to the optimal time,
    /// weighted by difficulty and capped.
    pub fn cognitive_load(&self, response_time: f64, tier: DifficultyTier) -> f64 {
        let time = sanitize(response_time);
        let optimal = self.config.band(tier).optimal;
        let factor = self.config.factor(tier);

        let load = if time <= optimal {
            factor * (time / optimal)
        } else {
            factor * (1.0 + (time - optimal) / optimal)
        };
        load.min(self.config.max_cognitive_load)
    }
}

impl Default for PatternAnalyzer {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}

fn sanitize(response_time: f64) -> f64 {
    if response_time.is_finite() {
        response_time.max(0.0)
    } else {
        0.0
    }
}

/// Pattern statistics over a set of answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub distribution: BTreeMap<ResponsePattern, usize>,
    pub average_cognitive_load: f64,
}

impl PatternSummary {
    pub fn from_classifications<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Classification>,
    {
        let mut distribution = BTreeMap::new();
        let mut total_load = 0.0;
        let mut count = 0usize;
        for item in items {
            *distribution.entry(item.pattern).or_insert(0) += 1;
            total_load += item.cognitive_load;
            count += 1;
        }
        let average_cognitive_load = if count == 0 {
            0.0
        } else {
            total_load / count as f64
        };
        Self {
            distribution,
            average_cognitive_load,
        }
    }

    /// Most frequent pattern; ties resolve to the earlier variant.
    pub fn dominant(&self) -> Option<ResponsePattern> {
        self.distribution
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(pattern, _)| *pattern)
    }

    pub fn count(&self, pattern: ResponsePattern) -> usize {
        self.distribution.get(&pattern).copied().unwrap_or(0)
    }
}
