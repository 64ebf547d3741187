//! Assessment configuration types.
//!
//! Every tunable threshold of the engine lives here: difficulty steps,
//! selection bands, response-time bands, aggregation cutoffs and profile
//! mapping. Components receive their section at construction so tests can
//! override any constant.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::DifficultyTier;

/// Main configuration for the assessment engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Session defaults.
    pub session: SessionConfig,
    /// Difficulty estimate update rule.
    pub difficulty: DifficultyConfig,
    /// Question selection and relaxation.
    pub selection: SelectionConfig,
    /// Response-time bands and cognitive load.
    pub timing: TimingConfig,
    /// Weak-area detection.
    pub aggregation: AggregationConfig,
    /// Learner profile synthesis.
    pub profile: ProfileConfig,
    /// Cross-session anti-repetition history.
    pub history: HistoryConfig,
}

impl AssessmentConfig {
    /// Parse a configuration from TOML, applying defaults for missing keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.difficulty.validate()?;
        self.selection.validate()?;
        self.timing.validate()?;
        self.profile.validate()?;
        if self.session.default_subject.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "session.default_subject must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Session defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Subject used when a session is started without one.
    pub default_subject: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_subject: "english".to_string(),
        }
    }
}

/// Difficulty estimate update rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Lowest difficulty level of the numeric scale.
    pub scale_min: u8,
    /// Highest difficulty level of the numeric scale.
    pub scale_max: u8,
    /// Proportional gain applied to the question/estimate gap.
    pub gain: f64,
    /// Smallest step taken after any answer.
    pub min_step: f64,
    /// Largest step taken after any answer.
    pub max_step: f64,
    /// Correct answers faster than `fast_ratio * expected` count as fluent.
    pub fast_ratio: f64,
    /// Step multiplier for fluent correct answers.
    pub fast_multiplier: f64,
    /// Correct answers slower than `slow_ratio * expected` count as laboured.
    pub slow_ratio: f64,
    /// Step multiplier for laboured correct answers.
    pub slow_multiplier: f64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            scale_min: 1,
            scale_max: 10,
            gain: 0.5,
            min_step: 0.25,
            max_step: 1.5,
            fast_ratio: 1.0,
            fast_multiplier: 1.25,
            slow_ratio: 1.5,
            slow_multiplier: 0.5,
        }
    }
}

impl DifficultyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.scale_min >= self.scale_max {
            return Err(ConfigError::Invalid(format!(
                "difficulty.scale_min ({}) must be below scale_max ({})",
                self.scale_min, self.scale_max
            )));
        }
        if !(self.min_step > 0.0 && self.min_step <= self.max_step) {
            return Err(ConfigError::Invalid(
                "difficulty steps must satisfy 0 < min_step <= max_step".into(),
            ));
        }
        if self.gain <= 0.0 || self.fast_multiplier <= 0.0 || self.slow_multiplier <= 0.0 {
            return Err(ConfigError::Invalid(
                "difficulty gain and multipliers must be positive".into(),
            ));
        }
        if self.fast_ratio >= self.slow_ratio {
            return Err(ConfigError::Invalid(
                "difficulty.fast_ratio must be below slow_ratio".into(),
            ));
        }
        Ok(())
    }

    /// Midpoint of the numeric scale.
    pub fn scale_midpoint(&self) -> f64 {
        (f64::from(self.scale_min) + f64::from(self.scale_max)) / 2.0
    }
}

/// Question selection and relaxation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Half-width of the difficulty band around the target.
    pub band_width: f64,
    /// Amount the band widens on each relaxation step.
    pub band_relaxation_step: f64,
    /// Number of band widenings tried before topic balancing is dropped.
    pub band_relaxation_steps: u32,
    /// Per-topic cap within a session. `None` spreads the session evenly
    /// over the subject's topics.
    pub max_questions_per_topic: Option<usize>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            band_width: 1.0,
            band_relaxation_step: 1.0,
            band_relaxation_steps: 1,
            max_questions_per_topic: None,
        }
    }
}

impl SelectionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.band_width < 0.0 || self.band_relaxation_step <= 0.0 {
            return Err(ConfigError::Invalid(
                "selection band width must be >= 0 and relaxation step > 0".into(),
            ));
        }
        if self.max_questions_per_topic == Some(0) {
            return Err(ConfigError::Invalid(
                "selection.max_questions_per_topic must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Response-time thresholds for one difficulty tier, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingBand {
    pub optimal: f64,
    pub acceptable: f64,
    pub concerning: f64,
}

impl TimingBand {
    pub const fn new(optimal: f64, acceptable: f64, concerning: f64) -> Self {
        Self {
            optimal,
            acceptable,
            concerning,
        }
    }

    fn is_widening(&self) -> bool {
        self.optimal > 0.0 && self.optimal < self.acceptable && self.acceptable < self.concerning
    }
}

/// Response-time bands, tier boundaries and cognitive-load factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Highest difficulty level still considered easy.
    pub easy_max: u8,
    /// Highest difficulty level still considered medium.
    pub medium_max: u8,
    pub easy: TimingBand,
    pub medium: TimingBand,
    pub hard: TimingBand,
    pub easy_factor: f64,
    pub medium_factor: f64,
    pub hard_factor: f64,
    /// Upper bound of the cognitive-load scalar.
    pub max_cognitive_load: f64,
    /// Answers with more corrections than this are corrective.
    pub correction_threshold: u32,
    /// Hesitation markers needed to classify an answer as hesitant.
    pub hesitation_threshold: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            easy_max: 3,
            medium_max: 7,
            easy: TimingBand::new(20.0, 45.0, 90.0),
            medium: TimingBand::new(35.0, 75.0, 120.0),
            hard: TimingBand::new(60.0, 120.0, 180.0),
            easy_factor: 1.0,
            medium_factor: 1.5,
            hard_factor: 2.0,
            max_cognitive_load: 5.0,
            correction_threshold: 2,
            hesitation_threshold: 2,
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.easy_max >= self.medium_max {
            return Err(ConfigError::Invalid(
                "timing.easy_max must be below timing.medium_max".into(),
            ));
        }
        for (tier, band) in [
            (DifficultyTier::Easy, self.easy),
            (DifficultyTier::Medium, self.medium),
            (DifficultyTier::Hard, self.hard),
        ] {
            if !band.is_widening() {
                return Err(ConfigError::Invalid(format!(
                    "timing band for {tier} must satisfy 0 < optimal < acceptable < concerning"
                )));
            }
        }
        if self.max_cognitive_load <= 0.0 {
            return Err(ConfigError::Invalid(
                "timing.max_cognitive_load must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Map a numeric difficulty level onto its tier.
    pub fn tier_for(&self, difficulty: u8) -> DifficultyTier {
        if difficulty <= self.easy_max {
            DifficultyTier::Easy
        } else if difficulty <= self.medium_max {
            DifficultyTier::Medium
        } else {
            DifficultyTier::Hard
        }
    }

    pub fn band(&self, tier: DifficultyTier) -> TimingBand {
        match tier {
            DifficultyTier::Easy => self.easy,
            DifficultyTier::Medium => self.medium,
            DifficultyTier::Hard => self.hard,
        }
    }

    pub fn factor(&self, tier: DifficultyTier) -> f64 {
        match tier {
            DifficultyTier::Easy => self.easy_factor,
            DifficultyTier::Medium => self.medium_factor,
            DifficultyTier::Hard => self.hard_factor,
        }
    }
}

/// Weak-area detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Topics below this success rate are weak.
    pub weak_threshold: f64,
    /// Samples a bucket needs before it can be flagged.
    pub min_samples: usize,
    /// Overall accuracy below this triggers the very-low-score template.
    pub very_low_score: f64,
    /// Accuracy gap between buckets that counts as a skew.
    pub skew_gap: f64,
    /// Cap on generated recommendations.
    pub max_recommendations: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            weak_threshold: 0.7,
            min_samples: 2,
            very_low_score: 0.4,
            skew_gap: 0.3,
            max_recommendations: 5,
        }
    }
}

/// Topic keywords grouped by the learning style they hint at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleGroups {
    pub visual: Vec<String>,
    pub auditory: Vec<String>,
    pub kinesthetic: Vec<String>,
    pub reading_writing: Vec<String>,
}

impl Default for StyleGroups {
    fn default() -> Self {
        fn words(list: &[&str]) -> Vec<String> {
            list.iter().map(|w| (*w).to_string()).collect()
        }

        Self {
            visual: words(&["vocabulary", "recognition", "picture", "image"]),
            auditory: words(&["listening", "pronunciation", "phonetics"]),
            kinesthetic: words(&["speaking", "conversation", "interactive", "practice"]),
            reading_writing: words(&[
                "grammar",
                "structure",
                "syntax",
                "reading",
                "writing",
                "spelling",
            ]),
        }
    }
}

/// Learner profile synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Fewer responses than this yield the conservative default profile.
    pub min_responses: usize,
    /// Raw-score cutoffs for A1, A2, B1 and B2. Must be ascending.
    pub level_cutoffs: [f64; 4],
    /// Final estimate required before the top level is reachable.
    pub top_level_min_estimate: f64,
    /// Topics at or above this success rate are strengths.
    pub strength_threshold: f64,
    /// Hard ceiling of the confidence score.
    pub max_confidence: f64,
    /// Confidence reported for insufficient data.
    pub default_confidence: f64,
    pub score_weight: f64,
    pub sufficiency_weight: f64,
    /// Samples per topic considered fully sufficient.
    pub samples_for_sufficiency: usize,
    /// Accuracy a style group needs to dominate.
    pub style_min_accuracy: f64,
    /// Lead over the runner-up group needed to dominate.
    pub style_margin: f64,
    pub style_groups: StyleGroups,
    /// Cap on recommendations in a profile.
    pub max_recommendations: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            min_responses: 5,
            level_cutoffs: [0.2, 0.4, 0.6, 0.8],
            top_level_min_estimate: 7.0,
            strength_threshold: 0.8,
            max_confidence: 0.95,
            default_confidence: 0.2,
            score_weight: 0.6,
            sufficiency_weight: 0.4,
            samples_for_sufficiency: 3,
            style_min_accuracy: 0.6,
            style_margin: 0.15,
            style_groups: StyleGroups::default(),
            max_recommendations: 6,
        }
    }
}

impl ProfileConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.level_cutoffs.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::Invalid(
                "profile.level_cutoffs must be strictly ascending".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_confidence)
            || self.default_confidence > self.max_confidence
        {
            return Err(ConfigError::Invalid(
                "profile confidence bounds must satisfy default <= max <= 1".into(),
            ));
        }
        if self.samples_for_sufficiency == 0 {
            return Err(ConfigError::Invalid(
                "profile.samples_for_sufficiency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Cross-session anti-repetition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Served questions remembered per student.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 60 }
    }
}
