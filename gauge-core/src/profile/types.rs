//! Learner profile types

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pattern::ResponsePattern;
use crate::types::{SessionId, StudentId};

/// Proficiency band, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProficiencyLevel {
    A0,
    A1,
    A2,
    B1,
    B2,
}

impl ProficiencyLevel {
    /// Map a raw score onto a level using ascending cutoffs for A1, A2, B1, B2.
    pub fn from_score(raw_score: f64, cutoffs: &[f64; 4]) -> Self {
        const ABOVE_A0: [ProficiencyLevel; 4] = [
            ProficiencyLevel::A1,
            ProficiencyLevel::A2,
            ProficiencyLevel::B1,
            ProficiencyLevel::B2,
        ];
        cutoffs
            .iter()
            .zip(ABOVE_A0)
            .filter(|(cutoff, _)| raw_score >= **cutoff)
            .map(|(_, level)| level)
            .last()
            .unwrap_or(ProficiencyLevel::A0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProficiencyLevel::A0 => "A0",
            ProficiencyLevel::A1 => "A1",
            ProficiencyLevel::A2 => "A2",
            ProficiencyLevel::B1 => "B1",
            ProficiencyLevel::B2 => "B2",
        }
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Learning-style hint derived from per-topic-group accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    ReadingWriting,
    Mixed,
}

impl LearningStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Auditory => "auditory",
            LearningStyle::Kinesthetic => "kinesthetic",
            LearningStyle::ReadingWriting => "reading_writing",
            LearningStyle::Mixed => "mixed",
        }
    }
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile synthesized from a completed diagnostic session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub student_id: StudentId,
    pub session_id: SessionId,
    pub proficiency_level: ProficiencyLevel,
    pub learning_style: LearningStyle,
    pub strengths: BTreeSet<String>,
    pub weaknesses: BTreeSet<String>,
    pub confidence_score: f64,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,

    // Evidence
    #[serde(default)]
    pub raw_score: Option<f64>,
    #[serde(default)]
    pub final_difficulty_estimate: Option<f64>,
    #[serde(default)]
    pub pattern_distribution: BTreeMap<ResponsePattern, usize>,
    #[serde(default)]
    pub average_cognitive_load: Option<f64>,
    #[serde(default)]
    pub insufficient_data: bool,
}

impl LearnerProfile {
    /// Compare everything except `generated_at`.
    pub fn same_assessment(&self, other: &LearnerProfile) -> bool {
        let mut other = other.clone();
        other.generated_at = self.generated_at;
        *self == other
    }
}
