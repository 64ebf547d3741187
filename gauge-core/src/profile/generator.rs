//! Learner profile synthesis
//!
//! A profile is a pure function of the session's responses and the
//! configuration; only `generated_at` changes between regenerations.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::aggregate::{BucketStats, ErrorAggregator, ErrorReport};
use crate::config::{AggregationConfig, ProfileConfig};
use crate::pattern::{Classification, PatternSummary, ResponsePattern};
use crate::session::{ResponseRecord, TestSession};
use crate::types::{DifficultyTier, QUESTIONS_PER_SESSION};

use super::types::{LearnerProfile, LearningStyle, ProficiencyLevel};

/// Answers of one pattern needed before the profile comments on it
const PATTERN_RECOMMENDATION_MIN: usize = 3;

/// Builds [`LearnerProfile`]s from sessions.
#[derive(Debug, Clone)]
pub struct ProfileGenerator {
    config: ProfileConfig,
    aggregator: ErrorAggregator,
    min_samples: usize,
}

impl ProfileGenerator {
    pub fn new(config: ProfileConfig, aggregation: AggregationConfig) -> Self {
        let min_samples = aggregation.min_samples;
        Self {
            config,
            aggregator: ErrorAggregator::new(aggregation),
            min_samples,
        }
    }

    pub fn generate(&self, session: &TestSession) -> LearnerProfile {
        self.generate_at(session, Utc::now())
    }

    pub fn generate_at(&self, session: &TestSession, now: DateTime<Utc>) -> LearnerProfile {
        let records = session.responses();
        if records.len() < self.config.min_responses {
            warn!(
                session_id = %session.id(),
                responses = records.len(),
                required = self.config.min_responses,
                "Insufficient data for profile, using default"
            );
            return self.default_profile(session, now);
        }

        let report = self.aggregator.aggregate(records);
        let raw_score = raw_score(records);
        let final_estimate = session.current_difficulty_estimate();

        let score_level = ProficiencyLevel::from_score(raw_score, &self.config.level_cutoffs);
        let proficiency_level = score_level.min(self.exposure_cap(&report, final_estimate));
        let learning_style = self.learning_style(records);
        let strengths = self.strengths(&report.by_topic);
        let weaknesses: BTreeSet<String> =
            report.weak_topics.iter().map(|w| w.topic.clone()).collect();
        let confidence_score = self.confidence(raw_score, &report.by_topic);
        let patterns = pattern_summary(records);
        let recommendations =
            self.recommendations(proficiency_level, session.subject(), &report, &patterns);
        let average_cognitive_load = Some(patterns.average_cognitive_load);

        info!(
            session_id = %session.id(),
            student_id = %session.student_id(),
            level = %proficiency_level,
            style = %learning_style,
            confidence = confidence_score,
            "Profile generated"
        );

        LearnerProfile {
            student_id: session.student_id().clone(),
            session_id: session.id(),
            proficiency_level,
            learning_style,
            strengths,
            weaknesses,
            confidence_score,
            recommendations,
            generated_at: now,
            raw_score: Some(raw_score),
            final_difficulty_estimate: Some(final_estimate),
            pattern_distribution: patterns.distribution,
            average_cognitive_load,
            insufficient_data: false,
        }
    }

    fn default_profile(&self, session: &TestSession, now: DateTime<Utc>) -> LearnerProfile {
        let records = session.responses();
        let patterns = pattern_summary(records);
        let answered = !records.is_empty();

        LearnerProfile {
            student_id: session.student_id().clone(),
            session_id: session.id(),
            proficiency_level: ProficiencyLevel::A0,
            learning_style: LearningStyle::Mixed,
            strengths: BTreeSet::new(),
            weaknesses: BTreeSet::new(),
            confidence_score: self.config.default_confidence,
            recommendations: vec![
                "Complete a full diagnostic session to get a reliable profile.".to_string(),
            ],
            generated_at: now,
            raw_score: answered.then(|| raw_score(records)),
            final_difficulty_estimate: answered.then(|| session.current_difficulty_estimate()),
            average_cognitive_load: answered.then_some(patterns.average_cognitive_load),
            pattern_distribution: patterns.distribution,
            insufficient_data: true,
        }
    }

    /// Highest level the difficulty of the answered items can support.
    fn exposure_cap(&self, report: &ErrorReport, final_estimate: f64) -> ProficiencyLevel {
        let seen = |tier: DifficultyTier| {
            report.by_tier.get(&tier).is_some_and(|s| s.total > 0)
        };

        if !seen(DifficultyTier::Medium) && !seen(DifficultyTier::Hard) {
            ProficiencyLevel::A2
        } else if !seen(DifficultyTier::Hard)
            || final_estimate < self.config.top_level_min_estimate
        {
            ProficiencyLevel::B1
        } else {
            ProficiencyLevel::B2
        }
    }

    fn learning_style(&self, records: &[ResponseRecord]) -> LearningStyle {
        let groups = &self.config.style_groups;
        let candidates = [
            (LearningStyle::Visual, &groups.visual),
            (LearningStyle::Auditory, &groups.auditory),
            (LearningStyle::Kinesthetic, &groups.kinesthetic),
            (LearningStyle::ReadingWriting, &groups.reading_writing),
        ];

        let mut rated: Vec<(LearningStyle, f64)> = candidates
            .iter()
            .filter_map(|(style, keywords)| {
                let mut stats = BucketStats::default();
                for record in records.iter().filter(|r| matches_any(&r.topic, keywords)) {
                    stats.total += 1;
                    if record.is_correct {
                        stats.correct += 1;
                    }
                }
                (stats.total > 0).then(|| (*style, stats.success_rate()))
            })
            .collect();
        // Stable sort keeps declaration order among equal accuracies
        rated.sort_by(|a, b| b.1.total_cmp(&a.1));

        match rated.as_slice() {
            [] => LearningStyle::Mixed,
            [(style, best)] if *best >= self.config.style_min_accuracy => *style,
            [(style, best), (_, second), ..]
                if *best >= self.config.style_min_accuracy
                    && best - second >= self.config.style_margin =>
            {
                *style
            }
            _ => LearningStyle::Mixed,
        }
    }

    fn strengths(&self, by_topic: &BTreeMap<String, BucketStats>) -> BTreeSet<String> {
        by_topic
            .iter()
            .filter(|(_, s)| {
                s.total >= self.min_samples && s.success_rate() >= self.config.strength_threshold
            })
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    fn confidence(&self, raw_score: f64, by_topic: &BTreeMap<String, BucketStats>) -> f64 {
        let sufficiency = if by_topic.is_empty() {
            0.0
        } else {
            let target = self.config.samples_for_sufficiency as f64;
            by_topic
                .values()
                .map(|s| (s.total as f64 / target).min(1.0))
                .sum::<f64>()
                / by_topic.len() as f64
        };
        let confidence =
            self.config.score_weight * raw_score + self.config.sufficiency_weight * sufficiency;
        confidence.clamp(0.0, self.config.max_confidence)
    }

    fn recommendations(
        &self,
        level: ProficiencyLevel,
        subject: &str,
        report: &ErrorReport,
        patterns: &PatternSummary,
    ) -> Vec<String> {
        let mut out = vec![level_recommendation(level, subject)];

        if patterns.count(ResponsePattern::Impulsive) >= PATTERN_RECOMMENDATION_MIN {
            out.push(
                "Read each question to the end before answering; several quick answers were wrong."
                    .to_string(),
            );
        }
        if patterns.count(ResponsePattern::Struggling) >= PATTERN_RECOMMENDATION_MIN {
            out.push("Practice under a gentle time limit to build fluency.".to_string());
        }

        out.extend(report.recommendations.iter().cloned());
        out.truncate(self.config.max_recommendations);
        out
    }
}

impl Default for ProfileGenerator {
    fn default() -> Self {
        Self::new(ProfileConfig::default(), AggregationConfig::default())
    }
}

fn raw_score(records: &[ResponseRecord]) -> f64 {
    let correct = records.iter().filter(|r| r.is_correct).count();
    correct as f64 / QUESTIONS_PER_SESSION as f64
}

fn pattern_summary(records: &[ResponseRecord]) -> PatternSummary {
    PatternSummary::from_classifications(records.iter().map(|r| Classification {
        pattern: r.pattern,
        cognitive_load: r.cognitive_load,
    }))
}

fn matches_any(topic: &str, keywords: &[String]) -> bool {
    let topic = topic.to_lowercase();
    keywords.iter().any(|k| topic.contains(&k.to_lowercase()))
}

fn level_recommendation(level: ProficiencyLevel, subject: &str) -> String {
    match level {
        ProficiencyLevel::A0 => {
            format!("Start with foundational {subject} material and build up step by step.")
        }
        ProficiencyLevel::A1 => {
            format!("Strengthen the basics of {subject} with short, regular practice.")
        }
        ProficiencyLevel::A2 => {
            format!("Move on to intermediate {subject} exercises once the basics feel easy.")
        }
        ProficiencyLevel::B1 => {
            format!("Consolidate intermediate {subject} skills and start on harder material.")
        }
        ProficiencyLevel::B2 => {
            format!("Keep challenging yourself with advanced {subject} material.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingConfig;
    use crate::repository::DifficultyRange;
    use crate::types::{Question, QuestionId, StudentId};

    struct Answer {
        topic: &'static str,
        difficulty: u8,
        correct: bool,
        pattern: ResponsePattern,
    }

    fn answer(topic: &'static str, difficulty: u8, correct: bool) -> Answer {
        Answer {
            topic,
            difficulty,
            correct,
            pattern: if correct {
                ResponsePattern::Confident
            } else {
                ResponsePattern::Analytical
            },
        }
    }

    /// Build a session that went through the given answers.
    fn session_with(answers: &[Answer], final_estimate: f64) -> TestSession {
        let timing = TimingConfig::default();
        let now = Utc::now();
        let mut session = TestSession::new(
            StudentId::new("alice"),
            "english",
            5.0,
            DifficultyRange::new(1.0, 10.0),
            now,
        );
        for (i, a) in answers.iter().enumerate() {
            let id = QuestionId::new(format!("q{i}"));
            let question = Question {
                id: id.clone(),
                text: String::new(),
                options: vec![],
                correct_answer: "a".into(),
                difficulty: a.difficulty,
                topic: a.topic.into(),
                subject: "english".into(),
                estimated_time_seconds: 30,
            };
            if i == 0 {
                session.begin(&question, now).unwrap();
            } else {
                session.serve(&question, now).unwrap();
            }
            let last = i + 1 == answers.len();
            session
                .record_response(ResponseRecord {
                    session_id: session.id(),
                    question_id: id,
                    position: i + 1,
                    submitted_answer: "a".into(),
                    is_correct: a.correct,
                    response_time_seconds: 10.0,
                    correction_count: 0,
                    hesitation_count: 0,
                    pattern: a.pattern,
                    cognitive_load: 1.0,
                    topic: a.topic.into(),
                    subject: "english".into(),
                    difficulty: a.difficulty,
                    tier: timing.tier_for(a.difficulty),
                    estimate_before: 5.0,
                    estimate_after: if last { final_estimate } else { 5.0 },
                    answered_at: now,
                })
                .unwrap();
        }
        session
    }

    fn twenty(correct: usize, difficulty: u8) -> Vec<Answer> {
        let topics = ["grammar", "vocabulary", "reading", "listening"];
        (0..QUESTIONS_PER_SESSION)
            .map(|i| answer(topics[i % topics.len()], difficulty, i < correct))
            .collect()
    }

    #[test]
    fn fewer_than_minimum_responses_yields_default_profile() {
        let session = session_with(&twenty(4, 5)[..4], 5.0);
        let profile = ProfileGenerator::default().generate(&session);

        assert!(profile.insufficient_data);
        assert_eq!(profile.proficiency_level, ProficiencyLevel::A0);
        assert_eq!(profile.learning_style, LearningStyle::Mixed);
        assert_eq!(profile.confidence_score, 0.2);
        assert_eq!(profile.raw_score, Some(0.2));
    }

    #[test]
    fn all_correct_on_hard_items_reaches_top_level() {
        let session = session_with(&twenty(20, 9), 9.5);
        let profile = ProfileGenerator::default().generate(&session);

        assert_eq!(profile.proficiency_level, ProficiencyLevel::B2);
        assert!(profile.confidence_score >= 0.85);
        assert!(profile.confidence_score <= 0.95);
        assert_eq!(profile.strengths.len(), 4);
        assert!(profile.weaknesses.is_empty());
        assert!(!profile.insufficient_data);
    }

    #[test]
    fn perfect_score_on_easy_items_is_capped() {
        let session = session_with(&twenty(20, 2), 3.0);
        let profile = ProfileGenerator::default().generate(&session);
        assert_eq!(profile.proficiency_level, ProficiencyLevel::A2);
    }

    #[test]
    fn low_final_estimate_caps_at_b1() {
        let session = session_with(&twenty(20, 8), 6.0);
        let profile = ProfileGenerator::default().generate(&session);
        assert_eq!(profile.proficiency_level, ProficiencyLevel::B1);
    }

    #[test]
    fn low_score_caps_level_regardless_of_exposure() {
        let session = session_with(&twenty(5, 9), 9.0);
        let profile = ProfileGenerator::default().generate(&session);

        assert_eq!(profile.proficiency_level, ProficiencyLevel::A1);
        assert_eq!(profile.raw_score, Some(0.25));
        assert!(!profile.weaknesses.is_empty());
    }

    #[test]
    fn dominant_style_needs_margin() {
        // vocabulary (visual) all correct, grammar (reading_writing) all wrong
        let mut answers = Vec::new();
        for i in 0..10 {
            answers.push(answer("vocabulary", 5, true));
            answers.push(answer("grammar", 5, i % 5 == 0));
        }
        let session = session_with(&answers, 6.0);
        let profile = ProfileGenerator::default().generate(&session);
        assert_eq!(profile.learning_style, LearningStyle::Visual);

        let session = session_with(&twenty(20, 5), 6.0);
        let profile = ProfileGenerator::default().generate(&session);
        assert_eq!(profile.learning_style, LearningStyle::Mixed);
    }

    #[test]
    fn regeneration_differs_only_in_timestamp() {
        let session = session_with(&twenty(13, 6), 6.5);
        let generator = ProfileGenerator::default();

        let first = generator.generate_at(&session, Utc::now());
        let second = generator.generate_at(&session, Utc::now() + chrono::Duration::seconds(5));

        assert_ne!(first.generated_at, second.generated_at);
        assert!(first.same_assessment(&second));
    }

    #[test]
    fn recommendations_start_with_level_and_are_capped() {
        let mut answers = twenty(0, 5);
        for a in answers.iter_mut().take(4) {
            a.pattern = ResponsePattern::Impulsive;
        }
        let session = session_with(&answers, 1.0);
        let profile = ProfileGenerator::default().generate(&session);

        assert!(profile.recommendations[0].starts_with("Start with foundational english"));
        assert!(profile.recommendations[1].starts_with("Read each question"));
        assert!(profile.recommendations.len() <= 6);
    }

    #[test]
    fn evidence_fields_are_filled() {
        let session = session_with(&twenty(10, 5), 5.0);
        let profile = ProfileGenerator::default().generate(&session);

        assert_eq!(profile.final_difficulty_estimate, Some(5.0));
        assert_eq!(profile.average_cognitive_load, Some(1.0));
        assert_eq!(
            profile.pattern_distribution.values().sum::<usize>(),
            QUESTIONS_PER_SESSION
        );
    }
}
