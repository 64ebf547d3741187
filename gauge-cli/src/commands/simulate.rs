//! Simulated diagnostic runs
//!
//! Drives a full session through `SessionManager` with a seeded learner so a
//! pool and a configuration can be tried without a front end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use gauge_core::{
    AnswerSubmission, InMemoryProfileStore, InMemorySessionStore, JsonProfileStore, NextStep,
    ProfileStore, Question, QuestionPrompt, ResponseRecord, SessionManager, StudentId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::commands::pool::load_pool;
use crate::commands::profile::print_profile;
use crate::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Pool file (JSON array of questions). Defaults to `pool.path` from config
    #[arg(long)]
    pub pool: Option<PathBuf>,

    /// Student ID for the simulated learner
    #[arg(long, default_value = "simulated")]
    pub student: String,

    /// Subject to assess. Defaults to `assessment.session.default_subject`
    #[arg(long)]
    pub subject: Option<String>,

    /// Probability of answering correctly (0.0 - 1.0)
    #[arg(long, default_value_t = 0.7)]
    pub accuracy: f64,

    /// Chance that an answer is edited before submission (0.0 - 1.0)
    #[arg(long, default_value_t = 0.1)]
    pub correction_rate: f64,

    /// RNG seed; the same seed replays the same session
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Store the resulting profile in the data directory
    #[arg(long)]
    pub save: bool,

    /// Data directory used with --save. Defaults to `data.dir` from config
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&args.accuracy),
        "--accuracy must be between 0 and 1, got {}",
        args.accuracy
    );
    ensure!(
        (0.0..=1.0).contains(&args.correction_rate),
        "--correction-rate must be between 0 and 1, got {}",
        args.correction_rate
    );

    let config = ConfigLoader::load()?;
    let pool = load_pool(args.pool.as_deref(), &config).await?;

    let profiles: Arc<dyn ProfileStore> = if args.save {
        let dir = args.dir.clone().unwrap_or_else(|| config.data.dir.clone());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let store = JsonProfileStore::load(&dir).await?;
        info!(path = %store.path().display(), "Profiles will be saved");
        Arc::new(store)
    } else {
        Arc::new(InMemoryProfileStore::new())
    };

    let subject = args
        .subject
        .clone()
        .unwrap_or_else(|| config.assessment.session.default_subject.clone());
    let manager = SessionManager::new(
        config.assessment,
        Arc::new(pool),
        Arc::new(InMemorySessionStore::new()),
        profiles,
    )?;

    let mut learner = SimulatedLearner::new(args.seed, args.accuracy, args.correction_rate);
    let student = StudentId::new(args.student);

    let mut prompt = manager.start_session_for_subject(&student, &subject).await?;
    let mut records = Vec::new();
    let profile = loop {
        let submission = learner.answer(&prompt);
        let result = manager.submit_answer(prompt.session_id, submission).await?;
        records.push(result.record);
        match result.next {
            NextStep::Question(next) => prompt = next,
            NextStep::Completed(profile) => break profile,
        }
    };

    info!(
        session_id = %profile.session_id,
        seed = args.seed,
        "Simulated session finished"
    );
    print_transcript(&records);
    println!();
    print_profile(&profile);
    Ok(())
}

/// Seeded learner answering with a fixed accuracy
pub struct SimulatedLearner {
    rng: StdRng,
    accuracy: f64,
    correction_rate: f64,
}

impl SimulatedLearner {
    pub fn new(seed: u64, accuracy: f64, correction_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            accuracy,
            correction_rate,
        }
    }

    pub fn answer(&mut self, prompt: &QuestionPrompt) -> AnswerSubmission {
        let question = &prompt.question;
        let correct = self.rng.gen_bool(self.accuracy);
        let answer = if correct {
            question.correct_answer.clone()
        } else {
            wrong_answer(question)
        };

        // Wrong answers tend to take longer
        let pace = if correct {
            self.rng.gen_range(0.3..1.1)
        } else {
            self.rng.gen_range(0.5..1.8)
        };
        let seconds = (question.expected_time() * pace).max(1.0);

        let corrections = if self.rng.gen_bool(self.correction_rate) {
            self.rng.gen_range(1..=3)
        } else {
            0
        };

        AnswerSubmission::new(question.id.clone(), answer, seconds).with_corrections(corrections)
    }
}

fn wrong_answer(question: &Question) -> String {
    question
        .options
        .iter()
        .find(|option| !question.is_correct(option))
        .cloned()
        .unwrap_or_else(|| "(no answer)".to_string())
}

fn print_transcript(records: &[ResponseRecord]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("Question").fg(Color::Cyan),
        Cell::new("Topic").fg(Color::Cyan),
        Cell::new("Level").fg(Color::Cyan),
        Cell::new("Result").fg(Color::Cyan),
        Cell::new("Time").fg(Color::Cyan),
        Cell::new("Pattern").fg(Color::Cyan),
        Cell::new("Estimate").fg(Color::Cyan),
    ]);

    for record in records {
        let result = if record.is_correct {
            Cell::new("correct").fg(Color::Green)
        } else {
            Cell::new("wrong").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(record.position),
            Cell::new(&record.question_id),
            Cell::new(&record.topic),
            Cell::new(record.difficulty),
            result,
            Cell::new(format!("{:.0}s", record.response_time_seconds)),
            Cell::new(record.pattern),
            Cell::new(format!(
                "{:.2} -> {:.2}",
                record.estimate_before, record.estimate_after
            )),
        ]);
    }
    println!("{table}");
}
