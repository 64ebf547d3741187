//! Question pool inspection

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use gauge_core::{DifficultyStats, InMemoryQuestionRepository, QuestionRepository};

use crate::config::{ConfigLoader, GaugeConfig};

#[derive(Args, Debug)]
pub struct PoolArgs {
    #[command(subcommand)]
    pub command: PoolCommands,
}

#[derive(Subcommand, Debug)]
pub enum PoolCommands {
    /// Validate a pool and summarize it per subject and topic
    Stats {
        /// Pool file (JSON array of questions). Defaults to `pool.path` from config
        file: Option<PathBuf>,
    },
}

pub async fn run(args: PoolArgs) -> Result<()> {
    match args.command {
        PoolCommands::Stats { file } => {
            let config = ConfigLoader::load()?;
            let pool = load_pool(file.as_deref(), &config).await?;
            print_stats(&summarize(&pool).await?);
            Ok(())
        }
    }
}

/// Load the pool from `file`, falling back to the configured default.
pub async fn load_pool(
    file: Option<&Path>,
    config: &GaugeConfig,
) -> Result<InMemoryQuestionRepository> {
    let path = file.or(config.pool.path.as_deref()).context(
        "No question pool given. Pass a file or set `path` under [pool] in the config",
    )?;
    InMemoryQuestionRepository::load_json(path, &config.assessment.difficulty)
        .await
        .with_context(|| format!("Failed to load question pool {}", path.display()))
}

/// Per-subject view of a pool
#[derive(Debug)]
pub struct SubjectSummary {
    pub subject: String,
    pub difficulty: DifficultyStats,
    /// Topic -> (questions, lowest level, highest level)
    pub topics: BTreeMap<String, (usize, u8, u8)>,
}

pub async fn summarize(pool: &InMemoryQuestionRepository) -> Result<Vec<SubjectSummary>> {
    let mut summaries = Vec::new();
    for subject in pool.subjects() {
        let Some(difficulty) = pool.difficulty_stats(&subject).await? else {
            continue;
        };

        let mut topics: BTreeMap<String, (usize, u8, u8)> = BTreeMap::new();
        for topic in pool.topics(&subject).await? {
            topics.insert(topic, (0, u8::MAX, u8::MIN));
        }
        for question in pool.questions().iter().filter(|q| q.subject == subject) {
            if let Some((count, low, high)) = topics.get_mut(&question.topic) {
                *count += 1;
                *low = (*low).min(question.difficulty);
                *high = (*high).max(question.difficulty);
            }
        }

        summaries.push(SubjectSummary {
            subject,
            difficulty,
            topics,
        });
    }
    Ok(summaries)
}

fn print_stats(summaries: &[SubjectSummary]) {
    if summaries.is_empty() {
        println!("Pool is empty.");
        return;
    }

    for summary in summaries {
        let stats = &summary.difficulty;
        println!(
            "{}: {} questions, difficulty {}..={} (median {:.1})",
            summary.subject, stats.count, stats.min, stats.max, stats.median
        );

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Topic").fg(Color::Cyan),
            Cell::new("Questions").fg(Color::Cyan),
            Cell::new("Difficulty").fg(Color::Cyan),
        ]);
        for (topic, (count, low, high)) in &summary.topics {
            table.add_row(vec![
                Cell::new(topic),
                Cell::new(count),
                Cell::new(format!("{low}..={high}")),
            ]);
        }
        println!("{table}");
        println!();
    }
}
