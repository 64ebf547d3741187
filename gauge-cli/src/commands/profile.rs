//! Stored learner profile lookup

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use gauge_core::{JsonProfileStore, LearnerProfile, PatternSummary, ProfileStore, StudentId};

use crate::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Show the latest profile of a student
    Show {
        /// Student ID
        student: String,
        /// Data directory holding profiles.json. Defaults to `data.dir` from config
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every stored profile of a student, oldest first
    History {
        /// Student ID
        student: String,
        /// Data directory holding profiles.json. Defaults to `data.dir` from config
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

pub async fn run(args: ProfileArgs) -> Result<()> {
    match args.command {
        ProfileCommands::Show { student, dir, json } => {
            let store = open_store(dir).await?;
            show(&store, &StudentId::new(student), json).await
        }
        ProfileCommands::History { student, dir } => {
            let store = open_store(dir).await?;
            history(&store, &StudentId::new(student)).await
        }
    }
}

async fn open_store(dir: Option<PathBuf>) -> Result<JsonProfileStore> {
    let dir = match dir {
        Some(dir) => dir,
        None => ConfigLoader::load()?.data.dir,
    };
    JsonProfileStore::load(&dir)
        .await
        .with_context(|| format!("Failed to load profiles from {}", dir.display()))
}

async fn show(store: &JsonProfileStore, student: &StudentId, json: bool) -> Result<()> {
    let Some(profile) = store.get_latest_profile(student).await? else {
        println!("No profile stored for {student}.");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        print_profile(&profile);
    }
    Ok(())
}

async fn history(store: &JsonProfileStore, student: &StudentId) -> Result<()> {
    let profiles = store.list_for(student).await;
    if profiles.is_empty() {
        println!("No profile stored for {student}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Generated").fg(Color::Cyan),
        Cell::new("Session").fg(Color::Cyan),
        Cell::new("Level").fg(Color::Cyan),
        Cell::new("Confidence").fg(Color::Cyan),
        Cell::new("Style").fg(Color::Cyan),
    ]);
    for profile in &profiles {
        table.add_row(vec![
            Cell::new(profile.generated_at.format("%Y-%m-%d %H:%M")),
            Cell::new(profile.session_id),
            Cell::new(profile.proficiency_level),
            Cell::new(format!("{:.2}", profile.confidence_score)),
            Cell::new(profile.learning_style),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Human-readable profile report
pub fn print_profile(profile: &LearnerProfile) {
    println!("Student:     {}", profile.student_id);
    println!("Session:     {}", profile.session_id);
    println!("Level:       {}", profile.proficiency_level);
    println!("Style:       {}", profile.learning_style);
    println!("Confidence:  {:.2}", profile.confidence_score);
    if let Some(raw_score) = profile.raw_score {
        println!("Raw score:   {:.2}", raw_score);
    }
    if let Some(estimate) = profile.final_difficulty_estimate {
        println!("Estimate:    {:.2}", estimate);
    }
    if profile.insufficient_data {
        println!("Note:        too few answers for a reliable profile");
    }
    println!("Strengths:   {}", join_or_none(&profile.strengths));
    println!("Weaknesses:  {}", join_or_none(&profile.weaknesses));

    if !profile.pattern_distribution.is_empty() {
        println!();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Pattern").fg(Color::Cyan),
            Cell::new("Answers").fg(Color::Cyan),
        ]);
        for (pattern, count) in &profile.pattern_distribution {
            table.add_row(vec![Cell::new(pattern), Cell::new(count)]);
        }
        println!("{table}");

        let summary = PatternSummary {
            distribution: profile.pattern_distribution.clone(),
            average_cognitive_load: profile.average_cognitive_load.unwrap_or_default(),
        };
        if let Some(dominant) = summary.dominant() {
            println!("Dominant pattern:       {dominant}");
        }
        if profile.average_cognitive_load.is_some() {
            println!("Average cognitive load: {:.2}", summary.average_cognitive_load);
        }
    }

    if !profile.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for (i, recommendation) in profile.recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, recommendation);
        }
    }
}

fn join_or_none<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let joined = items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_join_or_none() {
        let empty: BTreeSet<String> = BTreeSet::new();
        assert_eq!(join_or_none(&empty), "(none)");

        let topics: BTreeSet<String> = ["grammar".to_string(), "reading".to_string()].into();
        assert_eq!(join_or_none(&topics), "grammar, reading");
    }

    #[tokio::test]
    async fn test_open_store_with_explicit_empty_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = open_store(Some(temp_dir.path().to_path_buf()))
            .await
            .unwrap();
        assert!(store.is_empty().await);
        assert!(
            store
                .get_latest_profile(&StudentId::new("nobody"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
