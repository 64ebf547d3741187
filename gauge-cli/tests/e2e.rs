//! End-to-end tests for the gauge binary
//!
//! Gated behind the `integration` feature flag. Run with:
//!
//! ```sh
//! cargo test -p gauge-cli --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run gauge with config and data isolated under `home`
fn gauge(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gauge"))
        .args(args)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("GAUGE_PROJECT_CONFIG_DIR", home.join("project"))
        .output()
        .expect("Failed to run gauge")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Write a three-topic pool with every level 1..=10 covered four times
fn write_pool(dir: &Path) -> std::path::PathBuf {
    let mut questions = Vec::new();
    for topic in ["grammar", "vocabulary", "reading"] {
        for difficulty in 1..=10 {
            for variant in 0..4 {
                questions.push(serde_json::json!({
                    "id": format!("{topic}-{difficulty:02}-{variant}"),
                    "text": format!("{topic} {difficulty}"),
                    "options": ["yes", "no"],
                    "correct_answer": "yes",
                    "difficulty": difficulty,
                    "topic": topic,
                    "subject": "english",
                    "estimated_time_seconds": 30,
                }));
            }
        }
    }
    let path = dir.join("pool.json");
    std::fs::write(&path, serde_json::to_string(&questions).unwrap()).unwrap();
    path
}

#[test]
fn gauge_help_works() {
    let home = TempDir::new().unwrap();
    let output = gauge(home.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("Adaptive diagnostic assessments"));
    assert!(stdout.contains("simulate"));
    assert!(stdout.contains("config"));
}

#[test]
fn gauge_config_show_works_without_config() {
    let home = TempDir::new().unwrap();
    let output = gauge(home.path(), &["config", "show"]);

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("[assessment.session]"));
    assert!(stdout.contains("default_subject = \"english\""));
}

#[test]
fn gauge_config_path_shows_paths() {
    let home = TempDir::new().unwrap();
    let output = gauge(home.path(), &["config", "path"]);

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("User config:"));
    assert!(stdout.contains("Project config:"));
}

#[test]
fn gauge_pool_stats_summarizes_topics() {
    let home = TempDir::new().unwrap();
    let pool = write_pool(home.path());
    let output = gauge(home.path(), &["pool", "stats", pool.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("english: 120 questions"));
    assert!(stdout.contains("grammar"));
    assert!(stdout.contains("vocabulary"));
}

#[test]
fn gauge_simulate_saves_a_profile() {
    let home = TempDir::new().unwrap();
    let pool = write_pool(home.path());
    let data = home.path().join("profiles");
    let data = data.to_str().unwrap();

    let output = gauge(
        home.path(),
        &[
            "simulate",
            "--pool",
            pool.to_str().unwrap(),
            "--student",
            "sim",
            "--seed",
            "3",
            "--save",
            "--dir",
            data,
        ],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("Level:"));

    let output = gauge(home.path(), &["profile", "show", "sim", "--dir", data]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Student:     sim"));
}
