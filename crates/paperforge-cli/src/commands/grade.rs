//! The `paperforge grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use paperforge_core::model::value_text;
use paperforge_core::request::{GradeRequest, GradeResponse};
use paperforge_core::submission::GradingService;

use super::{check_format, open_store};

pub async fn execute(
    answers_path: PathBuf,
    user: Option<String>,
    bank: Option<PathBuf>,
    config_path: Option<PathBuf>,
    format: String,
) -> Result<()> {
    check_format(&format, &["table", "json"])?;

    let content = std::fs::read_to_string(&answers_path)
        .with_context(|| format!("failed to read answers: {}", answers_path.display()))?;
    let request: GradeRequest = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse answers: {}", answers_path.display()))?;

    let (_, store) = open_store(bank, config_path)?;
    let service = GradingService::new(store.repository, store.sink);
    let response = service.grade(&request).await?;

    if let Some(user) = &user {
        if let Some(handle) = service.persist(user, &response, &request.metadata) {
            handle.await.context("result persistence task failed")?;
        }
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&response)?),
        _ => print_table(&response),
    }

    Ok(())
}

fn print_table(response: &GradeResponse) {
    let mut table = Table::new();
    table.set_header(vec!["Question", "Format", "Answer", "Expected", "Marks", "Result"]);
    for result in &response.results {
        let verdict = match (result.was_unanswered, result.is_correct) {
            (Some(true), _) => "unanswered",
            (_, true) => "correct",
            _ => "incorrect",
        };
        table.add_row(vec![
            Cell::new(&result.question_id),
            Cell::new(&result.format),
            Cell::new(truncate(&value_text(&result.user_answer), 30)),
            Cell::new(truncate(&value_text(&result.correct_answer), 30)),
            Cell::new(format!("{}/{}", result.marks_awarded, result.max_marks)),
            Cell::new(verdict),
        ]);
    }
    println!("{table}");

    let stats = &response.statistics;
    println!(
        "\nScore: {}/{} ({}%) grade {}",
        stats.marks_awarded,
        stats.total_marks,
        stats.percentage,
        stats.grade.as_str()
    );
    println!(
        "Correct: {}/{} ({}% accuracy)",
        stats.correct_questions, stats.total_questions, stats.accuracy
    );
    for result in &response.results {
        if let Some(feedback) = &result.feedback {
            println!("  [{}] {feedback}", result.question_id);
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
