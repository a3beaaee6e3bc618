//! The `paperforge generate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use paperforge_core::engine::{PaperEngine, SelectionStrategy};
use paperforge_core::random::{EntropyRandom, Seed};
use paperforge_core::request::{GenerateRequest, GenerateResponse};

use super::{check_format, open_store};

#[allow(clippy::too_many_arguments)]
pub fn build_request(
    subject: String,
    grade: u32,
    paper: Option<String>,
    year: Option<i32>,
    season: Option<String>,
    mode: Option<String>,
    duration: Option<u32>,
    topic: Option<String>,
    count: Option<u32>,
    seed: Option<String>,
    exclude: Option<String>,
) -> GenerateRequest {
    let exclude_ids = exclude
        .map(|ids| {
            ids.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    GenerateRequest {
        paper,
        year,
        season,
        topic,
        mode,
        duration,
        num_questions: count,
        exclude_ids,
        seed: seed.map(|s| parse_seed(&s)),
        ..GenerateRequest::new(subject, grade)
    }
}

/// Numeric seeds stay numbers so `--seed 42` matches a JSON `"seed": 42`.
fn parse_seed(raw: &str) -> Seed {
    match raw.trim().parse::<i64>() {
        Ok(n) => Seed::Number(n),
        Err(_) => Seed::Text(raw.to_string()),
    }
}

fn parse_strategy(raw: &str) -> Result<SelectionStrategy> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
        .with_context(|| format!("unknown strategy '{raw}', expected marks_only or balanced"))
}

pub async fn execute(
    request: GenerateRequest,
    strategy: Option<String>,
    bank: Option<PathBuf>,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    format: String,
) -> Result<()> {
    check_format(&format, &["table", "json", "markdown"])?;

    let (config, store) = open_store(bank, config_path)?;
    let mut engine_config = config.engine.to_engine_config();
    if let Some(raw) = &strategy {
        engine_config.strategy = parse_strategy(raw)?;
    }

    let engine = PaperEngine::new(store.repository, engine_config);
    let mut rng = EntropyRandom::new();
    let paper = engine.generate(&request, &mut rng).await?;

    if let Some(path) = &output {
        let json = serde_json::to_string_pretty(&paper)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write paper: {}", path.display()))?;
        eprintln!("Paper written to: {}", path.display());
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&paper)?),
        "markdown" => print!("{}", render_markdown(&paper)),
        _ => print_table(&paper),
    }

    Ok(())
}

fn print_table(paper: &GenerateResponse) {
    if paper.questions.is_empty() {
        println!("No questions available for this request.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Topic", "Level", "Marks", "Past paper"]);
    for entry in &paper.questions {
        let q = &entry.question;
        table.add_row(vec![
            Cell::new(entry.question_number),
            Cell::new(&q.id),
            Cell::new(&q.topic),
            Cell::new(q.cognitive_level.as_deref().unwrap_or("-")),
            Cell::new(q.max_marks.or(q.marks).unwrap_or_default()),
            Cell::new(
                q.pqp_data
                    .as_ref()
                    .and_then(|p| p.question_number.as_deref())
                    .unwrap_or("-"),
            ),
        ]);
    }
    println!("{table}");

    println!(
        "\n{} questions, {} marks",
        paper.total_questions, paper.total_marks
    );
    if let Some(compliance) = &paper.compliance {
        println!(
            "Compliance: {} (score {:.2}, marks {}/{})",
            if compliance.overall.compliant { "compliant" } else { "not compliant" },
            compliance.overall.score,
            compliance.marks.actual,
            compliance.marks.target,
        );
    }
}

fn render_markdown(paper: &GenerateResponse) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Paper {}\n\n", paper.id));
    if let Some(id) = paper.blueprint.as_ref().and_then(|b| b.id.as_deref()) {
        md.push_str(&format!("**Blueprint:** {id}\n\n"));
    }
    md.push_str(&format!(
        "**Questions:** {} | **Marks:** {}\n\n",
        paper.total_questions, paper.total_marks
    ));

    md.push_str("| # | Question | Topic | Level | Marks |\n");
    md.push_str("|---|----------|-------|-------|-------|\n");
    for entry in &paper.questions {
        let q = &entry.question;
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            entry.question_number,
            q.id,
            q.topic,
            q.cognitive_level.as_deref().unwrap_or("-"),
            q.max_marks.or(q.marks).unwrap_or_default(),
        ));
    }
    md.push('\n');

    if let Some(compliance) = &paper.compliance {
        md.push_str("## Compliance\n\n");
        md.push_str(&compliance.to_markdown());
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_from_flags() {
        let request = build_request(
            "mathematics".into(),
            12,
            Some("p1".into()),
            None,
            None,
            Some("by_topic".into()),
            None,
            Some("Algebra".into()),
            Some(5),
            Some("42".into()),
            Some("q1, q2,,".into()),
        );
        assert_eq!(request.subject.as_deref(), Some("mathematics"));
        assert_eq!(request.grade, Some(12));
        assert_eq!(request.num_questions, Some(5));
        assert_eq!(request.exclude_ids, vec!["q1", "q2"]);
        assert_eq!(request.seed, Some(Seed::Number(42)));
    }

    #[test]
    fn text_seeds_are_kept() {
        assert_eq!(parse_seed("exam-week"), Seed::Text("exam-week".into()));
    }

    #[test]
    fn strategy_names() {
        assert_eq!(parse_strategy("balanced").unwrap(), SelectionStrategy::Balanced);
        assert_eq!(parse_strategy("marks_only").unwrap(), SelectionStrategy::MarksOnly);
        assert!(parse_strategy("greedy").is_err());
    }
}
