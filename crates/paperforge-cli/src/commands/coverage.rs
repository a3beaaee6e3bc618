//! The `paperforge coverage` command: how many answerable marks the bank
//! holds for each topic of a blueprint.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use serde::Serialize;

use paperforge_core::model::{Blueprint, Question};
use paperforge_core::traits::QuestionFilter;

use super::{check_format, open_store};

/// Upper bound on questions fetched for the analysis.
const SCAN_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCoverage {
    pub topic: String,
    pub required_marks: u32,
    pub available_marks: u32,
    pub questions: usize,
    pub shortfall: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub blueprint: String,
    pub required_marks: u32,
    pub available_marks: u32,
    pub parent_questions: usize,
    pub answerable_questions: usize,
    pub topics: Vec<TopicCoverage>,
    /// Answerable questions per `"year season"`, newest first.
    pub by_sitting: Vec<(String, usize)>,
}

impl CoverageReport {
    /// Parents are context only and never count as available marks.
    pub fn compute(blueprint_id: &str, blueprint: &Blueprint, questions: &[Question]) -> Self {
        let mut per_topic: BTreeMap<&str, (u32, usize)> = BTreeMap::new();
        let mut per_sitting: BTreeMap<String, usize> = BTreeMap::new();
        let mut parents = 0;
        let mut answerable = 0;

        for question in questions {
            if question.is_parent() {
                parents += 1;
                continue;
            }
            answerable += 1;
            let entry = per_topic.entry(question.topic.as_str()).or_default();
            entry.0 += question.mark_value();
            entry.1 += 1;

            let sitting = format!(
                "{} {}",
                question.year.map_or_else(|| "unknown".to_string(), |y| y.to_string()),
                question.season.as_deref().unwrap_or("unknown")
            );
            *per_sitting.entry(sitting).or_default() += 1;
        }

        let topics: Vec<TopicCoverage> = blueprint
            .topics
            .iter()
            .map(|(topic, required)| {
                let (available, count) = per_topic.get(topic.as_str()).copied().unwrap_or_default();
                TopicCoverage {
                    topic: topic.clone(),
                    required_marks: *required,
                    available_marks: available,
                    questions: count,
                    shortfall: required.saturating_sub(available),
                }
            })
            .collect();

        let required_marks = blueprint
            .total_marks
            .unwrap_or_else(|| blueprint.topic_marks_total());
        let available_marks = topics.iter().map(|t| t.available_marks).sum();

        Self {
            blueprint: blueprint_id.to_string(),
            required_marks,
            available_marks,
            parent_questions: parents,
            answerable_questions: answerable,
            topics,
            by_sitting: per_sitting.into_iter().rev().collect(),
        }
    }

    pub fn short_topics(&self) -> usize {
        self.topics.iter().filter(|t| t.shortfall > 0).count()
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    subject: String,
    grade: u32,
    paper: Option<String>,
    year: Option<i32>,
    season: Option<String>,
    bank: Option<PathBuf>,
    config_path: Option<PathBuf>,
    format: String,
) -> Result<()> {
    check_format(&format, &["table", "json"])?;

    let (_, store) = open_store(bank, config_path)?;
    let blueprint_id = Blueprint::id_for(&subject, paper.as_deref(), grade);
    let blueprint = store
        .repository
        .get_blueprint(&blueprint_id)
        .await
        .with_context(|| format!("loading blueprint {blueprint_id}"))?;

    let mut filter = QuestionFilter::new(subject, grade).with_limit(SCAN_LIMIT);
    filter.paper = paper;
    filter.year = year;
    filter.season = season;
    let questions = store.repository.query_questions(&filter).await?;

    let report = CoverageReport::compute(&blueprint_id, &blueprint, &questions);
    tracing::debug!(
        blueprint = %blueprint_id,
        questions = questions.len(),
        short_topics = report.short_topics(),
        "coverage computed"
    );

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &CoverageReport) {
    println!("Blueprint: {} ({} marks)", report.blueprint, report.required_marks);
    println!(
        "Answerable questions: {} ({} parents filtered out)\n",
        report.answerable_questions, report.parent_questions
    );

    let mut table = Table::new();
    table.set_header(vec!["Topic", "Required", "Available", "Questions", "Status"]);
    for topic in &report.topics {
        let status = if topic.shortfall == 0 {
            "ok".to_string()
        } else {
            format!("short {}", topic.shortfall)
        };
        table.add_row(vec![
            Cell::new(&topic.topic),
            Cell::new(topic.required_marks),
            Cell::new(topic.available_marks),
            Cell::new(topic.questions),
            Cell::new(status),
        ]);
    }
    println!("{table}");

    if report.by_sitting.len() > 1 {
        println!("\nBy sitting:");
        for (sitting, count) in &report.by_sitting {
            println!("  {sitting}: {count} questions");
        }
    }

    if report.available_marks < report.required_marks {
        let gap = report.required_marks - report.available_marks;
        println!(
            "\nShortfall: {gap} of {} marks missing ({:.1}%)",
            report.required_marks,
            f64::from(gap) / f64::from(report.required_marks) * 100.0
        );
    } else {
        println!(
            "\nSufficient marks: {} >= {}",
            report.available_marks, report.required_marks
        );
    }
    let short = report.short_topics();
    if short > 0 {
        println!("{short} topic(s) short.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperforge_core::model::QuestionRecord;

    fn question(id: &str, topic: &str, marks: u32, is_parent: bool) -> Question {
        Question::from(QuestionRecord {
            id: id.into(),
            subject: "mathematics".into(),
            grade: Some(12),
            topic: topic.into(),
            year: Some(2023),
            season: Some("november".into()),
            max_marks: Some(marks),
            is_parent,
            ..QuestionRecord::default()
        })
    }

    #[test]
    fn shortfall_per_topic() {
        let blueprint = Blueprint {
            topics: [("Algebra".to_string(), 10), ("Calculus".to_string(), 8)].into(),
            total_marks: Some(18),
            ..Blueprint::default()
        };
        let questions = vec![
            question("a1", "Algebra", 6, false),
            question("a2", "Algebra", 5, false),
            question("p1", "Calculus", 20, true),
            question("c1", "Calculus", 3, false),
            question("x1", "Probability", 4, false),
        ];
        let report = CoverageReport::compute("mathematics_p1_gr12", &blueprint, &questions);

        assert_eq!(report.parent_questions, 1);
        assert_eq!(report.answerable_questions, 4);
        assert_eq!(report.topics[0].available_marks, 11);
        assert_eq!(report.topics[0].shortfall, 0);
        assert_eq!(report.topics[1].available_marks, 3);
        assert_eq!(report.topics[1].shortfall, 5);
        assert_eq!(report.available_marks, 14);
        assert_eq!(report.short_topics(), 1);
        assert_eq!(report.by_sitting, vec![("2023 november".to_string(), 4)]);
    }

    #[test]
    fn missing_topic_has_nothing_available() {
        let blueprint = Blueprint {
            topics: [("Geometry".to_string(), 12)].into(),
            ..Blueprint::default()
        };
        let report = CoverageReport::compute("bp", &blueprint, &[]);
        assert_eq!(report.required_marks, 12);
        assert_eq!(report.topics[0].questions, 0);
        assert_eq!(report.topics[0].shortfall, 12);
    }
}
