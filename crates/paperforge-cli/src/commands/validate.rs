//! The `paperforge validate` command.

use std::path::PathBuf;

use anyhow::Result;

use paperforge_core::context::check_family_links;
use paperforge_core::model::{Question, QuestionBody};
use paperforge_store::{load_bank, QuestionBank};

/// A problem found in a bank. `subject` is a question or blueprint id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankWarning {
    pub subject: Option<String>,
    pub message: String,
}

impl BankWarning {
    fn new(subject: &str, message: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.to_string()),
            message: message.into(),
        }
    }
}

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let bank = load_bank(&bank_path)?;
    println!(
        "Question bank: {} ({} questions, {} blueprints)",
        bank_path.display(),
        bank.questions.len(),
        bank.blueprints.len()
    );

    let warnings = validate_bank(&bank);
    for w in &warnings {
        let prefix = w
            .subject
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Question bank valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }
    Ok(())
}

pub fn validate_bank(bank: &QuestionBank) -> Vec<BankWarning> {
    let mut warnings: Vec<BankWarning> = check_family_links(&bank.questions)
        .into_iter()
        .map(|issue| BankWarning {
            subject: None,
            message: issue.to_string(),
        })
        .collect();

    for question in &bank.questions {
        warnings.extend(question_warnings(question));
    }

    for (id, blueprint) in &bank.blueprints {
        if blueprint.topics.is_empty() {
            warnings.push(BankWarning::new(id, "blueprint has no topics"));
            continue;
        }
        let topic_total = blueprint.topic_marks_total();
        if let Some(total) = blueprint.total_marks {
            if total != topic_total {
                warnings.push(BankWarning::new(
                    id,
                    format!("topics add up to {topic_total} marks but totalMarks is {total}"),
                ));
            }
        }
        if !blueprint.cognitive_levels.is_empty() {
            let sum: f64 = blueprint.cognitive_levels.values().sum();
            if (sum - 1.0).abs() > 0.01 {
                warnings.push(BankWarning::new(
                    id,
                    format!("cognitive level fractions add up to {sum:.2}, expected 1.00"),
                ));
            }
        }
    }

    warnings
}

fn question_warnings(question: &Question) -> Vec<BankWarning> {
    let mut warnings = Vec::new();
    let id = question.id.as_str();

    // Parents are context only.
    if question.is_parent() {
        return warnings;
    }

    if question.mark_value() == 0 {
        warnings.push(BankWarning::new(id, "no marks; the question can never be selected"));
    }
    if question.topic.trim().is_empty() {
        warnings.push(BankWarning::new(id, "no topic"));
    }

    match &question.body {
        QuestionBody::Unrecognized { format, .. } => {
            warnings.push(BankWarning::new(
                id,
                format!("unrecognized format '{format}', graded as multiple choice"),
            ));
        }
        QuestionBody::MultipleChoice { correct_answer: None, .. }
        | QuestionBody::TrueFalse { correct_answer: None } => {
            warnings.push(BankWarning::new(id, "no correct answer"));
        }
        QuestionBody::ShortAnswer(spec) if spec.correct_answer.is_none() => {
            warnings.push(BankWarning::new(id, "short answer without a correct answer"));
        }
        QuestionBody::FillInBlanks { correct_answers } if correct_answers.is_empty() => {
            warnings.push(BankWarning::new(id, "fill-in-blanks without correct answers"));
        }
        QuestionBody::Ordering { correct_order, .. } if correct_order.is_empty() => {
            warnings.push(BankWarning::new(id, "ordering without a correct order"));
        }
        QuestionBody::Matching { targets, .. } if targets.is_empty() => {
            warnings.push(BankWarning::new(id, "drag-and-drop without an order or targets"));
        }
        _ => {}
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperforge_core::model::{Blueprint, QuestionRecord};
    use serde_json::json;

    fn record(id: &str) -> QuestionRecord {
        QuestionRecord {
            id: id.into(),
            subject: "mathematics".into(),
            grade: Some(12),
            topic: "Algebra".into(),
            format: Some("mcq".into()),
            correct_answer: Some(json!("A")),
            max_marks: Some(2),
            ..QuestionRecord::default()
        }
    }

    #[test]
    fn clean_bank_has_no_warnings() {
        let bank = QuestionBank {
            questions: vec![Question::from(record("q1"))],
            blueprints: [(
                "mathematics_p1_gr12".to_string(),
                Blueprint {
                    topics: [("Algebra".to_string(), 2)].into(),
                    cognitive_levels: [("Level 1".to_string(), 1.0)].into(),
                    total_marks: Some(2),
                    ..Blueprint::default()
                },
            )]
            .into(),
        };
        assert!(validate_bank(&bank).is_empty());
    }

    #[test]
    fn question_problems_are_reported() {
        let zero = QuestionRecord {
            max_marks: None,
            ..record("zero")
        };
        let odd = QuestionRecord {
            format: Some("essay".into()),
            ..record("odd")
        };
        let short = QuestionRecord {
            format: Some("short_answer".into()),
            correct_answer: None,
            ..record("short")
        };
        let orphan = QuestionRecord {
            parent_question_id: Some("missing".into()),
            ..record("orphan")
        };
        let bank = QuestionBank {
            questions: [zero, odd, short, orphan].into_iter().map(Question::from).collect(),
            ..QuestionBank::default()
        };

        let messages: Vec<String> = validate_bank(&bank)
            .into_iter()
            .map(|w| format!("{}: {}", w.subject.unwrap_or_default(), w.message))
            .collect();
        assert_eq!(messages.len(), 4, "{messages:?}");
        assert!(messages.iter().any(|m| m.contains("orphan: parent missing does not exist")));
        assert!(messages.iter().any(|m| m.starts_with("zero: no marks")));
        assert!(messages.iter().any(|m| m.starts_with("odd: unrecognized format 'essay'")));
        assert!(messages.iter().any(|m| m.starts_with("short: short answer without")));
    }

    #[test]
    fn blueprint_problems_are_reported() {
        let bank = QuestionBank {
            blueprints: [
                ("empty".to_string(), Blueprint::default()),
                (
                    "skewed".to_string(),
                    Blueprint {
                        topics: [("Algebra".to_string(), 10)].into(),
                        cognitive_levels: [("Level 1".to_string(), 0.5)].into(),
                        total_marks: Some(12),
                        ..Blueprint::default()
                    },
                ),
            ]
            .into(),
            ..QuestionBank::default()
        };
        let warnings = validate_bank(&bank);
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[0], BankWarning::new("empty", "blueprint has no topics"));
        assert!(warnings[1].message.contains("totalMarks is 12"));
        assert!(warnings[2].message.contains("0.50"));
    }
}
