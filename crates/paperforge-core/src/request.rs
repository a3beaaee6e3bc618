//! Wire shapes for paper generation and grading.
//!
//! All shapes are camelCase JSON. Validation runs before any work starts and
//! fails with [`PaperError::InvalidArgument`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compliance::ComplianceReport;
use crate::error::PaperError;
use crate::grading::GradingResult;
use crate::model::Blueprint;
use crate::paper::PaperQuestion;
use crate::random::Seed;
use crate::statistics::TestStatistics;

/// Largest paper a single request may ask for.
pub const MAX_QUESTIONS: u32 = 100;
/// Largest number of answers a single grading request may carry.
pub const MAX_SUBMISSIONS: usize = 100;
/// Longest accepted string answer, in characters.
pub const MAX_ANSWER_CHARS: usize = 50_000;

/// How a paper is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperMode {
    /// Blueprint-driven paper.
    #[default]
    Standard,
    /// Blueprint scaled down to the requested duration.
    QuickPractice,
    /// Practice questions from a single topic, no blueprint.
    ByTopic,
    /// Full past paper; questions keep their past-paper order.
    FullExam,
}

impl PaperMode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "sprint" | "quick_practice" | "quickpractice" => PaperMode::QuickPractice,
            "by_topic" | "bytopic" => PaperMode::ByTopic,
            "full_exam" | "fullexam" | "pqp" => PaperMode::FullExam,
            _ => PaperMode::Standard,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub grade: Option<u32>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Minutes available, for quick practice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<Seed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_factor: Option<u32>,
}

impl GenerateRequest {
    pub fn new(subject: impl Into<String>, grade: u32) -> Self {
        Self {
            subject: Some(subject.into()),
            grade: Some(grade),
            ..Self::default()
        }
    }

    /// Check required fields and limits, returning the subject and grade.
    pub fn validate(&self) -> Result<(&str, u32), PaperError> {
        let subject = self.subject.as_deref().map(str::trim).unwrap_or_default();
        let (Some(grade), false) = (self.grade, subject.is_empty()) else {
            return Err(PaperError::invalid("grade (as number) and subject are required"));
        };
        if self.num_questions.is_some_and(|n| n > MAX_QUESTIONS) {
            return Err(PaperError::invalid(format!(
                "cannot generate more than {MAX_QUESTIONS} questions at once"
            )));
        }
        Ok((subject, grade))
    }

    pub fn mode(&self) -> PaperMode {
        let mode = self.mode.as_deref().map(PaperMode::parse).unwrap_or_default();
        if mode == PaperMode::Standard && self.duration.is_some() {
            PaperMode::QuickPractice
        } else {
            mode
        }
    }
}

/// A generated paper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub id: String,
    pub questions: Vec<PaperQuestion>,
    pub total_questions: usize,
    pub total_marks: u32,
    /// The blueprint the paper was fitted to, after any scaling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<Blueprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceReport>,
    pub generated_at: String,
}

/// Session metadata sent alongside a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest {
    /// Question id to raw answer; `null` marks an unanswered question.
    #[serde(default, alias = "answers")]
    pub submissions: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub metadata: GradingMetadata,
}

impl GradeRequest {
    pub fn validate(&self) -> Result<(), PaperError> {
        if self.submissions.is_empty() {
            return Err(PaperError::invalid("no submissions provided for grading"));
        }
        if self.submissions.len() > MAX_SUBMISSIONS {
            return Err(PaperError::invalid(format!(
                "cannot grade more than {MAX_SUBMISSIONS} questions at once"
            )));
        }
        for (question_id, answer) in &self.submissions {
            if let Value::String(text) = answer {
                if text.chars().count() > MAX_ANSWER_CHARS {
                    return Err(PaperError::invalid(format!(
                        "answer for {question_id} is too long, maximum {MAX_ANSWER_CHARS} characters"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResponse {
    pub results: Vec<GradingResult>,
    pub statistics: TestStatistics,
    pub graded_at: String,
}
