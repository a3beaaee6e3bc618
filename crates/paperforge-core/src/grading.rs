//! Per-question grading.
//!
//! [`grade_question`] is one exhaustive match over [`QuestionBody`]. Every
//! problem with a single answer becomes an incorrect result, never an error.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::equivalence::{is_equivalent, EquivalenceError};
use crate::model::{value_text, AnswerType, DragTarget, Question, QuestionBody, QuestionFormat, ShortAnswerSpec};

/// Share of the available marks needed for a partially scored answer to
/// count as correct.
const PASS_THRESHOLD: f64 = 0.5;

/// A submitted answer for one question.
///
/// Object submissions carry `answer` and/or `answers`; any other value is
/// read as `{answer: value}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub answer: Option<Value>,
    pub answers: Option<Value>,
}

impl Submission {
    /// `None` for `null`, which marks the question as unanswered.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Object(map) => Some(Self {
                answer: map.get("answer").cloned(),
                answers: map.get("answers").cloned(),
            }),
            other => Some(Self {
                answer: Some(other.clone()),
                answers: None,
            }),
        }
    }

    pub fn answer(value: impl Into<Value>) -> Self {
        Self {
            answer: Some(value.into()),
            answers: None,
        }
    }

    /// `answers` when present and non-empty, else `answer`.
    fn answer_list(&self) -> Option<&Value> {
        self.answers
            .as_ref()
            .filter(|v| !v.is_null() && v.as_str() != Some(""))
            .or(self.answer.as_ref())
    }
}

/// Outcome of grading one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    pub question_id: String,
    pub format: String,
    pub user_answer: Value,
    pub correct_answer: Value,
    pub is_correct: bool,
    pub marks_awarded: f64,
    pub max_marks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_unanswered: Option<bool>,
    #[serde(flatten)]
    pub detail: Option<GradingDetail>,
}

/// Format-specific breakdown attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GradingDetail {
    Ordering(OrderingDetail),
    Matching(MatchingDetail),
    Blanks(BlanksDetail),
    ShortAnswer(ShortAnswerDetail),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubFormat {
    Ordering,
    Matching,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderingDetail {
    pub sub_format: SubFormat,
    pub user_answers: Vec<String>,
    pub correct_order: Vec<String>,
    pub correct_count: usize,
    pub total_steps: usize,
    pub marks_per_step: f64,
    pub percentage: f64,
    pub detailed_results: Vec<StepResult>,
    pub marking_method: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_position: usize,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub marks_awarded: f64,
    pub marks_available: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingDetail {
    pub sub_format: SubFormat,
    pub user_answers: Vec<MatchEntry>,
    pub correct_count: usize,
    pub total_targets: usize,
    pub percentage: f64,
    pub detailed_results: Vec<TargetResult>,
}

/// One entry of a matching answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MatchEntry {
    Pair {
        target: Option<String>,
        item: Option<String>,
    },
    Item(String),
}

impl MatchEntry {
    fn item(&self) -> Option<&str> {
        match self {
            MatchEntry::Pair { item, .. } => item.as_deref(),
            MatchEntry::Item(item) => Some(item),
        }
    }

    fn is_for(&self, target_id: &str) -> bool {
        matches!(self, MatchEntry::Pair { target: Some(t), .. } if t == target_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResult {
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_text: Option<String>,
    pub user_answer: Option<String>,
    pub correct_answer: Option<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlanksDetail {
    pub user_answers: Vec<Value>,
    pub correct_count: usize,
    pub total_blanks: usize,
    pub percentage: f64,
    pub detailed_results: Vec<BlankResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankResult {
    pub blank_index: usize,
    pub user_answer: Value,
    pub correct_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortAnswerDetail {
    pub answer_type: AnswerType,
    pub accepted_variations: Vec<String>,
    pub case_sensitive: bool,
    pub tolerance: f64,
}

/// The correct answer of `question` as it is reported in results.
pub fn correct_answer_value(question: &Question) -> Value {
    fn text(answer: &Option<String>) -> Value {
        answer.clone().map_or(Value::Null, Value::String)
    }

    match &question.body {
        QuestionBody::MultipleChoice { correct_answer, .. }
        | QuestionBody::TrueFalse { correct_answer }
        | QuestionBody::Unrecognized { correct_answer, .. } => text(correct_answer),
        QuestionBody::Ordering { correct_order, .. } => {
            Value::Array(correct_order.iter().cloned().map(Value::String).collect())
        }
        QuestionBody::Matching { targets, .. } => {
            let pairs: Map<String, Value> = targets
                .iter()
                .map(|t| (t.id.clone(), text(&t.correct_pair)))
                .collect();
            Value::Object(pairs)
        }
        QuestionBody::FillInBlanks { correct_answers } => {
            Value::Array(correct_answers.iter().cloned().map(Value::String).collect())
        }
        QuestionBody::ShortAnswer(spec) => text(&spec.correct_answer),
    }
}

/// Result for a question whose submission was `null` or missing.
pub fn unanswered(question: &Question) -> GradingResult {
    GradingResult {
        question_id: question.id.clone(),
        format: question.body.format().tag().to_string(),
        user_answer: Value::Null,
        correct_answer: correct_answer_value(question),
        is_correct: false,
        marks_awarded: 0.0,
        max_marks: question.max_marks_or(2),
        feedback: None,
        was_unanswered: Some(true),
        detail: None,
    }
}

/// Grade one submission.
pub fn grade_question(question: &Question, submission: &Submission) -> GradingResult {
    tracing::debug!(question = %question.id, format = %question.body.format(), "grading");

    match &question.body {
        QuestionBody::MultipleChoice { correct_answer, .. } => {
            grade_choice(question, submission, correct_answer, QuestionFormat::MultipleChoice)
        }
        QuestionBody::TrueFalse { correct_answer } => {
            grade_choice(question, submission, correct_answer, QuestionFormat::TrueFalse)
        }
        QuestionBody::Unrecognized {
            format,
            correct_answer,
            ..
        } => {
            tracing::warn!(question = %question.id, format = %format, "unknown question format, grading as multiple choice");
            grade_choice(question, submission, correct_answer, QuestionFormat::MultipleChoice)
        }
        QuestionBody::Ordering { correct_order, .. } => {
            grade_ordering(question, submission.answer_list(), correct_order)
        }
        QuestionBody::Matching { targets, .. } => {
            grade_matching(question, submission.answer_list(), targets)
        }
        QuestionBody::FillInBlanks { correct_answers } => {
            grade_blanks(question, submission.answer_list(), correct_answers)
        }
        QuestionBody::ShortAnswer(spec) => grade_short_answer(question, submission.answer.as_ref(), spec),
    }
}

fn base_result(question: &Question, format: QuestionFormat, user_answer: Value, max_marks: u32) -> GradingResult {
    GradingResult {
        question_id: question.id.clone(),
        format: format.tag().to_string(),
        user_answer,
        correct_answer: correct_answer_value(question),
        is_correct: false,
        marks_awarded: 0.0,
        max_marks,
        feedback: None,
        was_unanswered: None,
        detail: None,
    }
}

/// Multiple choice compares upper-cased, true/false lower-cased.
fn grade_choice(
    question: &Question,
    submission: &Submission,
    correct_answer: &Option<String>,
    format: QuestionFormat,
) -> GradingResult {
    let user = submission.answer.as_ref().map(value_text).unwrap_or_default();
    let expected = correct_answer.as_deref().unwrap_or_default();

    let (is_correct, default_marks) = match format {
        QuestionFormat::TrueFalse => (user.trim().to_lowercase() == expected.trim().to_lowercase(), 1),
        _ => (user.trim().to_uppercase() == expected.trim().to_uppercase(), 2),
    };
    let max_marks = question.max_marks_or(default_marks);

    let mut result = base_result(
        question,
        format,
        submission.answer.clone().unwrap_or(Value::Null),
        max_marks,
    );
    result.is_correct = is_correct;
    result.marks_awarded = if is_correct { f64::from(max_marks) } else { 0.0 };
    result
}

fn ordering_answers(answer: Option<&Value>) -> Vec<String> {
    match answer {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        _ => Vec::new(),
    }
}

/// Step-based marking: each step in the right position earns
/// `max_marks / steps`.
fn grade_ordering(question: &Question, answer: Option<&Value>, correct_order: &[String]) -> GradingResult {
    let user_order = ordering_answers(answer);
    let total_steps = correct_order.len();
    let max_marks = question.max_marks_or(total_steps as u32);
    let marks_per_step = if total_steps > 0 {
        f64::from(max_marks) / total_steps as f64
    } else {
        0.0
    };

    let detailed_results: Vec<StepResult> = correct_order
        .iter()
        .enumerate()
        .map(|(index, expected)| {
            let user_step = user_order.get(index).map(|s| s.trim()).unwrap_or_default();
            let is_correct = user_step == expected.trim();
            StepResult {
                step_position: index + 1,
                user_answer: if user_step.is_empty() {
                    "Not provided".to_string()
                } else {
                    user_step.to_string()
                },
                correct_answer: expected.clone(),
                is_correct,
                marks_awarded: if is_correct { marks_per_step } else { 0.0 },
                marks_available: marks_per_step,
            }
        })
        .collect();

    let correct_count = detailed_results.iter().filter(|s| s.is_correct).count();
    let marks_awarded = correct_count as f64 * marks_per_step;
    let percentage = if total_steps > 0 {
        correct_count as f64 / total_steps as f64
    } else {
        0.0
    };

    let mut result = base_result(
        question,
        QuestionFormat::DragAndDrop,
        Value::Array(user_order.iter().cloned().map(Value::String).collect()),
        max_marks,
    );
    result.is_correct = total_steps > 0 && marks_awarded >= f64::from(max_marks) * PASS_THRESHOLD;
    result.marks_awarded = marks_awarded;
    result.detail = Some(GradingDetail::Ordering(OrderingDetail {
        sub_format: SubFormat::Ordering,
        explanation: format!(
            "Each correct step awards {marks_per_step:.2} marks. Total: {correct_count}/{total_steps} steps correct."
        ),
        user_answers: user_order,
        correct_order: correct_order.to_vec(),
        correct_count,
        total_steps,
        marks_per_step,
        percentage,
        detailed_results,
        marking_method: "step-based".to_string(),
    }));
    result
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    value.filter(|v| !v.is_null()).map(|v| value_text(v).trim().to_string())
}

fn matching_answers(answer: Option<&Value>) -> Vec<MatchEntry> {
    match answer {
        Some(Value::String(s)) => s
            .split(',')
            .map(|pair| {
                let mut parts = pair.split(':');
                MatchEntry::Pair {
                    target: parts.next().map(|t| t.trim().to_string()),
                    item: parts.next().map(|i| i.trim().to_string()),
                }
            })
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => MatchEntry::Pair {
                    target: optional_text(map.get("target")),
                    item: optional_text(map.get("item")),
                },
                other => MatchEntry::Item(value_text(other)),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Each target takes the entry naming it, else the entry at its index.
fn grade_matching(question: &Question, answer: Option<&Value>, targets: &[DragTarget]) -> GradingResult {
    let entries = matching_answers(answer);

    let detailed_results: Vec<TargetResult> = targets
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let entry = entries
                .iter()
                .find(|e| e.is_for(&target.id))
                .or_else(|| entries.get(index));
            let user_item = entry.and_then(MatchEntry::item).map(|s| s.trim().to_string());
            let expected = target.correct_pair.as_deref().map(str::trim);
            let is_correct = matches!((user_item.as_deref(), expected), (Some(u), Some(e)) if u == e);
            TargetResult {
                target_id: if target.id.is_empty() {
                    index.to_string()
                } else {
                    target.id.clone()
                },
                target_text: target.label.clone(),
                user_answer: user_item,
                correct_answer: target.correct_pair.clone(),
                is_correct,
            }
        })
        .collect();

    let total_targets = targets.len();
    let correct_count = detailed_results.iter().filter(|t| t.is_correct).count();
    let percentage = if total_targets > 0 {
        correct_count as f64 / total_targets as f64
    } else {
        0.0
    };
    let max_marks = question.max_marks_or(total_targets as u32);

    let mut result = base_result(
        question,
        QuestionFormat::DragAndDrop,
        answer.cloned().unwrap_or(Value::Null),
        max_marks,
    );
    result.is_correct = total_targets > 0 && percentage >= PASS_THRESHOLD;
    result.marks_awarded = (f64::from(max_marks) * percentage).round();
    result.detail = Some(GradingDetail::Matching(MatchingDetail {
        sub_format: SubFormat::Matching,
        user_answers: entries,
        correct_count,
        total_targets,
        percentage,
        detailed_results,
    }));
    result
}

fn grade_blanks(question: &Question, answer: Option<&Value>, correct_answers: &[String]) -> GradingResult {
    let user_answers: Vec<Value> = match answer {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let detailed_results: Vec<BlankResult> = correct_answers
        .iter()
        .enumerate()
        .map(|(index, expected)| {
            let user = user_answers.get(index).cloned().unwrap_or(Value::Null);
            let is_correct = value_text(&user).trim().to_lowercase() == expected.trim().to_lowercase();
            BlankResult {
                blank_index: index,
                user_answer: user,
                correct_answer: expected.clone(),
                is_correct,
            }
        })
        .collect();

    let total_blanks = correct_answers.len();
    let correct_count = detailed_results.iter().filter(|b| b.is_correct).count();
    let percentage = if total_blanks > 0 {
        correct_count as f64 / total_blanks as f64
    } else {
        0.0
    };
    let max_marks = question.max_marks_or(total_blanks as u32);

    let mut result = base_result(
        question,
        QuestionFormat::FillInBlanks,
        Value::Array(user_answers.clone()),
        max_marks,
    );
    result.is_correct = total_blanks > 0 && percentage >= PASS_THRESHOLD;
    result.marks_awarded = (f64::from(max_marks) * percentage).round();
    result.detail = Some(GradingDetail::Blanks(BlanksDetail {
        user_answers,
        correct_count,
        total_blanks,
        percentage,
        detailed_results,
    }));
    result
}

fn short_answer_feedback(answer_type: AnswerType, is_correct: bool) -> &'static str {
    match (answer_type, is_correct) {
        (AnswerType::Numerical, true) => "Correct numerical answer",
        (AnswerType::Numerical, false) => "Incorrect numerical value",
        (AnswerType::Coordinates, true) => "Correct coordinates",
        (AnswerType::Coordinates, false) => "Incorrect coordinate values",
        (AnswerType::DomainRange, true) => "Correct domain/range",
        (AnswerType::DomainRange, false) => "Incorrect domain/range notation",
        (AnswerType::Algebraic, true) => "Correct algebraic expression",
        (AnswerType::Algebraic, false) => "Incorrect algebraic form",
        (AnswerType::Text, true) => "Correct answer",
        (AnswerType::Text, false) => "Answer does not match expected response",
    }
}

fn grade_short_answer(question: &Question, answer: Option<&Value>, spec: &ShortAnswerSpec) -> GradingResult {
    let max_marks = question.max_marks_or(1);

    let text = match answer {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        other => {
            let mut result = base_result(
                question,
                QuestionFormat::ShortAnswer,
                other.cloned().unwrap_or_else(|| Value::String(String::new())),
                max_marks,
            );
            result.feedback = Some("No answer provided".to_string());
            return result;
        }
    };

    let (is_correct, feedback) = match is_equivalent(text, spec) {
        Ok(verdict) => (verdict, short_answer_feedback(spec.answer_type, verdict)),
        Err(EquivalenceError::MissingCorrectAnswer) => {
            tracing::warn!(question = %question.id, "short answer has no correct answer");
            (false, "Error processing answer")
        }
    };

    let mut result = base_result(
        question,
        QuestionFormat::ShortAnswer,
        Value::String(text.to_string()),
        max_marks,
    );
    result.is_correct = is_correct;
    result.marks_awarded = if is_correct { f64::from(max_marks) } else { 0.0 };
    result.feedback = Some(feedback.to_string());
    result.detail = Some(GradingDetail::ShortAnswer(ShortAnswerDetail {
        answer_type: spec.answer_type,
        accepted_variations: spec.variations.clone(),
        case_sensitive: spec.case_sensitive,
        tolerance: spec.tolerance,
    }));
    result
}
