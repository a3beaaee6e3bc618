//! Core data model types for paperforge.
//!
//! Questions arrive from the document store as flat camelCase records
//! ([`QuestionRecord`]). They are converted on deserialization into
//! [`Question`], whose [`QuestionBody`] carries only the fields its format
//! needs, and whose [`Family`] makes the parent/child relation explicit.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cognitive level assumed for questions that carry none.
pub const DEFAULT_COGNITIVE_LEVEL: &str = "Level 1";

/// A single question from the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "QuestionRecord", into = "QuestionRecord")]
pub struct Question {
    pub id: String,
    pub subject: String,
    pub grade: Option<u32>,
    pub topic: String,
    pub paper: Option<String>,
    pub year: Option<i32>,
    pub season: Option<String>,
    pub cognitive_level: String,
    pub difficulty: Option<String>,
    pub max_marks: Option<u32>,
    pub marks: Option<u32>,
    pub body: QuestionBody,
    pub family: Family,
    pub question_text: Option<String>,
    pub image_url: Option<String>,
    pub explanation: Option<String>,
    /// Past-paper question number such as `"3.2.1"`.
    pub pqp_number: Option<String>,
    /// Shared context copied in from the parent by enrichment.
    pub parent_context: Option<ParentContext>,
}

impl Question {
    /// Mark value used for selection: `maxMarks`, else `marks`, else 0.
    pub fn mark_value(&self) -> u32 {
        self.max_marks
            .filter(|m| *m > 0)
            .or(self.marks.filter(|m| *m > 0))
            .unwrap_or(0)
    }

    /// Mark value used for grading, with a format-specific fallback.
    pub fn max_marks_or(&self, fallback: u32) -> u32 {
        match self.mark_value() {
            0 => fallback,
            m => m,
        }
    }

    pub fn is_parent(&self) -> bool {
        matches!(self.family, Family::Parent { .. })
    }

    pub fn parent_id(&self) -> Option<&str> {
        match &self.family {
            Family::Child { parent_id, .. } => Some(parent_id),
            _ => None,
        }
    }
}

/// Parent/child relation of a question.
///
/// A parent is a non-answerable context document; a child inherits the
/// parent's text and (optionally) image. A record is never both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Family {
    #[default]
    Standalone,
    Parent {
        children: Vec<String>,
    },
    Child {
        parent_id: String,
        uses_parent_image: bool,
    },
}

/// Shared context attached to a child question.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pqp_number: Option<String>,
}

/// Format-specific payload of a question.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionBody {
    MultipleChoice {
        options: Vec<Value>,
        correct_answer: Option<String>,
    },
    TrueFalse {
        correct_answer: Option<String>,
    },
    /// Drag-and-drop where the items must be put in sequence.
    Ordering {
        drag_items: Vec<Value>,
        correct_order: Vec<String>,
    },
    /// Drag-and-drop where each item is dropped on a target.
    Matching {
        drag_items: Vec<Value>,
        targets: Vec<DragTarget>,
    },
    FillInBlanks {
        correct_answers: Vec<String>,
    },
    ShortAnswer(ShortAnswerSpec),
    /// A format tag the grader does not know; graded as multiple choice.
    Unrecognized {
        format: String,
        options: Vec<Value>,
        correct_answer: Option<String>,
    },
}

impl QuestionBody {
    pub fn format(&self) -> QuestionFormat {
        match self {
            QuestionBody::MultipleChoice { .. } => QuestionFormat::MultipleChoice,
            QuestionBody::TrueFalse { .. } => QuestionFormat::TrueFalse,
            QuestionBody::Ordering { .. } | QuestionBody::Matching { .. } => {
                QuestionFormat::DragAndDrop
            }
            QuestionBody::FillInBlanks { .. } => QuestionFormat::FillInBlanks,
            QuestionBody::ShortAnswer(_) => QuestionFormat::ShortAnswer,
            QuestionBody::Unrecognized { .. } => QuestionFormat::Unrecognized,
        }
    }
}

/// Normalized question format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionFormat {
    MultipleChoice,
    TrueFalse,
    DragAndDrop,
    FillInBlanks,
    ShortAnswer,
    Unrecognized,
}

impl QuestionFormat {
    /// Parse a raw format tag. Matching ignores case, `-` and `_`.
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "multiplechoice" | "mcq" => QuestionFormat::MultipleChoice,
            "truefalse" => QuestionFormat::TrueFalse,
            "draganddrop" | "dragdrop" => QuestionFormat::DragAndDrop,
            "fillinblanks" => QuestionFormat::FillInBlanks,
            "shortanswer" => QuestionFormat::ShortAnswer,
            _ => QuestionFormat::Unrecognized,
        }
    }

    /// Canonical tag written back to records.
    pub fn tag(&self) -> &'static str {
        match self {
            QuestionFormat::MultipleChoice | QuestionFormat::Unrecognized => "multipleChoice",
            QuestionFormat::TrueFalse => "trueFalse",
            QuestionFormat::DragAndDrop => "dragAndDrop",
            QuestionFormat::FillInBlanks => "fillInBlanks",
            QuestionFormat::ShortAnswer => "short_answer",
        }
    }
}

impl fmt::Display for QuestionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A drop target of a matching question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragTarget {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "text", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, alias = "correctAnswer", skip_serializing_if = "Option::is_none")]
    pub correct_pair: Option<String>,
}

/// Free-text answer specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortAnswerSpec {
    pub answer_type: AnswerType,
    pub correct_answer: Option<String>,
    pub variations: Vec<String>,
    pub tolerance: f64,
    pub case_sensitive: bool,
}

impl Default for ShortAnswerSpec {
    fn default() -> Self {
        Self {
            answer_type: AnswerType::Text,
            correct_answer: None,
            variations: Vec::new(),
            tolerance: 0.0,
            case_sensitive: false,
        }
    }
}

/// How a short answer is compared against the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    #[default]
    Text,
    Numerical,
    Coordinates,
    DomainRange,
    #[serde(alias = "equation")]
    Algebraic,
}

impl AnswerType {
    /// Parse a raw answer type; unknown values fall back to `Text`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "numerical" => AnswerType::Numerical,
            "coordinates" => AnswerType::Coordinates,
            "domain_range" => AnswerType::DomainRange,
            "equation" | "algebraic" => AnswerType::Algebraic,
            _ => AnswerType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Text => "text",
            AnswerType::Numerical => "numerical",
            AnswerType::Coordinates => "coordinates",
            AnswerType::DomainRange => "domain_range",
            AnswerType::Algebraic => "algebraic",
        }
    }
}

/// Topic name to target marks, in the order the blueprint lists them.
pub type TopicMarks = IndexMap<String, u32>;

/// Target distribution a generated paper should approximate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Topics are fitted and joined in this order.
    #[serde(default)]
    pub topics: TopicMarks,
    /// Cognitive level to target fraction of the question count.
    #[serde(default)]
    pub cognitive_levels: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_marks: Option<u32>,
}

/// Mark total of a full-length paper when the blueprint does not say.
pub const FULL_PAPER_MARKS: u32 = 150;
/// Duration in minutes of a full-length paper.
pub const FULL_PAPER_MINUTES: u32 = 150;

impl Blueprint {
    /// Sum of the per-topic targets.
    pub fn topic_marks_total(&self) -> u32 {
        self.topics.values().sum()
    }

    /// Scale every topic target by `ratio`, flooring each at 2 marks.
    pub fn scaled(&self, ratio: f64) -> Blueprint {
        let topics: TopicMarks = self
            .topics
            .iter()
            .map(|(topic, marks)| {
                let scaled = (f64::from(*marks) * ratio).round().max(0.0) as u32;
                (topic.clone(), scaled.max(2))
            })
            .collect();
        let total = topics.values().sum();
        Blueprint {
            id: self.id.clone(),
            topics,
            cognitive_levels: self.cognitive_levels.clone(),
            total_marks: Some(total),
        }
    }

    /// Quick-practice variant sized for `minutes` of a full paper.
    pub fn scaled_for_duration(&self, minutes: u32) -> Blueprint {
        let base = self
            .total_marks
            .filter(|m| *m > 0)
            .unwrap_or(FULL_PAPER_MARKS);
        let target = (f64::from(base) * f64::from(minutes) / f64::from(FULL_PAPER_MINUTES))
            .round()
            .max(10.0);
        self.scaled(target / f64::from(base))
    }

    /// Required question count per cognitive level for a paper of
    /// `question_count` questions.
    pub fn required_level_counts(&self, question_count: usize) -> BTreeMap<String, u32> {
        self.cognitive_levels
            .iter()
            .map(|(level, fraction)| {
                let count = (question_count as f64 * fraction).round().max(0.0) as u32;
                (level.clone(), count)
            })
            .collect()
    }

    /// Document id of the blueprint for a subject, paper and grade.
    pub fn id_for(subject: &str, paper: Option<&str>, grade: u32) -> String {
        format!("{subject}_{}_gr{grade}", normalize_paper(paper)).to_lowercase()
    }
}

/// Normalize a paper label: `"Paper 1"`, `"paper1"` and `"1"` all become `"p1"`.
pub fn normalize_paper(paper: Option<&str>) -> String {
    let Some(raw) = paper else {
        return "p1".to_string();
    };
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return "p1".to_string();
    }
    let compact: String = lowered
        .replace("paper", "p")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.starts_with('p') {
        compact
    } else {
        format!("p{compact}")
    }
}

/// A question placed in a paper, annotated with the blueprint slot it fills.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedQuestion {
    pub question: Question,
    pub allocated_topic: String,
    pub allocated_marks: u32,
}

impl SelectedQuestion {
    pub fn new(question: Question, allocated_topic: impl Into<String>, allocated_marks: u32) -> Self {
        Self {
            question,
            allocated_topic: allocated_topic.into(),
            allocated_marks,
        }
    }

    pub fn marks(&self) -> u32 {
        self.question.mark_value()
    }

    pub fn level(&self) -> &str {
        &self.question.cognitive_level
    }
}

// ---------------------------------------------------------------------------
// Wire record
// ---------------------------------------------------------------------------

/// Past-paper metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PqpData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_number: Option<String>,
}

/// Flat document-store representation of a question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<u32>,
    #[serde(default)]
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, alias = "questionType", skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answer_variations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drag_items: Vec<Value>,
    #[serde(default, alias = "dropTargets", skip_serializing_if = "Vec::is_empty")]
    pub drag_targets: Vec<DragTarget>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correct_order: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correct_answers: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_marks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_parent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_question_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uses_parent_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pqp_data: Option<PqpData>,
    /// Legacy location of the past-paper number; read only.
    #[serde(default, skip_serializing)]
    pub question_number: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_context: Option<ParentContext>,
}

/// Render a JSON scalar the way answers are compared: strings as-is,
/// `null` as empty, everything else through its JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn short_answer_spec(record: &QuestionRecord) -> ShortAnswerSpec {
    let (correct_answer, nested_variations) = match &record.correct_answer {
        Some(Value::Object(map)) => {
            let answer = map.get("answer").map(value_text);
            let variations: Vec<String> = map
                .get("variations")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(value_text).collect())
                .unwrap_or_default();
            (answer, variations)
        }
        Some(other) => (Some(value_text(other)), Vec::new()),
        None => (None, Vec::new()),
    };
    let variations = if nested_variations.is_empty() {
        record.answer_variations.clone()
    } else {
        nested_variations
    };
    ShortAnswerSpec {
        answer_type: record
            .answer_type
            .as_deref()
            .map(AnswerType::parse)
            .unwrap_or_default(),
        correct_answer: non_empty(correct_answer),
        variations,
        tolerance: record.tolerance.unwrap_or(0.0).max(0.0),
        case_sensitive: record.case_sensitive.unwrap_or(false),
    }
}

impl From<QuestionRecord> for Question {
    fn from(record: QuestionRecord) -> Self {
        let raw_format = record
            .format
            .clone()
            .unwrap_or_else(|| "multipleChoice".to_string());
        let correct_text = record.correct_answer.as_ref().map(value_text);

        let body = match QuestionFormat::parse(&raw_format) {
            QuestionFormat::MultipleChoice => QuestionBody::MultipleChoice {
                options: record.options.clone(),
                correct_answer: correct_text,
            },
            QuestionFormat::TrueFalse => QuestionBody::TrueFalse {
                correct_answer: correct_text,
            },
            QuestionFormat::DragAndDrop if !record.correct_order.is_empty() => {
                QuestionBody::Ordering {
                    drag_items: record.drag_items.clone(),
                    correct_order: record.correct_order.iter().map(value_text).collect(),
                }
            }
            QuestionFormat::DragAndDrop => QuestionBody::Matching {
                drag_items: record.drag_items.clone(),
                targets: record.drag_targets.clone(),
            },
            QuestionFormat::FillInBlanks => QuestionBody::FillInBlanks {
                correct_answers: record.correct_answers.iter().map(value_text).collect(),
            },
            QuestionFormat::ShortAnswer => QuestionBody::ShortAnswer(short_answer_spec(&record)),
            QuestionFormat::Unrecognized => QuestionBody::Unrecognized {
                format: raw_format,
                options: record.options.clone(),
                correct_answer: correct_text,
            },
        };

        let family = if record.is_parent {
            Family::Parent {
                children: record.child_question_ids,
            }
        } else if let Some(parent_id) = non_empty(record.parent_question_id) {
            Family::Child {
                parent_id,
                uses_parent_image: record.uses_parent_image,
            }
        } else {
            Family::Standalone
        };

        let pqp_number = record
            .pqp_data
            .and_then(|p| p.question_number)
            .or_else(|| record.question_number.as_ref().map(value_text))
            .and_then(|n| non_empty(Some(n)));

        Question {
            id: record.id,
            subject: record.subject,
            grade: record.grade,
            topic: record.topic,
            paper: record.paper,
            year: record.year,
            season: record.season,
            cognitive_level: non_empty(record.cognitive_level)
                .unwrap_or_else(|| DEFAULT_COGNITIVE_LEVEL.to_string()),
            difficulty: record.difficulty,
            max_marks: record.max_marks,
            marks: record.marks,
            body,
            family,
            question_text: record.question_text,
            image_url: record.image_url,
            explanation: record.explanation,
            pqp_number,
            parent_context: record.parent_context,
        }
    }
}

impl From<Question> for QuestionRecord {
    fn from(question: Question) -> Self {
        let mut record = QuestionRecord {
            id: question.id,
            subject: question.subject,
            grade: question.grade,
            topic: question.topic,
            paper: question.paper,
            year: question.year,
            season: question.season,
            cognitive_level: Some(question.cognitive_level),
            difficulty: question.difficulty,
            format: Some(question.body.format().tag().to_string()),
            question_text: question.question_text,
            image_url: question.image_url,
            marks: question.marks,
            max_marks: question.max_marks,
            explanation: question.explanation,
            pqp_data: question.pqp_number.map(|n| PqpData {
                question_number: Some(n),
            }),
            parent_context: question.parent_context,
            ..QuestionRecord::default()
        };

        match question.body {
            QuestionBody::MultipleChoice {
                options,
                correct_answer,
            } => {
                record.options = options;
                record.correct_answer = correct_answer.map(Value::String);
            }
            QuestionBody::TrueFalse { correct_answer } => {
                record.correct_answer = correct_answer.map(Value::String);
            }
            QuestionBody::Ordering {
                drag_items,
                correct_order,
            } => {
                record.drag_items = drag_items;
                record.correct_order = correct_order.into_iter().map(Value::String).collect();
            }
            QuestionBody::Matching {
                drag_items,
                targets,
            } => {
                record.drag_items = drag_items;
                record.drag_targets = targets;
            }
            QuestionBody::FillInBlanks { correct_answers } => {
                record.correct_answers = correct_answers.into_iter().map(Value::String).collect();
            }
            QuestionBody::ShortAnswer(spec) => {
                record.answer_type = Some(spec.answer_type.as_str().to_string());
                record.correct_answer = spec.correct_answer.map(Value::String);
                record.answer_variations = spec.variations;
                record.tolerance = (spec.tolerance > 0.0).then_some(spec.tolerance);
                record.case_sensitive = spec.case_sensitive.then_some(true);
            }
            QuestionBody::Unrecognized {
                format,
                options,
                correct_answer,
            } => {
                record.format = Some(format);
                record.options = options;
                record.correct_answer = correct_answer.map(Value::String);
            }
        }

        match question.family {
            Family::Standalone => {}
            Family::Parent { children } => {
                record.is_parent = true;
                record.child_question_ids = children;
            }
            Family::Child {
                parent_id,
                uses_parent_image,
            } => {
                record.parent_question_id = Some(parent_id);
                record.uses_parent_image = uses_parent_image;
            }
        }

        record
    }
}
