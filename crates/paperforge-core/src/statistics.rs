//! Aggregate statistics over graded results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grading::GradingResult;
use crate::request::GradingMetadata;

/// Mode recorded when the caller does not name one.
pub const DEFAULT_MODE: &str = "Practice";

/// Letter grade for a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// 90+ is A+, then 10-point bands down to D at 50; below that is F.
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            90.. => LetterGrade::APlus,
            80..=89 => LetterGrade::A,
            70..=79 => LetterGrade::B,
            60..=69 => LetterGrade::C,
            50..=59 => LetterGrade::D,
            _ => LetterGrade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Totals for a graded submission, merged with the session metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStatistics {
    pub total_questions: usize,
    pub correct_questions: usize,
    pub total_marks: u32,
    pub marks_awarded: f64,
    /// Rounded share of marks awarded, 0–100.
    pub percentage: u32,
    pub grade: LetterGrade,
    /// Rounded share of questions answered correctly, 0–100.
    pub accuracy: u32,
    pub subject: Option<String>,
    pub paper: Option<String>,
    pub mode: String,
    pub duration_minutes: Option<u32>,
    pub session_duration_seconds: Option<u64>,
}

fn rounded_percent(part: f64, whole: f64) -> u32 {
    if whole > 0.0 {
        (part / whole * 100.0).round().max(0.0) as u32
    } else {
        0
    }
}

impl TestStatistics {
    pub fn calculate(results: &[GradingResult]) -> Self {
        let total_questions = results.len();
        let correct_questions = results.iter().filter(|r| r.is_correct).count();
        let total_marks: u32 = results.iter().map(|r| r.max_marks).sum();
        let marks_awarded: f64 = results.iter().map(|r| r.marks_awarded).sum();

        let percentage = rounded_percent(marks_awarded, f64::from(total_marks));

        Self {
            total_questions,
            correct_questions,
            total_marks,
            marks_awarded,
            percentage,
            grade: LetterGrade::from_percentage(percentage),
            accuracy: rounded_percent(correct_questions as f64, total_questions as f64),
            subject: None,
            paper: None,
            mode: DEFAULT_MODE.to_string(),
            duration_minutes: None,
            session_duration_seconds: None,
        }
    }

    /// Overlay request metadata. A caller-supplied question count replaces
    /// the number of graded results.
    pub fn with_metadata(mut self, metadata: &GradingMetadata) -> Self {
        if let Some(total) = metadata.total_questions.filter(|t| *t > 0) {
            self.total_questions = total;
        }
        self.subject = metadata.subject.clone();
        self.paper = metadata.paper.clone();
        self.mode = metadata
            .mode
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODE.to_string());
        self.duration_minutes = metadata.duration_minutes;
        self.session_duration_seconds = metadata.session_duration_seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn result(id: &str, awarded: f64, max: u32, correct: bool) -> GradingResult {
        GradingResult {
            question_id: id.to_string(),
            format: "multipleChoice".to_string(),
            user_answer: Value::Null,
            correct_answer: Value::Null,
            is_correct: correct,
            marks_awarded: awarded,
            max_marks: max,
            feedback: None,
            was_unanswered: None,
            detail: None,
        }
    }

    #[test]
    fn seventy_five_percent_is_a_b() {
        let results = vec![result("a", 50.0, 50, true), result("b", 25.0, 50, false)];
        let stats = TestStatistics::calculate(&results);
        assert_eq!(stats.total_marks, 100);
        assert_eq!(stats.marks_awarded, 75.0);
        assert_eq!(stats.percentage, 75);
        assert_eq!(stats.grade, LetterGrade::B);
        assert_eq!(stats.accuracy, 50);
        assert_eq!(stats.mode, "Practice");
    }

    #[test]
    fn grade_bands() {
        assert_eq!(LetterGrade::from_percentage(100), LetterGrade::APlus);
        assert_eq!(LetterGrade::from_percentage(90), LetterGrade::APlus);
        assert_eq!(LetterGrade::from_percentage(89), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(60), LetterGrade::C);
        assert_eq!(LetterGrade::from_percentage(50), LetterGrade::D);
        assert_eq!(LetterGrade::from_percentage(49), LetterGrade::F);
        assert_eq!(serde_json::to_string(&LetterGrade::APlus).unwrap(), "\"A+\"");
    }

    #[test]
    fn empty_results_are_zero() {
        let stats = TestStatistics::calculate(&[]);
        assert_eq!(stats.percentage, 0);
        assert_eq!(stats.accuracy, 0);
        assert_eq!(stats.grade, LetterGrade::F);
    }

    #[test]
    fn metadata_overrides() {
        let metadata = GradingMetadata {
            subject: Some("mathematics".into()),
            mode: Some("Sprint".into()),
            total_questions: Some(20),
            duration_minutes: Some(30),
            ..GradingMetadata::default()
        };
        let stats = TestStatistics::calculate(&[result("a", 2.0, 2, true)]).with_metadata(&metadata);
        assert_eq!(stats.total_questions, 20);
        assert_eq!(stats.correct_questions, 1);
        assert_eq!(stats.subject.as_deref(), Some("mathematics"));
        assert_eq!(stats.mode, "Sprint");
        assert_eq!(stats.duration_minutes, Some(30));

        let stats = TestStatistics::calculate(&[]).with_metadata(&GradingMetadata::default());
        assert_eq!(stats.mode, "Practice");
        let text = serde_json::to_string(&stats).unwrap();
        assert!(text.contains("\"subject\":null"));
    }
}
