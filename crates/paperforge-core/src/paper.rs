//! Final paper assembly: past-paper ordering, numbering, and stripping of
//! answer fields before questions leave the service.

use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{Question, QuestionRecord, SelectedQuestion};

/// A question as it appears in a generated paper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperQuestion {
    #[serde(flatten)]
    pub question: QuestionRecord,
    /// 1-based position in the paper.
    pub question_number: usize,
    pub allocated_topic: String,
    pub allocated_marks: u32,
}

/// Convert a question to its wire record with every answer field removed.
///
/// Drag-and-drop questions keep `correctOrder` and `dragItems`; the review
/// screen needs them to show the expected sequence.
pub fn sanitize(question: Question) -> QuestionRecord {
    let mut record = QuestionRecord::from(question);
    record.correct_answer = None;
    record.correct_answers.clear();
    record.answer_variations.clear();
    record.explanation = None;
    for target in &mut record.drag_targets {
        target.correct_pair = None;
    }
    record
}

/// Numeric segments of a past-paper number: `"3.2.1"` is `[3, 2, 1]`.
/// Segments that do not start with a digit count as 0.
fn pqp_segments(number: Option<&str>) -> Vec<u32> {
    number
        .map(|n| {
            n.split('.')
                .map(|segment| {
                    let digits: String = segment
                        .trim()
                        .chars()
                        .take_while(char::is_ascii_digit)
                        .collect();
                    digits.parse().unwrap_or(0)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Compare two past-paper numbers segment by segment; missing segments
/// count as 0, so `"3"` equals `"3.0"` and sorts before `"3.1"`.
pub fn compare_pqp_numbers(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = pqp_segments(a);
    let b = pqp_segments(b);
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Stable-sort by past-paper number. A selection where no question carries
/// a number is left untouched.
pub fn sort_by_pqp_number(selection: &mut [SelectedQuestion]) {
    if selection.iter().all(|s| s.question.pqp_number.is_none()) {
        return;
    }
    selection.sort_by(|a, b| {
        compare_pqp_numbers(a.question.pqp_number.as_deref(), b.question.pqp_number.as_deref())
    });
}

/// Number and sanitize the final selection.
pub fn assemble(mut selection: Vec<SelectedQuestion>, past_paper_order: bool) -> Vec<PaperQuestion> {
    if past_paper_order {
        sort_by_pqp_number(&mut selection);
    }
    selection
        .into_iter()
        .enumerate()
        .map(|(index, selected)| PaperQuestion {
            question: sanitize(selected.question),
            question_number: index + 1,
            allocated_topic: selected.allocated_topic,
            allocated_marks: selected.allocated_marks,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DragTarget, QuestionBody, ShortAnswerSpec};
    use crate::testing::{question, with_body};
    use serde_json::json;

    fn numbered(id: &str, number: Option<&str>) -> SelectedQuestion {
        let mut q = question(id, "Algebra", 2, "Level 1");
        q.pqp_number = number.map(str::to_string);
        SelectedQuestion::new(q, "Algebra", 2)
    }

    #[test]
    fn pqp_numbers_compare_numerically() {
        assert_eq!(compare_pqp_numbers(Some("3.10"), Some("3.2")), Ordering::Greater);
        assert_eq!(compare_pqp_numbers(Some("3"), Some("3.0")), Ordering::Equal);
        assert_eq!(compare_pqp_numbers(Some("3"), Some("3.1")), Ordering::Less);
        assert_eq!(compare_pqp_numbers(Some("2a.1"), Some("2.1")), Ordering::Equal);
        assert_eq!(compare_pqp_numbers(None, Some("1")), Ordering::Less);
    }

    #[test]
    fn assemble_orders_and_numbers() {
        let selection = vec![
            numbered("c", Some("10.1")),
            numbered("a", Some("2.1.2")),
            numbered("b", Some("2.1.10")),
        ];
        let paper = assemble(selection.clone(), true);
        let ids: Vec<&str> = paper.iter().map(|p| p.question.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let numbers: Vec<usize> = paper.iter().map(|p| p.question_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let paper = assemble(selection, false);
        assert_eq!(paper[0].question.id, "c");
    }

    #[test]
    fn sanitize_strips_answers() {
        let text = serde_json::to_value(sanitize(question("q1", "Algebra", 2, "Level 1"))).unwrap();
        assert!(text.get("correctAnswer").is_none());
        assert!(text.get("explanation").is_none());
        assert_eq!(text["questionText"], json!("Question q1"));

        let sa = with_body(
            question("q2", "Algebra", 2, "Level 1"),
            QuestionBody::ShortAnswer(ShortAnswerSpec {
                correct_answer: Some("4".into()),
                variations: vec!["four".into()],
                ..ShortAnswerSpec::default()
            }),
        );
        let text = serde_json::to_value(sanitize(sa)).unwrap();
        assert!(text.get("correctAnswer").is_none());
        assert!(text.get("answerVariations").is_none());
    }

    #[test]
    fn sanitize_keeps_drag_and_drop_layout() {
        let ordering = with_body(
            question("o", "Algebra", 3, "Level 1"),
            QuestionBody::Ordering {
                drag_items: vec![json!({"id": "s1", "text": "Expand"})],
                correct_order: vec!["s1".into()],
            },
        );
        let text = serde_json::to_value(sanitize(ordering)).unwrap();
        assert_eq!(text["correctOrder"], json!(["s1"]));
        assert_eq!(text["dragItems"][0]["text"], json!("Expand"));

        let matching = with_body(
            question("m", "Algebra", 3, "Level 1"),
            QuestionBody::Matching {
                drag_items: vec![],
                targets: vec![DragTarget {
                    id: "t1".into(),
                    label: Some("Root".into()),
                    correct_pair: Some("i1".into()),
                }],
            },
        );
        let text = serde_json::to_value(sanitize(matching)).unwrap();
        assert_eq!(text["dragTargets"][0], json!({"id": "t1", "label": "Root"}));
    }

    #[test]
    fn paper_question_flattens_record() {
        let paper = assemble(vec![numbered("q1", Some("1.1"))], false);
        let text = serde_json::to_value(&paper[0]).unwrap();
        assert_eq!(text["id"], json!("q1"));
        assert_eq!(text["questionNumber"], json!(1));
        assert_eq!(text["allocatedTopic"], json!("Algebra"));
        assert_eq!(text["pqpData"]["questionNumber"], json!("1.1"));
    }
}
