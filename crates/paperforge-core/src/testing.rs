//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PaperError;
use crate::model::{Blueprint, Family, Question, QuestionBody};
use crate::submission::SavedResult;
use crate::traits::{QuestionFilter, QuestionRepository, ResultSink};

/// A grade 12 mathematics multiple-choice question with answer "A".
pub fn question(id: &str, topic: &str, marks: u32, level: &str) -> Question {
    Question {
        id: id.to_string(),
        subject: "mathematics".to_string(),
        grade: Some(12),
        topic: topic.to_string(),
        paper: None,
        year: None,
        season: None,
        cognitive_level: level.to_string(),
        difficulty: None,
        max_marks: Some(marks),
        marks: None,
        body: QuestionBody::MultipleChoice {
            options: vec![],
            correct_answer: Some("A".to_string()),
        },
        family: Family::Standalone,
        question_text: Some(format!("Question {id}")),
        image_url: None,
        explanation: Some("because".to_string()),
        pqp_number: None,
        parent_context: None,
    }
}

pub fn with_body(mut q: Question, body: QuestionBody) -> Question {
    q.body = body;
    q
}

pub fn parent(id: &str, topic: &str, children: &[&str]) -> Question {
    let mut q = question(id, topic, 0, "Level 1");
    q.max_marks = None;
    q.family = Family::Parent {
        children: children.iter().map(|c| c.to_string()).collect(),
    };
    q
}

pub fn child(id: &str, topic: &str, marks: u32, parent_id: &str) -> Question {
    let mut q = question(id, topic, marks, "Level 1");
    q.family = Family::Child {
        parent_id: parent_id.to_string(),
        uses_parent_image: false,
    };
    q
}

/// In-memory repository that records how it was called.
#[derive(Default)]
pub struct FakeRepository {
    pub questions: Vec<Question>,
    pub blueprints: HashMap<String, Blueprint>,
    /// Topics whose queries fail.
    pub failing_topics: Vec<String>,
    pub queries: Mutex<Vec<QuestionFilter>>,
    pub id_calls: AtomicU32,
}

impl FakeRepository {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            ..Self::default()
        }
    }

    pub fn with_blueprint(mut self, id: &str, blueprint: Blueprint) -> Self {
        self.blueprints.insert(id.to_string(), blueprint);
        self
    }

    pub fn recorded_queries(&self) -> Vec<QuestionFilter> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionRepository for FakeRepository {
    fn name(&self) -> &str {
        "fake"
    }

    async fn query_questions(&self, filter: &QuestionFilter) -> anyhow::Result<Vec<Question>> {
        self.queries.lock().unwrap().push(filter.clone());
        if let Some(topic) = &filter.topic {
            if self.failing_topics.contains(topic) {
                anyhow::bail!("query failed for {topic}");
            }
        }
        Ok(self
            .questions
            .iter()
            .filter(|q| filter.matches(q))
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn get_questions_by_id(&self, ids: &[String]) -> anyhow::Result<Vec<Question>> {
        self.id_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .questions
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn get_blueprint(&self, id: &str) -> anyhow::Result<Blueprint> {
        self.blueprints
            .get(id)
            .cloned()
            .ok_or_else(|| PaperError::not_found(format!("blueprint {id}")).into())
    }
}

/// Sink that keeps every saved result.
#[derive(Default)]
pub struct RecordingSink {
    pub saved: Mutex<Vec<(String, SavedResult)>>,
    pub fail: bool,
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn save_result(&self, user_id: &str, result: &SavedResult) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        self.saved
            .lock()
            .unwrap()
            .push((user_id.to_string(), result.clone()));
        Ok(())
    }
}
