//! Storage seams.
//!
//! The core never talks to a database directly. Question banks implement
//! [`QuestionRepository`]; graded results are handed to a [`ResultSink`].
//! Concrete stores live in the `paperforge-store` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Blueprint, Question};
use crate::submission::SavedResult;

// ---------------------------------------------------------------------------
// Question repository
// ---------------------------------------------------------------------------

/// Read-only access to questions and blueprints.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Human-readable store name (e.g. "memory").
    fn name(&self) -> &str;

    /// Equality-filtered query. Parent filtering is left to the caller.
    async fn query_questions(&self, filter: &QuestionFilter) -> anyhow::Result<Vec<Question>>;

    /// Fetch questions by id. Ids that do not exist are silently absent.
    async fn get_questions_by_id(&self, ids: &[String]) -> anyhow::Result<Vec<Question>>;

    /// Fetch a blueprint, failing with `PaperError::NotFound` when absent.
    async fn get_blueprint(&self, id: &str) -> anyhow::Result<Blueprint>;
}

/// Equality filters for [`QuestionRepository::query_questions`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFilter {
    pub subject: String,
    pub grade: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_level: Option<String>,
    pub limit: usize,
}

impl QuestionFilter {
    pub fn new(subject: impl Into<String>, grade: u32) -> Self {
        Self {
            subject: subject.into(),
            grade,
            limit: 50,
            ..Self::default()
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.cognitive_level = Some(level.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether `question` passes every equality filter (the limit is not
    /// considered). Used by in-process stores.
    pub fn matches(&self, question: &Question) -> bool {
        fn eq_opt(want: &Option<String>, have: Option<&str>) -> bool {
            want.as_deref().map_or(true, |w| have == Some(w))
        }

        question.subject == self.subject
            && question.grade == Some(self.grade)
            && eq_opt(&self.paper, question.paper.as_deref())
            && self.year.map_or(true, |y| question.year == Some(y))
            && eq_opt(&self.season, question.season.as_deref())
            && eq_opt(&self.topic, Some(question.topic.as_str()))
            && eq_opt(&self.cognitive_level, Some(question.cognitive_level.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Result sink
// ---------------------------------------------------------------------------

/// Persistence for graded results. Failures are logged by the caller and
/// never affect the grading response.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn save_result(&self, user_id: &str, result: &SavedResult) -> anyhow::Result<()>;
}

/// A sink that drops everything.
pub struct DiscardSink;

#[async_trait]
impl ResultSink for DiscardSink {
    async fn save_result(&self, _: &str, _: &SavedResult) -> anyhow::Result<()> {
        Ok(())
    }
}
