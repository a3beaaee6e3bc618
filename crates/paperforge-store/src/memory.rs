//! In-memory store for tests and small banks.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use paperforge_core::model::{Blueprint, Question};
use paperforge_core::submission::SavedResult;
use paperforge_core::traits::{QuestionFilter, QuestionRepository, ResultSink};
use paperforge_core::PaperError;

/// A question bank held in memory.
///
/// Queries return matches in insertion order, which keeps selection
/// reproducible. Saved results are kept and can be read back.
#[derive(Default)]
pub struct InMemoryStore {
    questions: Vec<Question>,
    blueprints: HashMap<String, Blueprint>,
    results: Mutex<Vec<(String, SavedResult)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(questions: Vec<Question>) -> Self {
        Self {
            questions,
            ..Self::default()
        }
    }

    pub fn insert_question(&mut self, question: Question) {
        match self.questions.iter_mut().find(|q| q.id == question.id) {
            Some(existing) => *existing = question,
            None => self.questions.push(question),
        }
    }

    pub fn insert_blueprint(&mut self, id: impl Into<String>, blueprint: Blueprint) {
        self.blueprints.insert(id.into(), blueprint);
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn blueprints(&self) -> &HashMap<String, Blueprint> {
        &self.blueprints
    }

    /// Results saved so far, oldest first.
    pub fn saved_results(&self) -> Vec<(String, SavedResult)> {
        self.results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QuestionRepository for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query_questions(&self, filter: &QuestionFilter) -> anyhow::Result<Vec<Question>> {
        Ok(self
            .questions
            .iter()
            .filter(|q| filter.matches(q))
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn get_questions_by_id(&self, ids: &[String]) -> anyhow::Result<Vec<Question>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.questions.iter().find(|q| &q.id == id))
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

#[async_trait]
impl ResultSink for InMemoryStore {
    async fn save_result(&self, user_id: &str, result: &SavedResult) -> anyhow::Result<()> {
        self.results
            .lock()
            .map_err(|_| anyhow::anyhow!("result store poisoned"))?
            .push((user_id.to_string(), result.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperforge_core::model::QuestionRecord;
    use paperforge_core::ErrorKind;

    fn question(id: &str, topic: &str, level: &str, marks: u32) -> Question {
        Question::from(QuestionRecord {
            id: id.into(),
            subject: "mathematics".into(),
            grade: Some(12),
            topic: topic.into(),
            cognitive_level: Some(level.into()),
            format: Some("mcq".into()),
            correct_answer: Some("A".into()),
            max_marks: Some(marks),
            ..QuestionRecord::default()
        })
    }

    #[tokio::test]
    async fn query_filters_and_limits() {
        let store = InMemoryStore::with_questions(vec![
            question("a", "Algebra", "Level 1", 2),
            question("b", "Algebra", "Level 2", 3),
            question("c", "Geometry", "Level 1", 4),
            question("d", "Algebra", "Level 1", 5),
        ]);
        let filter = QuestionFilter::new("mathematics", 12).with_topic("Algebra");
        let found = store.query_questions(&filter).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);

        let found = store
            .query_questions(&filter.clone().with_level("Level 1").with_limit(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[tokio::test]
    async fn ids_that_do_not_exist_are_absent() {
        let store = InMemoryStore::with_questions(vec![question("a", "Algebra", "Level 1", 2)]);
        let found = store
            .get_questions_by_id(&["a".to_string(), "zz".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn missing_blueprint_is_not_found() {
        let mut store = InMemoryStore::new();
        store.insert_blueprint("mathematics_p1_gr12", Blueprint::default());
        assert!(store.get_blueprint("mathematics_p1_gr12").await.is_ok());
        let err = store.get_blueprint("physics_p1_gr12").await.unwrap_err();
        assert_eq!(PaperError::kind_of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn insert_replaces_by_id() {
        let mut store = InMemoryStore::new();
        store.insert_question(question("a", "Algebra", "Level 1", 2));
        store.insert_question(question("a", "Algebra", "Level 1", 7));
        assert_eq!(store.questions().len(), 1);
        assert_eq!(store.questions()[0].mark_value(), 7);
    }
}
