//! JSON question-bank files.
//!
//! A bank is a single JSON document:
//!
//! ```json
//! {
//!   "questions": [ { "id": "q1", "subject": "mathematics", ... } ],
//!   "blueprints": { "mathematics_p1_gr12": { "topics": { ... }, ... } }
//! }
//! ```
//!
//! Questions use the same flat camelCase record as the document store.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use paperforge_core::model::{Blueprint, Question};
use paperforge_core::submission::SavedResult;
use paperforge_core::traits::{QuestionFilter, QuestionRepository, ResultSink};

use crate::error::StoreError;
use crate::memory::InMemoryStore;

/// Contents of a question-bank file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub blueprints: BTreeMap<String, Blueprint>,
}

/// Read and parse a bank. Duplicate question ids are rejected.
pub fn load_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;
    let bank: QuestionBank = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse question bank: {}", path.display()))?;

    let mut seen = HashSet::new();
    for question in &bank.questions {
        if question.id.trim().is_empty() {
            return Err(StoreError::InvalidBank {
                path: path.display().to_string(),
                message: "question without an id".into(),
            }
            .into());
        }
        if !seen.insert(question.id.as_str()) {
            return Err(StoreError::InvalidBank {
                path: path.display().to_string(),
                message: format!("duplicate question id {}", question.id),
            }
            .into());
        }
    }

    tracing::debug!(
        path = %path.display(),
        questions = bank.questions.len(),
        blueprints = bank.blueprints.len(),
        "question bank loaded"
    );
    Ok(bank)
}

/// Write a bank as pretty-printed JSON.
pub fn save_bank(path: &Path, bank: &QuestionBank) -> Result<()> {
    let content = serde_json::to_string_pretty(bank).context("failed to serialize question bank")?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write question bank: {}", path.display()))
}

/// A read-only store backed by a bank file, loaded once on open.
pub struct FileStore {
    path: PathBuf,
    inner: InMemoryStore,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bank = load_bank(&path)?;
        Ok(Self::from_bank(path, bank))
    }

    pub fn from_bank(path: PathBuf, bank: QuestionBank) -> Self {
        let mut inner = InMemoryStore::with_questions(bank.questions);
        for (id, blueprint) in bank.blueprints {
            inner.insert_blueprint(id, blueprint);
        }
        Self { path, inner }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn questions(&self) -> &[Question] {
        self.inner.questions()
    }

    /// Blueprints sorted by id.
    pub fn blueprints(&self) -> BTreeMap<&str, &Blueprint> {
        self.inner
            .blueprints()
            .iter()
            .map(|(id, bp)| (id.as_str(), bp))
            .collect()
    }
}

#[async_trait]
impl QuestionRepository for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn query_questions(&self, filter: &QuestionFilter) -> anyhow::Result<Vec<Question>> {
        self.inner.query_questions(filter).await
    }

    async fn get_questions_by_id(&self, ids: &[String]) -> anyhow::Result<Vec<Question>> {
        self.inner.get_questions_by_id(ids).await
    }

    async fn get_blueprint(&self, id: &str) -> anyhow::Result<Blueprint> {
        self.inner.get_blueprint(id).await
    }
}

/// Appends every saved result to a JSON-lines file.
pub struct JsonlResultSink {
    path: PathBuf,
}

impl JsonlResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonlResultSink {
    async fn save_result(&self, user_id: &str, result: &SavedResult) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(result).context("failed to serialize result")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush().await?;

        tracing::debug!(user = user_id, path = %self.path.display(), "result appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperforge_core::model::Family;
    use paperforge_core::request::{GradeResponse, GradingMetadata};
    use paperforge_core::statistics::TestStatistics;
    use serde_json::json;

    fn bank_json() -> serde_json::Value {
        json!({
            "questions": [
                {
                    "id": "q1",
                    "subject": "mathematics",
                    "grade": 12,
                    "topic": "Algebra",
                    "cognitiveLevel": "Level 2",
                    "format": "multiple-choice",
                    "options": ["A", "B"],
                    "correctAnswer": "B",
                    "maxMarks": 3
                },
                {
                    "id": "p1",
                    "subject": "mathematics",
                    "grade": 12,
                    "topic": "Algebra",
                    "isParent": true,
                    "childQuestionIds": ["c1"]
                },
                {
                    "id": "c1",
                    "subject": "mathematics",
                    "grade": 12,
                    "topic": "Algebra",
                    "format": "short_answer",
                    "correctAnswer": "4",
                    "answerType": "numerical",
                    "parentQuestionId": "p1",
                    "maxMarks": 2
                }
            ],
            "blueprints": {
                "mathematics_p1_gr12": {
                    "topics": {"Algebra": 5},
                    "cognitiveLevels": {"Level 1": 0.5, "Level 2": 0.5},
                    "totalMarks": 5
                }
            }
        })
    }

    fn write_bank(dir: &tempfile::TempDir, value: &serde_json::Value) -> PathBuf {
        let path = dir.path().join("bank.json");
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn open_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(write_bank(&dir, &bank_json())).unwrap();
        assert_eq!(store.questions().len(), 3);
        assert_eq!(store.name(), "file");

        let found = store
            .query_questions(&QuestionFilter::new("mathematics", 12).with_level("Level 2"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "q1");

        let blueprint = store.get_blueprint("mathematics_p1_gr12").await.unwrap();
        assert_eq!(blueprint.topics["Algebra"], 5);

        let child = store.get_questions_by_id(&["c1".to_string()]).await.unwrap();
        assert!(matches!(child[0].family, Family::Child { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bank = bank_json();
        let first = bank["questions"][0].clone();
        bank["questions"].as_array_mut().unwrap().push(first);
        let err = FileStore::open(write_bank(&dir, &bank)).err().unwrap();
        assert!(format!("{err:#}").contains("duplicate question id q1"));
    }

    #[test]
    fn missing_file_has_context() {
        let err = load_bank(Path::new("/nonexistent/bank.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read question bank"));
    }

    #[test]
    fn save_then_load_keeps_questions() {
        let dir = tempfile::tempdir().unwrap();
        let original = load_bank(&write_bank(&dir, &bank_json())).unwrap();
        let copy = dir.path().join("copy.json");
        save_bank(&copy, &original).unwrap();
        assert_eq!(load_bank(&copy).unwrap(), original);
    }

    #[tokio::test]
    async fn jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlResultSink::new(dir.path().join("results").join("saved.jsonl"));
        let response = GradeResponse {
            results: vec![],
            statistics: TestStatistics::calculate(&[]),
            graded_at: "2024-06-01T08:00:00Z".into(),
        };
        let record = SavedResult::new("user-1", &response, &GradingMetadata::default());
        sink.save_result("user-1", &record).await.unwrap();
        sink.save_result("user-1", &record).await.unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let saved: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(saved["userId"], json!("user-1"));
        assert_eq!(saved["gradedAt"], json!("2024-06-01T08:00:00Z"));
    }
}
