//! Grading orchestrator.
//!
//! Validates a [`GradeRequest`], fetches the submitted questions by id,
//! grades each answer, aggregates statistics, and hands the result to a
//! [`ResultSink`] without waiting for it.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::PaperError;
use crate::grading::{grade_question, unanswered, GradingResult, Submission};
use crate::model::Question;
use crate::request::{GradeRequest, GradeResponse, GradingMetadata};
use crate::statistics::{LetterGrade, TestStatistics};
use crate::traits::{QuestionRepository, ResultSink};

/// The record persisted for a user after grading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResult {
    pub user_id: String,
    pub subject: Option<String>,
    pub paper: Option<String>,
    pub mode: String,
    pub total_questions: usize,
    pub score: f64,
    pub total_marks: u32,
    pub percentage: u32,
    pub grade: LetterGrade,
    pub duration_minutes: Option<u32>,
    pub session_duration_seconds: Option<u64>,
    pub results: Vec<GradingResult>,
    pub statistics: TestStatistics,
    pub metadata: GradingMetadata,
    pub graded_at: String,
    pub saved_at: String,
}

impl SavedResult {
    pub fn new(user_id: &str, response: &GradeResponse, metadata: &GradingMetadata) -> Self {
        let stats = &response.statistics;
        Self {
            user_id: user_id.to_string(),
            subject: stats.subject.clone(),
            paper: stats.paper.clone(),
            mode: stats.mode.clone(),
            total_questions: stats.total_questions,
            score: stats.marks_awarded,
            total_marks: stats.total_marks,
            percentage: stats.percentage,
            grade: stats.grade,
            duration_minutes: stats.duration_minutes,
            session_duration_seconds: stats.session_duration_seconds,
            results: response.results.clone(),
            statistics: stats.clone(),
            metadata: metadata.clone(),
            graded_at: response.graded_at.clone(),
            saved_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Stateless grading over a question repository.
pub struct GradingService {
    repository: Arc<dyn QuestionRepository>,
    sink: Arc<dyn ResultSink>,
}

impl GradingService {
    pub fn new(repository: Arc<dyn QuestionRepository>, sink: Arc<dyn ResultSink>) -> Self {
        Self { repository, sink }
    }

    /// Grade a request without persisting it.
    ///
    /// Answers are graded in question-id order. Submitted ids the repository
    /// does not know are skipped with a warning; if none are known the
    /// request fails with `NotFound`.
    pub async fn grade(&self, request: &GradeRequest) -> Result<GradeResponse> {
        request.validate()?;

        let ids: Vec<String> = request.submissions.keys().cloned().collect();
        let questions = self
            .repository
            .get_questions_by_id(&ids)
            .await
            .with_context(|| format!("fetching {} questions for grading", ids.len()))?;

        if questions.len() != ids.len() {
            tracing::warn!(
                requested = ids.len(),
                found = questions.len(),
                "question count mismatch while grading"
            );
        }
        if questions.is_empty() {
            return Err(PaperError::not_found("none of the submitted questions exist").into());
        }

        let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();

        let mut results = Vec::with_capacity(by_id.len());
        for (question_id, value) in &request.submissions {
            let Some(question) = by_id.get(question_id.as_str()) else {
                tracing::warn!(question = %question_id, "missing question, skipping");
                continue;
            };
            let result = match Submission::from_value(value) {
                Some(submission) => grade_question(question, &submission),
                None => {
                    tracing::debug!(question = %question_id, "unanswered");
                    unanswered(question)
                }
            };
            results.push(result);
        }

        let statistics = TestStatistics::calculate(&results).with_metadata(&request.metadata);
        let graded_at = request
            .metadata
            .submitted_at
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());

        tracing::info!(
            graded = results.len(),
            marks = statistics.marks_awarded,
            total = statistics.total_marks,
            percentage = statistics.percentage,
            "grading complete"
        );

        Ok(GradeResponse {
            results,
            statistics,
            graded_at,
        })
    }

    /// Spawn persistence of `response` for `user_id`. Returns `None` when the
    /// user id is blank. Failures are logged and never surface to the caller.
    pub fn persist(
        &self,
        user_id: &str,
        response: &GradeResponse,
        metadata: &GradingMetadata,
    ) -> Option<JoinHandle<()>> {
        if user_id.trim().is_empty() {
            tracing::warn!("no user id, skipping result persistence");
            return None;
        }

        let record = SavedResult::new(user_id, response, metadata);
        let sink = Arc::clone(&self.sink);
        Some(tokio::spawn(async move {
            match sink.save_result(&record.user_id, &record).await {
                Ok(()) => tracing::debug!(user = %record.user_id, "results saved"),
                Err(e) => tracing::warn!(user = %record.user_id, error = %e, "failed to save results"),
            }
        }))
    }

    /// Grade and persist in the background.
    pub async fn submit(&self, request: &GradeRequest, user_id: Option<&str>) -> Result<GradeResponse> {
        let response = self.grade(request).await?;
        if let Some(user_id) = user_id {
            let _ = self.persist(user_id, &response, &request.metadata);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{question, FakeRepository, RecordingSink};
    use serde_json::{json, Value};

    fn service(sink: Arc<RecordingSink>) -> GradingService {
        let questions = vec![
            question("q1", "Algebra", 2, "Level 1"),
            question("q2", "Algebra", 3, "Level 2"),
            question("q3", "Geometry", 5, "Level 3"),
        ];
        GradingService::new(Arc::new(FakeRepository::new(questions)), sink)
    }

    fn request(pairs: &[(&str, Value)]) -> GradeRequest {
        GradeRequest {
            submissions: pairs
                .iter()
                .map(|(id, v)| (id.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            metadata: GradingMetadata {
                submitted_at: Some("2024-06-01T08:00:00Z".into()),
                ..GradingMetadata::default()
            },
        }
    }

    #[tokio::test]
    async fn grades_known_questions_and_skips_unknown() {
        let svc = service(Arc::new(RecordingSink::default()));
        let response = svc
            .grade(&request(&[
                ("q1", json!("A")),
                ("q2", json!({"answer": "b"})),
                ("q3", Value::Null),
                ("zz", json!("A")),
            ]))
            .await
            .unwrap();

        let ids: Vec<&str> = response.results.iter().map(|r| r.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);
        assert!(response.results[0].is_correct);
        assert!(!response.results[1].is_correct);
        assert_eq!(response.results[2].was_unanswered, Some(true));
        assert_eq!(response.statistics.marks_awarded, 2.0);
        assert_eq!(response.statistics.total_marks, 10);
        assert_eq!(response.statistics.percentage, 20);
        assert_eq!(response.graded_at, "2024-06-01T08:00:00Z");
    }

    #[tokio::test]
    async fn invalid_request_fails_before_fetching() {
        let svc = service(Arc::new(RecordingSink::default()));
        let err = svc.grade(&GradeRequest::default()).await.unwrap_err();
        assert_eq!(PaperError::kind_of(&err), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn unknown_questions_only_is_not_found() {
        let svc = service(Arc::new(RecordingSink::default()));
        let err = svc.grade(&request(&[("nope", json!("A"))])).await.unwrap_err();
        assert_eq!(PaperError::kind_of(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn grading_is_idempotent() {
        let svc = service(Arc::new(RecordingSink::default()));
        let req = request(&[("q1", json!("a")), ("q2", json!("C")), ("q3", json!(" A "))]);
        let first = serde_json::to_string(&svc.grade(&req).await.unwrap()).unwrap();
        let second = serde_json::to_string(&svc.grade(&req).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn persistence_runs_in_background() {
        let sink = Arc::new(RecordingSink::default());
        let svc = service(Arc::clone(&sink));
        let req = request(&[("q1", json!("A"))]);
        let response = svc.grade(&req).await.unwrap();

        assert!(svc.persist("   ", &response, &req.metadata).is_none());

        let handle = svc.persist("user-1", &response, &req.metadata).unwrap();
        handle.await.unwrap();
        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "user-1");
        assert_eq!(saved[0].1.score, 2.0);
        assert_eq!(saved[0].1.grade, LetterGrade::APlus);
    }

    #[tokio::test]
    async fn sink_failure_does_not_affect_response() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let svc = service(Arc::clone(&sink));
        let req = request(&[("q1", json!("A"))]);
        let response = svc.grade(&req).await.unwrap();
        let handle = svc.persist("user-1", &response, &req.metadata).unwrap();
        handle.await.unwrap();
        assert!(sink.saved.lock().unwrap().is_empty());

        let submitted = svc.submit(&req, Some("user-1")).await.unwrap();
        assert_eq!(submitted.statistics.marks_awarded, 2.0);
    }
}
