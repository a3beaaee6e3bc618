//! Remote document store over HTTP.
//!
//! Endpoints, relative to the base URL:
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | POST | `/questions/query` | `QuestionFilter` | `{"questions": [...]}` |
//! | POST | `/questions/batch` | `{"ids": [...]}` (at most 10) | `{"questions": [...]}` |
//! | GET | `/blueprints/{id}` | | blueprint, 404 when absent |
//! | POST | `/users/{user}/results` | `SavedResult` | any 2xx |

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use paperforge_core::model::{Blueprint, Question};
use paperforge_core::submission::SavedResult;
use paperforge_core::traits::{QuestionFilter, QuestionRepository, ResultSink};
use paperforge_core::PaperError;

use crate::error::StoreError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Largest id set the store accepts per batch request.
pub const ID_BATCH_SIZE: usize = 10;

/// Client for a remote question store.
pub struct HttpStore {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    ids: &'a [String],
}

#[derive(Deserialize)]
struct QuestionsResponse {
    #[serde(default)]
    questions: Vec<Question>,
}

impl HttpStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            StoreError::NetworkError(format!("store not reachable at {}", self.base_url))
        } else {
            StoreError::NetworkError(e.to_string())
        }
    }

    /// Send a request and turn error statuses into [`StoreError`].
    async fn send(&self, request: reqwest::RequestBuilder) -> anyhow::Result<reqwest::Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::AuthenticationFailed(body).into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status,
                message: body,
            }
            .into());
        }
        Ok(response)
    }

    async fn fetch_batch(&self, ids: &[String]) -> anyhow::Result<Vec<Question>> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/questions/batch", self.base_url))
                    .json(&BatchRequest { ids }),
            )
            .await?;
        let body: QuestionsResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("failed to parse questions: {e}")))?;
        Ok(body.questions)
    }
}

#[async_trait]
impl QuestionRepository for HttpStore {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, filter), fields(topic = ?filter.topic, level = ?filter.cognitive_level, limit = filter.limit))]
    async fn query_questions(&self, filter: &QuestionFilter) -> anyhow::Result<Vec<Question>> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/questions/query", self.base_url))
                    .json(filter),
            )
            .await?;
        let body: QuestionsResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("failed to parse questions: {e}")))?;
        tracing::debug!(found = body.questions.len(), "query complete");
        Ok(body.questions)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_questions_by_id(&self, ids: &[String]) -> anyhow::Result<Vec<Question>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let batches = try_join_all(ids.chunks(ID_BATCH_SIZE).map(|chunk| self.fetch_batch(chunk))).await?;
        Ok(batches.into_iter().flatten().collect())
    }

    #[instrument(skip(self))]
    async fn get_blueprint(&self, id: &str) -> anyhow::Result<Blueprint> {
        let request = self
            .client
            .get(format!("{}/blueprints/{id}", self.base_url));
        let response = match self.send(request).await {
            Ok(response) => response,
            Err(e) => {
                if matches!(e.downcast_ref::<StoreError>(), Some(StoreError::ApiError { status: 404, .. })) {
                    return Err(PaperError::not_found(format!("blueprint {id}")).into());
                }
                return Err(e);
            }
        };
        response
            .json::<Blueprint>()
            .await
            .map_err(|e| StoreError::Malformed(format!("failed to parse blueprint {id}: {e}")).into())
    }
}

#[async_trait]
impl ResultSink for HttpStore {
    #[instrument(skip(self, result))]
    async fn save_result(&self, user_id: &str, result: &SavedResult) -> anyhow::Result<()> {
        self.send(
            self.client
                .post(format!("{}/users/{user_id}/results", self.base_url))
                .json(result),
        )
        .await?;
        Ok(())
    }
}
