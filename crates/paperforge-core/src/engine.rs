//! Paper generation orchestrator.
//!
//! Fetches the blueprint, fits every topic concurrently, tops up topics that
//! came in short, optionally rebalances cognitive levels, and assembles the
//! final paper.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balancer::{balance, BalanceOptions};
use crate::compliance::ComplianceReport;
use crate::context::ContextResolver;
use crate::error::PaperError;
use crate::knapsack::{select_by_marks, DEFAULT_TOLERANCE};
use crate::model::{Blueprint, Question, SelectedQuestion};
use crate::paper::assemble;
use crate::random::{pick, RandomSource, SeededRandom};
use crate::request::{GenerateRequest, GenerateResponse, PaperMode};
use crate::traits::{QuestionFilter, QuestionRepository};
use crate::variety::select_variety;

/// How the joined selection is refined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Per-topic mark fitting and compensation only.
    #[default]
    MarksOnly,
    /// Mark fitting followed by cognitive-level balancing.
    Balanced,
}

/// Configuration for the paper engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-topic mark tolerance for the knapsack fit.
    pub tolerance: f64,
    /// Candidates fetched per topic.
    pub topic_pool_limit: usize,
    /// Candidates fetched per topic during compensation.
    pub compensation_pool_limit: usize,
    /// Compensation runs when the shortfall exceeds this share of the target.
    pub compensation_trigger: f64,
    /// A compensated topic may grow to this multiple of its allocation.
    pub compensation_ceiling: f64,
    pub strategy: SelectionStrategy,
    pub balance: BalanceOptions,
    /// Maximum concurrent topic fetches.
    pub parallelism: usize,
    /// Questions in a topic-practice paper when the request does not say.
    pub topic_question_count: u32,
    /// Pool oversampling for topic practice.
    pub pool_factor: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            topic_pool_limit: 50,
            compensation_pool_limit: 100,
            compensation_trigger: 0.10,
            compensation_ceiling: 1.5,
            strategy: SelectionStrategy::MarksOnly,
            balance: BalanceOptions::default(),
            parallelism: 4,
            topic_question_count: 10,
            pool_factor: 5,
        }
    }
}

/// Fitted questions for one blueprint topic.
#[derive(Debug, Clone)]
struct TopicResult {
    topic: String,
    allocated: u32,
    /// Answerable candidates the topic query returned.
    available: usize,
    questions: Vec<Question>,
}

impl TopicResult {
    fn achieved(&self) -> u32 {
        self.questions.iter().map(Question::mark_value).sum()
    }
}

fn answerable(questions: Vec<Question>, exclude: &HashSet<&str>) -> Vec<Question> {
    questions
        .into_iter()
        .filter(|q| !q.is_parent() && !exclude.contains(q.id.as_str()))
        .collect()
}

/// The paper generator.
pub struct PaperEngine {
    repository: Arc<dyn QuestionRepository>,
    config: EngineConfig,
}

impl PaperEngine {
    pub fn new(repository: Arc<dyn QuestionRepository>, config: EngineConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate a paper for `request`.
    ///
    /// `rng` drives variety selection in topic practice; a request seed
    /// replaces it with a reproducible source.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        rng: &mut dyn RandomSource,
    ) -> Result<GenerateResponse> {
        let (subject, grade) = request.validate()?;
        let mode = request.mode();

        let mut filter = QuestionFilter::new(subject, grade);
        filter.paper = request.paper.clone();
        filter.year = request.year;
        filter.season = request.season.clone();

        if mode == PaperMode::ByTopic {
            match request.topic.as_deref().filter(|t| !t.trim().is_empty()) {
                Some(topic) => return self.generate_topic_practice(request, topic, filter, rng).await,
                None => tracing::warn!("by_topic mode without a topic, using the blueprint"),
            }
        }

        let blueprint_id = Blueprint::id_for(subject, request.paper.as_deref(), grade);
        let mut blueprint = self
            .repository
            .get_blueprint(&blueprint_id)
            .await
            .with_context(|| format!("loading blueprint {blueprint_id}"))?;
        blueprint.id = Some(blueprint_id.clone());
        if blueprint.topics.is_empty() {
            return Err(PaperError::invalid(format!("blueprint {blueprint_id} has no topics")).into());
        }

        // Any duration scales the blueprint, whatever the mode.
        if let Some(minutes) = request.duration {
            let scaled = blueprint.scaled_for_duration(minutes);
            tracing::info!(
                minutes,
                from = blueprint.total_marks.unwrap_or_default(),
                to = scaled.topic_marks_total(),
                "quick practice scaling"
            );
            blueprint = scaled;
        }

        let exclude: HashSet<&str> = request.exclude_ids.iter().map(String::as_str).collect();
        let mut topics = self.fit_topics(&blueprint, &filter, &exclude).await;
        self.compensate(&mut topics, &filter, &exclude).await;
        if topics.iter().all(|t| t.available == 0 && t.questions.is_empty()) {
            return Err(PaperError::not_found(format!(
                "no questions found for blueprint {blueprint_id}"
            ))
            .into());
        }

        let mut selection: Vec<SelectedQuestion> = topics
            .into_iter()
            .flat_map(|t| {
                let TopicResult {
                    topic,
                    allocated,
                    questions,
                    ..
                } = t;
                questions
                    .into_iter()
                    .map(move |q| SelectedQuestion::new(q, topic.clone(), allocated))
            })
            .collect();

        if self.config.strategy == SelectionStrategy::Balanced && !selection.is_empty() {
            let required = blueprint.required_level_counts(selection.len());
            let outcome = balance(
                selection,
                &required,
                &blueprint.topics,
                &self.config.balance,
                self.repository.as_ref(),
                &filter,
            )
            .await;
            selection = outcome.selection;
        }

        let compliance = ComplianceReport::compute(&selection, &blueprint);
        tracing::info!(
            questions = selection.len(),
            score = compliance.overall.score,
            compliant = compliance.overall.compliant,
            "blueprint paper selected"
        );

        let selection = ContextResolver::new(self.repository.as_ref())
            .enrich(selection)
            .await;
        Ok(self.respond(selection, mode, Some(blueprint), Some(compliance)))
    }

    /// Fit every blueprint topic, in blueprint order.
    async fn fit_topics(
        &self,
        blueprint: &Blueprint,
        filter: &QuestionFilter,
        exclude: &HashSet<&str>,
    ) -> Vec<TopicResult> {
        stream::iter(blueprint.topics.iter())
            .map(|(topic, allocated)| self.fit_topic(topic, *allocated, filter, exclude))
            .buffered(self.config.parallelism.max(1))
            .collect()
            .await
    }

    async fn fit_topic(
        &self,
        topic: &str,
        allocated: u32,
        filter: &QuestionFilter,
        exclude: &HashSet<&str>,
    ) -> TopicResult {
        let filter = filter
            .clone()
            .with_topic(topic)
            .with_limit(self.config.topic_pool_limit);
        let mut available = 0;
        let questions = match self.repository.query_questions(&filter).await {
            Ok(found) => {
                let fetched = found.len();
                let pool = answerable(found, exclude);
                available = pool.len();
                if pool.len() < fetched {
                    tracing::debug!(topic, dropped = fetched - pool.len(), "dropped parents and excluded ids");
                }
                let fit = select_by_marks(&pool, allocated, self.config.tolerance);
                if fit.questions.is_empty() {
                    tracing::warn!(topic, available = pool.len(), allocated, "no questions selected for topic");
                } else {
                    tracing::debug!(
                        topic,
                        selected = fit.questions.len(),
                        marks = fit.total_marks,
                        path = ?fit.path,
                        "topic fitted"
                    );
                }
                fit.questions
            }
            Err(e) => {
                tracing::warn!(topic, error = %e, "topic query failed");
                Vec::new()
            }
        };

        TopicResult {
            topic: topic.to_string(),
            allocated,
            available,
            questions,
        }
    }

    /// Top up short topics when the paper as a whole is well below target.
    async fn compensate(&self, topics: &mut [TopicResult], filter: &QuestionFilter, exclude: &HashSet<&str>) {
        let target: u32 = topics.iter().map(|t| t.allocated).sum();
        let achieved: u32 = topics.iter().map(TopicResult::achieved).sum();
        let shortfall = target.saturating_sub(achieved);
        if shortfall == 0 || f64::from(shortfall) <= f64::from(target) * self.config.compensation_trigger {
            return;
        }
        tracing::info!(target, achieved, shortfall, "compensating short topics");

        let mut selected: HashSet<String> = topics
            .iter()
            .flat_map(|t| t.questions.iter().map(|q| q.id.clone()))
            .collect();

        for result in topics.iter_mut() {
            let before = result.achieved();
            if before >= result.allocated {
                continue;
            }
            let need = result.allocated - before;
            let ceiling = f64::from(result.allocated) * self.config.compensation_ceiling;

            let query = filter
                .clone()
                .with_topic(result.topic.as_str())
                .with_limit(self.config.compensation_pool_limit);
            let pool = match self.repository.query_questions(&query).await {
                Ok(found) => answerable(found, exclude),
                Err(e) => {
                    tracing::warn!(topic = %result.topic, error = %e, "compensation query failed");
                    continue;
                }
            };

            let mut added = 0u32;
            for question in pool {
                let marks = question.mark_value();
                if marks == 0 || selected.contains(&question.id) {
                    continue;
                }
                if f64::from(before + added + marks) <= ceiling {
                    added += marks;
                    selected.insert(question.id.clone());
                    result.questions.push(question);
                    if added >= need {
                        break;
                    }
                }
            }
            tracing::debug!(topic = %result.topic, added, now = before + added, "topic compensated");
        }

        let after: u32 = topics.iter().map(TopicResult::achieved).sum();
        tracing::info!(target, achieved = after, "compensation complete");
    }

    /// Single-topic practice paper without a blueprint.
    async fn generate_topic_practice(
        &self,
        request: &GenerateRequest,
        topic: &str,
        filter: QuestionFilter,
        rng: &mut dyn RandomSource,
    ) -> Result<GenerateResponse> {
        let count = request
            .num_questions
            .unwrap_or(self.config.topic_question_count) as usize;
        let factor = request.pool_factor.unwrap_or(self.config.pool_factor).max(1) as usize;
        let filter = filter.with_topic(topic).with_limit((count * factor).max(count));

        let found = self
            .repository
            .query_questions(&filter)
            .await
            .with_context(|| format!("fetching questions for topic {topic}"))?;
        let exclude: HashSet<&str> = request.exclude_ids.iter().map(String::as_str).collect();
        let pool = answerable(found, &exclude);
        if pool.is_empty() {
            tracing::warn!(topic, "no questions available for topic");
            return Err(PaperError::not_found(format!("no questions found for topic {topic}")).into());
        }

        let questions: Vec<Question> = match &request.seed {
            Some(seed) => pick(pool, count, &mut SeededRandom::new(seed)),
            None => select_variety(&pool, count, rng)
                .into_iter()
                .map(|p| p.question)
                .collect(),
        };
        tracing::info!(topic, questions = questions.len(), seeded = request.seed.is_some(), "topic practice selected");

        let selection: Vec<SelectedQuestion> = questions
            .into_iter()
            .map(|q| {
                let marks = q.max_marks_or(1);
                SelectedQuestion::new(q, topic, marks)
            })
            .collect();
        let selection = ContextResolver::new(self.repository.as_ref())
            .enrich(selection)
            .await;
        Ok(self.respond(selection, PaperMode::ByTopic, None, None))
    }

    fn respond(
        &self,
        selection: Vec<SelectedQuestion>,
        mode: PaperMode,
        blueprint: Option<Blueprint>,
        compliance: Option<ComplianceReport>,
    ) -> GenerateResponse {
        let total_marks = selection.iter().map(SelectedQuestion::marks).sum();
        let questions = assemble(selection, mode == PaperMode::FullExam);
        GenerateResponse {
            id: Uuid::new_v4().to_string(),
            total_questions: questions.len(),
            questions,
            total_marks,
            blueprint,
            compliance,
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}
