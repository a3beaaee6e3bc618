//! Cognitive-level balancing by local search.
//!
//! Starting from a marks-fitted selection, repeatedly swap one question for a
//! same-topic replacement on an under-represented level, accepting a swap
//! only if the level mix improves without giving up much on topic or total
//! marks. Replacement candidates are fetched from the repository one level
//! at a time.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{SelectedQuestion, TopicMarks};
use crate::traits::{QuestionFilter, QuestionRepository};

/// Tuning knobs for [`balance`].
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceOptions {
    /// Upper bound on accepted swaps.
    pub max_swaps: u32,
    /// Stop once the overall score reaches this.
    pub target_score: f64,
    /// Above this overall score, questions on levels that are not
    /// over-represented are left alone.
    pub skip_above: f64,
    /// Candidates fetched per replacement query.
    pub replacement_limit: usize,
    /// Allowed per-level deviation, as a fraction of the question count, for
    /// [`BalanceOutcome::within_tolerance`].
    pub tolerance: f64,
}

impl Default for BalanceOptions {
    fn default() -> Self {
        Self {
            max_swaps: 50,
            target_score: 0.95,
            skip_above: 0.8,
            replacement_limit: 10,
            tolerance: 0.1,
        }
    }
}

/// Fit of a selection against the blueprint; every field is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceScore {
    pub cognitive: f64,
    pub topic: f64,
    pub marks: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceOutcome {
    pub selection: Vec<SelectedQuestion>,
    pub swaps: u32,
    pub initial: ComplianceScore,
    pub score: ComplianceScore,
    pub within_tolerance: bool,
}

fn closeness(actual: u32, target: u32) -> f64 {
    let deviation = f64::from(actual.abs_diff(target)) / f64::from(target.max(1));
    (1.0 - deviation).max(0.0)
}

fn level_counts(selection: &[SelectedQuestion]) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for s in selection {
        *counts.entry(s.level()).or_insert(0) += 1;
    }
    counts
}

/// Score `selection` against required level counts and topic targets.
pub fn compliance_score(
    selection: &[SelectedQuestion],
    required_levels: &BTreeMap<String, u32>,
    topic_marks: &TopicMarks,
) -> ComplianceScore {
    let levels = level_counts(selection);
    let mut actual_marks: HashMap<&str, u32> = HashMap::new();
    for s in selection {
        *actual_marks.entry(s.allocated_topic.as_str()).or_insert(0) += s.marks();
    }

    let cognitive_sum: f64 = required_levels
        .iter()
        .map(|(level, target)| closeness(levels.get(level.as_str()).copied().unwrap_or(0), *target))
        .sum();
    let topic_sum: f64 = topic_marks
        .iter()
        .map(|(topic, target)| closeness(actual_marks.get(topic.as_str()).copied().unwrap_or(0), *target))
        .sum();

    let total_target: u32 = topic_marks.values().sum();
    let total_actual: u32 = actual_marks.values().sum();
    let marks = if total_target > 0 {
        (1.0 - f64::from(total_actual.abs_diff(total_target)) / f64::from(total_target)).max(0.0)
    } else {
        1.0
    };

    let cognitive = cognitive_sum / required_levels.len().max(1) as f64;
    let topic = topic_sum / topic_marks.len().max(1) as f64;
    ComplianceScore {
        cognitive,
        topic,
        marks,
        total: (cognitive + topic + marks) / 3.0,
    }
}

fn accepts(candidate: &ComplianceScore, current: &ComplianceScore) -> bool {
    candidate.cognitive > current.cognitive
        && candidate.topic >= current.topic * 0.95
        && candidate.marks >= current.marks * 0.95
        && candidate.total > current.total
}

/// Rebalance `selection` towards `required_levels`.
///
/// `base_filter` supplies subject, grade and paper for replacement queries;
/// its topic, level and limit are overridden per query. Query failures are
/// logged and skipped.
pub async fn balance(
    selection: Vec<SelectedQuestion>,
    required_levels: &BTreeMap<String, u32>,
    topic_marks: &TopicMarks,
    options: &BalanceOptions,
    repository: &dyn QuestionRepository,
    base_filter: &QuestionFilter,
) -> BalanceOutcome {
    let mut current = selection;
    let initial = compliance_score(&current, required_levels, topic_marks);
    let mut best = initial;
    let mut swaps = 0u32;

    tracing::info!(
        cognitive = initial.cognitive,
        topic = initial.topic,
        marks = initial.marks,
        total = initial.total,
        "balancing cognitive levels"
    );

    'search: while swaps < options.max_swaps && best.total < options.target_score {
        let deficits: BTreeMap<&str, i64> = {
            let counts = level_counts(&current);
            required_levels
                .iter()
                .map(|(level, target)| {
                    let actual = counts.get(level.as_str()).copied().unwrap_or(0);
                    (level.as_str(), i64::from(*target) - i64::from(actual))
                })
                .collect()
        };
        let mut wanted: Vec<(&str, i64)> = deficits
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(l, d)| (*l, *d))
            .collect();
        wanted.sort_by(|a, b| b.1.cmp(&a.1));

        for i in 0..current.len() {
            let level = current[i].level().to_string();
            if deficits.get(level.as_str()).is_some_and(|d| *d >= 0) && best.total > options.skip_above {
                continue;
            }
            let topic = current[i].allocated_topic.clone();

            for (target_level, _) in &wanted {
                let filter = base_filter
                    .clone()
                    .with_topic(topic.clone())
                    .with_level(*target_level)
                    .with_limit(options.replacement_limit);
                let candidates = match repository.query_questions(&filter).await {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::warn!(topic = %topic, level = target_level, error = %e, "replacement query failed");
                        continue;
                    }
                };

                for candidate in candidates {
                    if candidate.is_parent() || current.iter().any(|s| s.question.id == candidate.id) {
                        continue;
                    }
                    let mut trial = current.clone();
                    trial[i] = SelectedQuestion::new(candidate, topic.clone(), current[i].allocated_marks);
                    let score = compliance_score(&trial, required_levels, topic_marks);
                    if accepts(&score, &best) {
                        tracing::debug!(
                            out = %current[i].question.id,
                            out_level = %level,
                            into = %trial[i].question.id,
                            into_level = target_level,
                            total = score.total,
                            "swap accepted"
                        );
                        current = trial;
                        best = score;
                        swaps += 1;
                        continue 'search;
                    }
                }
            }
        }

        tracing::debug!("no improving swap found");
        break;
    }

    let n = current.len() as f64;
    let counts = level_counts(&current);
    let within_tolerance = required_levels.iter().all(|(level, target)| {
        let actual = counts.get(level.as_str()).copied().unwrap_or(0);
        f64::from(actual.abs_diff(*target)) <= options.tolerance * n
    });

    tracing::info!(swaps, total = best.total, within_tolerance, "balancing complete");

    BalanceOutcome {
        selection: current,
        swaps,
        initial,
        score: best,
        within_tolerance,
    }
}
