//! Blueprint compliance reporting.
//!
//! A pure function of the final selection and the (possibly scaled)
//! blueprint. Percentages in the report are on a 0–100 scale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Blueprint, SelectedQuestion};

/// Allowed topic deviation as a fraction of the topic target.
pub const TOPIC_TOLERANCE: f64 = 0.2;
/// Allowed cognitive-level deviation as a fraction of the question count.
pub const LEVEL_TOLERANCE: f64 = 0.1;
/// Allowed total-marks deviation as a fraction of the total target.
pub const MARKS_TOLERANCE: f64 = 0.2;

/// Per-axis deviation report plus an overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub topic: TopicCompliance,
    pub cognitive: CognitiveCompliance,
    pub marks: MarksCompliance,
    pub overall: OverallCompliance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCompliance {
    pub compliant: bool,
    pub deviations: Vec<TopicDeviation>,
    pub summary: TopicSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDeviation {
    pub topic: String,
    pub target: u32,
    pub actual: u32,
    /// `actual - target`.
    pub deviation: i64,
    pub deviation_pct: f64,
    pub compliant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub total_topics: usize,
    pub compliant_topics: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveCompliance {
    pub compliant: bool,
    pub deviations: Vec<LevelDeviation>,
    pub summary: LevelSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDeviation {
    pub level: String,
    pub target_pct: f64,
    pub actual_pct: f64,
    pub target_count: u32,
    pub actual_count: u32,
    pub deviation: i64,
    /// Percentage points between actual and target share.
    pub deviation_pct: f64,
    pub compliant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummary {
    pub total_levels: usize,
    pub compliant_levels: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksCompliance {
    pub compliant: bool,
    pub target: u32,
    pub actual: u32,
    pub deviation: i64,
    pub deviation_pct: f64,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallCompliance {
    pub compliant: bool,
    /// Mean of the three per-axis flags, in `[0, 1]`.
    pub score: f64,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl ComplianceReport {
    pub fn compute(selection: &[SelectedQuestion], blueprint: &Blueprint) -> Self {
        let total_questions = selection.len();

        let mut topic_marks: BTreeMap<&str, u32> = BTreeMap::new();
        let mut level_counts: BTreeMap<&str, u32> = BTreeMap::new();
        for selected in selection {
            *topic_marks.entry(selected.allocated_topic.as_str()).or_default() += selected.marks();
            *level_counts.entry(selected.level()).or_default() += 1;
        }

        let deviations: Vec<TopicDeviation> = blueprint
            .topics
            .iter()
            .map(|(topic, &target)| {
                let actual = topic_marks.get(topic.as_str()).copied().unwrap_or(0);
                let deviation = i64::from(actual) - i64::from(target);
                TopicDeviation {
                    topic: topic.clone(),
                    target,
                    actual,
                    deviation,
                    deviation_pct: ratio(deviation as f64, f64::from(target)) * 100.0,
                    compliant: (deviation as f64).abs() <= f64::from(target) * TOPIC_TOLERANCE,
                }
            })
            .collect();
        let compliant_topics = deviations.iter().filter(|d| d.compliant).count();
        let topic = TopicCompliance {
            compliant: compliant_topics == deviations.len(),
            summary: TopicSummary {
                total_topics: blueprint.topics.len(),
                compliant_topics,
            },
            deviations,
        };

        let deviations: Vec<LevelDeviation> = blueprint
            .cognitive_levels
            .iter()
            .map(|(level, &target_share)| {
                let target_count = (total_questions as f64 * target_share).round().max(0.0) as u32;
                let actual_count = level_counts.get(level.as_str()).copied().unwrap_or(0);
                let actual_share = ratio(f64::from(actual_count), total_questions as f64);
                let share_gap = actual_share - target_share;
                LevelDeviation {
                    level: level.clone(),
                    target_pct: target_share * 100.0,
                    actual_pct: actual_share * 100.0,
                    target_count,
                    actual_count,
                    deviation: i64::from(actual_count) - i64::from(target_count),
                    deviation_pct: share_gap * 100.0,
                    compliant: share_gap.abs() <= LEVEL_TOLERANCE,
                }
            })
            .collect();
        let compliant_levels = deviations.iter().filter(|d| d.compliant).count();
        let cognitive = CognitiveCompliance {
            compliant: compliant_levels == deviations.len(),
            summary: LevelSummary {
                total_levels: blueprint.cognitive_levels.len(),
                compliant_levels,
            },
            deviations,
        };

        let target = blueprint.topic_marks_total();
        let actual: u32 = topic_marks.values().sum();
        let deviation = i64::from(actual) - i64::from(target);
        let tolerance = f64::from(target) * MARKS_TOLERANCE;
        let marks = MarksCompliance {
            compliant: (deviation as f64).abs() <= tolerance,
            target,
            actual,
            deviation,
            deviation_pct: ratio(deviation as f64, f64::from(target)) * 100.0,
            tolerance,
        };

        let flags = [topic.compliant, cognitive.compliant, marks.compliant];
        let overall = OverallCompliance {
            compliant: flags.iter().all(|f| *f),
            score: flags.iter().filter(|f| **f).count() as f64 / flags.len() as f64,
        };

        Self {
            topic,
            cognitive,
            marks,
            overall,
        }
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Compliance:** {} (score {:.2})\n\n",
            if self.overall.compliant { "compliant" } else { "not compliant" },
            self.overall.score
        ));
        md.push_str(&format!(
            "**Marks:** {} / {} ({:+.1}%)\n\n",
            self.marks.actual, self.marks.target, self.marks.deviation_pct
        ));

        if !self.topic.deviations.is_empty() {
            md.push_str("### Topics\n\n");
            md.push_str("| Topic | Target | Actual | Deviation | OK |\n");
            md.push_str("|-------|--------|--------|-----------|----|\n");
            for d in &self.topic.deviations {
                md.push_str(&format!(
                    "| {} | {} | {} | {:+} ({:+.1}%) | {} |\n",
                    d.topic,
                    d.target,
                    d.actual,
                    d.deviation,
                    d.deviation_pct,
                    if d.compliant { "yes" } else { "no" }
                ));
            }
            md.push('\n');
        }

        if !self.cognitive.deviations.is_empty() {
            md.push_str("### Cognitive levels\n\n");
            md.push_str("| Level | Target | Actual | OK |\n");
            md.push_str("|-------|--------|--------|----|\n");
            for d in &self.cognitive.deviations {
                md.push_str(&format!(
                    "| {} | {:.1}% ({}) | {:.1}% ({}) | {} |\n",
                    d.level,
                    d.target_pct,
                    d.target_count,
                    d.actual_pct,
                    d.actual_count,
                    if d.compliant { "yes" } else { "no" }
                ));
            }
        }

        md
    }
}
