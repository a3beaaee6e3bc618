//! Knapsack-style mark fitting for a single topic.
//!
//! This is a bounded heuristic, not an exact subset-sum solver: a greedy fill
//! by descending marks, one round of single-item swaps when the greedy result
//! lands outside the band, and a conservative fallback fill.

use serde::{Deserialize, Serialize};

use crate::model::Question;

/// Tolerance used for per-topic fitting.
pub const DEFAULT_TOLERANCE: f64 = 0.30;

/// Acceptable mark range for a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkBand {
    pub lower: f64,
    pub upper: f64,
}

impl MarkBand {
    /// `[target - target*tol, target + target*tol]` with the lower edge
    /// floored at 1 mark.
    pub fn new(target: u32, tolerance: f64) -> Self {
        let target = f64::from(target);
        let deviation = target * tolerance;
        Self {
            lower: (target - deviation).max(1.0),
            upper: target + deviation,
        }
    }

    pub fn contains(&self, marks: u32) -> bool {
        let marks = f64::from(marks);
        marks >= self.lower && marks <= self.upper
    }
}

/// Which step produced the final selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPath {
    /// No candidate carried any marks.
    Empty,
    /// The greedy fill landed inside the band.
    Greedy,
    /// A single swap moved the greedy fill into the band.
    Swapped,
    /// The greedy fill overshot the upper edge while still under the lower
    /// edge and no swap could repair it.
    Overshoot,
    /// The pool ran out below the lower edge.
    Undershoot,
    /// The greedy fill selected nothing and the fallback fill was used.
    Fallback,
}

/// Result of fitting one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackFit {
    pub questions: Vec<Question>,
    pub total_marks: u32,
    pub band: MarkBand,
    pub path: FitPath,
}

impl KnapsackFit {
    pub fn in_band(&self) -> bool {
        !self.questions.is_empty() && self.band.contains(self.total_marks)
    }
}

fn sum_marks(questions: &[Question]) -> u32 {
    questions.iter().map(Question::mark_value).sum()
}

fn distance(marks: u32, target: u32) -> u32 {
    marks.abs_diff(target)
}

/// Select questions whose mark total lands close to `target_marks`.
///
/// Candidates without marks are ignored. The rest are stable-sorted by
/// descending marks, so equal-mark candidates keep their input order.
pub fn select_by_marks(candidates: &[Question], target_marks: u32, tolerance: f64) -> KnapsackFit {
    let band = MarkBand::new(target_marks, tolerance);

    let mut sorted: Vec<Question> = candidates
        .iter()
        .filter(|q| q.mark_value() > 0)
        .cloned()
        .collect();
    sorted.sort_by(|a, b| b.mark_value().cmp(&a.mark_value()));

    if sorted.is_empty() {
        tracing::warn!(target_marks, "no candidates with marks for knapsack fit");
        return KnapsackFit {
            questions: Vec::new(),
            total_marks: 0,
            band,
            path: FitPath::Empty,
        };
    }

    // Phase 1: take the largest remaining question while under the lower edge.
    // Overshooting the upper edge is allowed here.
    let mut taken = 0;
    let mut current = 0u32;
    while taken < sorted.len() && f64::from(current) < band.lower {
        current += sorted[taken].mark_value();
        taken += 1;
    }
    let mut selected = sorted[..taken].to_vec();
    let remaining = &sorted[taken..];

    tracing::debug!(
        target_marks,
        selected = selected.len(),
        marks = current,
        "greedy fill complete"
    );

    let mut path = FitPath::Greedy;

    // Phase 2: single-item swaps when outside the band.
    if !band.contains(current) {
        let swapped = optimize_marks_with_swaps(&selected, remaining, target_marks, tolerance);
        let swapped_marks = sum_marks(&swapped);
        if swapped != selected {
            tracing::debug!(from = current, to = swapped_marks, "swap moved fit into band");
            selected = swapped;
            current = swapped_marks;
            path = FitPath::Swapped;
        } else if f64::from(current) > band.upper {
            path = FitPath::Overshoot;
        } else {
            path = FitPath::Undershoot;
        }
    }

    // Phase 3: fallback fill.
    if selected.is_empty() {
        tracing::warn!(target_marks, "greedy fill selected nothing, using fallback");
        selected = fallback_fill(&sorted, band);
        current = sum_marks(&selected);
        path = FitPath::Fallback;
    }

    KnapsackFit {
        questions: selected,
        total_marks: current,
        band,
        path,
    }
}

/// Try every single-position swap of `selected` against `available` and
/// keep the one that gets closest to `target`, provided it strictly improves
/// on `selected` and lands within `target ± target*tolerance`.
///
/// Every candidate swap is built from the original `selected`, so at most
/// one position changes.
pub fn optimize_marks_with_swaps(
    selected: &[Question],
    available: &[Question],
    target: u32,
    tolerance: f64,
) -> Vec<Question> {
    let deviation = f64::from(target) * tolerance;
    let lower = f64::from(target) - deviation;
    let upper = f64::from(target) + deviation;

    let base_marks = sum_marks(selected);
    let mut best: Option<(usize, &Question)> = None;
    let mut best_distance = distance(base_marks, target);

    for (i, current) in selected.iter().enumerate() {
        for candidate in available {
            let marks = base_marks - current.mark_value() + candidate.mark_value();
            let d = distance(marks, target);
            let within = f64::from(marks) >= lower && f64::from(marks) <= upper;
            if d < best_distance && within {
                best = Some((i, candidate));
                best_distance = d;
            }
        }
    }

    let mut result = selected.to_vec();
    if let Some((i, candidate)) = best {
        result[i] = candidate.clone();
    }
    result
}

/// Take questions in order while they fit under the upper edge, stopping as
/// soon as the lower edge is reached.
fn fallback_fill(sorted: &[Question], band: MarkBand) -> Vec<Question> {
    let mut picked = Vec::new();
    let mut marks = 0u32;
    for question in sorted {
        if f64::from(marks + question.mark_value()) <= band.upper {
            marks += question.mark_value();
            picked.push(question.clone());
        }
        if f64::from(marks) >= band.lower {
            break;
        }
    }
    picked
}
