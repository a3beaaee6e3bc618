//! Diversity-aware subset selection.
//!
//! Picks spread across cognitive levels first (round-robin over shuffled
//! per-level groups), then fill any remaining slots greedily by
//! [`variety_score`].

use std::collections::VecDeque;

use crate::model::Question;
use crate::random::{shuffle, RandomSource};

/// Year assumed for questions without one.
const BASE_YEAR: i32 = 2020;

/// A question chosen by the variety selector, with the score it had when
/// it was picked.
#[derive(Debug, Clone, PartialEq)]
pub struct VarietyPick {
    pub question: Question,
    pub variety_score: f64,
}

fn score<'a>(question: &Question, selected: impl Iterator<Item = &'a Question>, jitter: f64) -> f64 {
    let marks = i64::from(question.mark_value());
    let mut same_level = 0u32;
    let mut similar_marks = 0u32;
    for other in selected {
        if other.cognitive_level == question.cognitive_level {
            same_level += 1;
        }
        if (i64::from(other.mark_value()) - marks).abs() <= 1 {
            similar_marks += 1;
        }
    }
    let year = question.year.unwrap_or(BASE_YEAR);

    100.0 - 10.0 * f64::from(same_level) + 2.0 * f64::from(year - BASE_YEAR)
        - 5.0 * f64::from(similar_marks)
        + jitter
}

/// Score how much `question` would add to the variety of `selected`.
///
/// Starts at 100, loses 10 per selected question on the same cognitive
/// level and 5 per selected question within one mark, gains 2 per year
/// after 2020 (earlier years go negative), plus a jitter in `[0, 10)`.
pub fn variety_score(question: &Question, selected: &[Question], rng: &mut dyn RandomSource) -> f64 {
    score(question, selected.iter(), rng.next_f64() * 10.0)
}

/// Choose `count_needed` questions from `candidates`, favouring a spread of
/// cognitive levels. When the pool is no larger than `count_needed` every
/// candidate is returned in input order.
pub fn select_variety(
    candidates: &[Question],
    count_needed: usize,
    rng: &mut dyn RandomSource,
) -> Vec<VarietyPick> {
    if candidates.len() <= count_needed {
        return candidates
            .iter()
            .map(|q| VarietyPick {
                question: q.clone(),
                variety_score: 0.0,
            })
            .collect();
    }

    // Group candidate indices by level, keeping first-seen level order.
    let mut levels: Vec<(&str, VecDeque<usize>)> = Vec::new();
    for (index, question) in candidates.iter().enumerate() {
        let level = question.cognitive_level.as_str();
        match levels.iter().position(|(l, _)| *l == level) {
            Some(pos) => levels[pos].1.push_back(index),
            None => levels.push((level, VecDeque::from([index]))),
        }
    }
    for (_, group) in &mut levels {
        shuffle(group.make_contiguous(), rng);
    }

    let mut picked: Vec<usize> = Vec::with_capacity(count_needed);
    let mut picks: Vec<VarietyPick> = Vec::with_capacity(count_needed);

    for i in 0..count_needed {
        let slot = i % levels.len();
        if let Some(index) = levels[slot].1.pop_front() {
            let question = &candidates[index];
            let jitter = rng.next_f64() * 10.0;
            let s = score(question, picks.iter().map(|p| &p.question), jitter);
            picked.push(index);
            picks.push(VarietyPick {
                question: question.clone(),
                variety_score: s,
            });
        }
    }

    // Fill what the round-robin could not, rescoring after every pick.
    while picks.len() < count_needed {
        let mut best: Option<(usize, f64)> = None;
        for (index, question) in candidates.iter().enumerate() {
            if picked.contains(&index) {
                continue;
            }
            let jitter = rng.next_f64() * 10.0;
            let s = score(question, picks.iter().map(|p| &p.question), jitter);
            if best.map_or(true, |(_, top)| s > top) {
                best = Some((index, s));
            }
        }
        let Some((index, s)) = best else {
            break;
        };
        picked.push(index);
        picks.push(VarietyPick {
            question: candidates[index].clone(),
            variety_score: s,
        });
    }

    tracing::debug!(
        needed = count_needed,
        picked = picks.len(),
        levels = levels.len(),
        "variety selection complete"
    );

    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use crate::testing::question;

    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn next_f64(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn small_pool_returned_whole() {
        let pool = vec![
            question("a", "Algebra", 2, "Level 1"),
            question("b", "Algebra", 3, "Level 2"),
        ];
        let picks = select_variety(&pool, 5, &mut Fixed(0.0));
        let ids: Vec<&str> = picks.iter().map(|p| p.question.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn score_components() {
        let mut q = question("q", "Algebra", 4, "Level 2");
        q.year = Some(2023);
        let selected = vec![
            question("s1", "Algebra", 5, "Level 2"),
            question("s2", "Algebra", 9, "Level 1"),
        ];
        // 100 - 10 (same level) + 6 (year) - 5 (s1 within one mark) + 0
        assert_eq!(variety_score(&q, &selected, &mut Fixed(0.0)), 91.0);
        // jitter is scaled to [0, 10)
        assert_eq!(variety_score(&q, &selected, &mut Fixed(0.5)), 96.0);
    }

    #[test]
    fn older_years_score_negative_offsets() {
        let mut q = question("q", "Algebra", 4, "Level 1");
        q.year = Some(2010);
        assert_eq!(variety_score(&q, &[], &mut Fixed(0.0)), 80.0);
    }

    #[test]
    fn scarcer_level_scores_higher() {
        let selected = vec![
            question("s1", "Algebra", 8, "Level 1"),
            question("s2", "Algebra", 8, "Level 1"),
            question("s3", "Algebra", 8, "Level 3"),
        ];
        let common = question("c", "Algebra", 2, "Level 1");
        let scarce = question("r", "Algebra", 2, "Level 3");
        let unseen = question("u", "Algebra", 2, "Level 4");
        let c = variety_score(&common, &selected, &mut Fixed(0.3));
        let r = variety_score(&scarce, &selected, &mut Fixed(0.3));
        let u = variety_score(&unseen, &selected, &mut Fixed(0.3));
        assert!(u > r && r > c);
    }

    #[test]
    fn round_robin_spreads_levels() {
        let mut pool = Vec::new();
        for i in 0..6 {
            pool.push(question(&format!("l1-{i}"), "Algebra", 2, "Level 1"));
        }
        pool.push(question("l2", "Algebra", 2, "Level 2"));
        pool.push(question("l3", "Algebra", 2, "Level 3"));

        let picks = select_variety(&pool, 3, &mut SeededRandom::from_u32(11));
        let mut levels: Vec<&str> = picks.iter().map(|p| p.question.cognitive_level.as_str()).collect();
        levels.sort_unstable();
        assert_eq!(levels, vec!["Level 1", "Level 2", "Level 3"]);
    }

    #[test]
    fn fill_phase_tops_up_after_groups_empty() {
        // Two levels, one of them with a single question: the round-robin
        // visits "Level 2" on odd slots but it empties after one pick.
        let mut pool = vec![question("only", "Algebra", 2, "Level 2")];
        for i in 0..5 {
            pool.insert(0, question(&format!("l1-{i}"), "Algebra", 2, "Level 1"));
        }
        let picks = select_variety(&pool, 5, &mut SeededRandom::from_u32(3));
        assert_eq!(picks.len(), 5);
        let mut ids: Vec<&str> = picks.iter().map(|p| p.question.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
        assert!(ids.contains(&"only"));
    }

    #[test]
    fn seeded_selection_is_reproducible() {
        let pool: Vec<Question> = (0..12)
            .map(|i| question(&format!("q{i}"), "Algebra", 1 + i % 4, &format!("Level {}", 1 + i % 3)))
            .collect();
        let a = select_variety(&pool, 6, &mut SeededRandom::from_u32(99));
        let b = select_variety(&pool, 6, &mut SeededRandom::from_u32(99));
        assert_eq!(a, b);
    }
}
