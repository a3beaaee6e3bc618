//! Free-text answer equivalence.
//!
//! Every comparison works on normalized text: trimmed, lower-cased unless
//! the question is case sensitive, whitespace collapsed, and no spaces
//! around `= + - − * / ( ) ^`. Domain/range and algebraic answers get a
//! second, pattern-based chance after the plain text comparison fails.
//! Nothing here does symbolic math.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{AnswerType, ShortAnswerSpec};

/// Why an answer could not be checked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EquivalenceError {
    #[error("question has no correct answer to compare against")]
    MissingCorrectAnswer,
}

/// Exact-comparison epsilon for numbers when no tolerance is configured.
const EXACT_EPSILON: f64 = 1e-10;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static OPERATOR_SPACING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([=+\-−*/()^])\s*").unwrap());
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-]?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)").unwrap());
static COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^0-9\-]*([+-]?[0-9]+(?:\.[0-9]+)?)[,;\s]+[^0-9\-]*([+-]?[0-9]+(?:\.[0-9]+)?)")
        .unwrap()
});

/// Rewrites applied in order to both sides of an algebraic comparison.
///
/// | Pattern      | Becomes  | Example         |
/// |--------------|----------|-----------------|
/// | digit letter | `d*l`    | `2x` → `2*x`    |
/// | letter digit | `l*d`    | `x2` → `x*2`    |
/// | `^2`         | `²`      | `x^2` → `x²`    |
/// | `^3`         | `³`      | `x^3` → `x³`    |
/// | `* (`        | `*(`     |                 |
/// | `) *`        | `)*`     |                 |
static ALGEBRAIC_REWRITES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"([0-9]+)([a-z])", "${1}*${2}"),
        (r"([a-z])([0-9]+)", "${1}*${2}"),
        (r"\^2", "²"),
        (r"\^3", "³"),
        (r"\s*\*\s*\(", "*("),
        (r"\)\s*\*", ")*"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

static INTERVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([a-z])(?:∈|in))?([\(\[])([^;,]+)[;,]([^;,\)\]]+)([\)\]])$").unwrap()
});
static VAR_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z])(<=|>=|<|>)([^<>=]+)$").unwrap());
static BOUND_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^<>=]+)(<=|>=|<|>)([a-z])$").unwrap());
static BETWEEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^<>=]+)(<=|<)([a-z])(<=|<)([^<>=]+)$").unwrap());

/// Normalize an answer for comparison.
pub fn normalize_text(text: &str, case_sensitive: bool) -> String {
    let trimmed = text.trim();
    let cased = if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    };
    let collapsed = WHITESPACE.replace_all(&cased, " ");
    let tight = OPERATOR_SPACING.replace_all(&collapsed, "$1");
    tight.replace("**", "^")
}

/// Whether the normalized user answer equals the normalized correct answer
/// or any accepted variation. An empty answer never matches.
pub fn matches_text(user_answer: &str, spec: &ShortAnswerSpec) -> bool {
    let user = normalize_text(user_answer, spec.case_sensitive);
    if user.is_empty() {
        return false;
    }
    spec.correct_answer
        .iter()
        .chain(spec.variations.iter())
        .any(|accepted| normalize_text(accepted, spec.case_sensitive) == user)
}

/// Decide whether `user_answer` is an acceptable answer under `spec`.
pub fn is_equivalent(user_answer: &str, spec: &ShortAnswerSpec) -> Result<bool, EquivalenceError> {
    match spec.answer_type {
        AnswerType::Text => Ok(matches_text(user_answer, spec)),
        AnswerType::Numerical => {
            let correct = correct_answer(spec)?;
            Ok(numbers_match(user_answer, correct, spec.tolerance))
        }
        AnswerType::Coordinates => {
            let correct = correct_answer(spec)?;
            Ok(coordinates_match(user_answer, correct, spec.tolerance))
        }
        AnswerType::DomainRange => {
            if matches_text(user_answer, spec) {
                return Ok(true);
            }
            let correct = correct_answer(spec)?;
            Ok(intervals_match(user_answer, correct))
        }
        AnswerType::Algebraic => {
            if matches_text(user_answer, spec) {
                return Ok(true);
            }
            let correct = correct_answer(spec)?;
            let user = rewrite_algebraic(&normalize_text(user_answer, false));
            Ok(!user.is_empty() && user == rewrite_algebraic(&normalize_text(correct, false)))
        }
    }
}

fn correct_answer(spec: &ShortAnswerSpec) -> Result<&str, EquivalenceError> {
    spec.correct_answer
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .ok_or(EquivalenceError::MissingCorrectAnswer)
}

fn within(user: f64, correct: f64, tolerance: f64) -> bool {
    if tolerance > 0.0 {
        (user - correct).abs() <= tolerance
    } else {
        (user - correct).abs() < EXACT_EPSILON
    }
}

/// First numeric literal in `text`, so `"x = 3"` reads as 3.
pub fn extract_number(text: &str) -> Option<f64> {
    let text = text.replace('−', "-");
    NUMBER
        .captures(&text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

fn numbers_match(user: &str, correct: &str, tolerance: f64) -> bool {
    match (extract_number(user), extract_number(correct)) {
        (Some(u), Some(c)) => within(u, c, tolerance),
        _ => false,
    }
}

/// Ordered pair from forms like `"(3; 8)"`, `"3, 8"` or `"x=3, y=8"`.
pub fn extract_coordinates(text: &str) -> Option<(f64, f64)> {
    let text = text.replace('−', "-");
    let caps = COORDINATES.captures(&text)?;
    let x = caps[1].parse::<f64>().ok()?;
    let y = caps[2].parse::<f64>().ok()?;
    Some((x, y))
}

fn coordinates_match(user: &str, correct: &str, tolerance: f64) -> bool {
    match (extract_coordinates(user), extract_coordinates(correct)) {
        (Some((ux, uy)), Some((cx, cy))) => {
            if tolerance > 0.0 {
                within(ux, cx, tolerance) && within(uy, cy, tolerance)
            } else {
                ux == cx && uy == cy
            }
        }
        _ => false,
    }
}

fn rewrite_algebraic(normalized: &str) -> String {
    ALGEBRAIC_REWRITES
        .iter()
        .fold(normalized.to_string(), |text, (pattern, replacement)| {
            pattern.replace_all(&text, *replacement).into_owned()
        })
}

// ---------------------------------------------------------------------------
// Domain / range
// ---------------------------------------------------------------------------

/// A finite bound value. Numeric text compares as a number, so `2.0`
/// and `2` are the same bound.
#[derive(Debug, Clone, PartialEq)]
enum BoundValue {
    Number(f64),
    Symbol(String),
}

impl BoundValue {
    fn parse(text: &str) -> Self {
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => BoundValue::Number(n),
            _ => BoundValue::Symbol(text.to_string()),
        }
    }

    fn same_as(&self, other: &BoundValue) -> bool {
        match (self, other) {
            (BoundValue::Number(a), BoundValue::Number(b)) => within(*a, *b, 0.0),
            (BoundValue::Symbol(a), BoundValue::Symbol(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Bound {
    value: BoundValue,
    inclusive: bool,
}

fn same_bound(a: &Option<Bound>, b: &Option<Bound>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.inclusive == b.inclusive && a.value.same_as(&b.value),
        _ => false,
    }
}

/// A one-variable interval; `None` bounds are infinite.
#[derive(Debug, Clone, PartialEq)]
struct Interval {
    variable: String,
    lower: Option<Bound>,
    upper: Option<Bound>,
}

fn interval_text(text: &str) -> String {
    text.to_lowercase()
        .replace("infinity", "∞")
        .replace('≥', ">=")
        .replace('≤', "<=")
        .replace('−', "-")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn bound(value: &str, inclusive: bool) -> Option<Bound> {
    let value = value.trim_start_matches('+');
    if value.ends_with('∞') {
        return None;
    }
    Some(Bound {
        value: BoundValue::parse(value),
        inclusive,
    })
}

/// Parse interval notation or an inequality into a canonical interval.
fn parse_interval(text: &str) -> Option<Interval> {
    let text = interval_text(text);

    if let Some(caps) = INTERVAL.captures(&text) {
        let variable = caps.get(1).map_or("x", |m| m.as_str()).to_string();
        return Some(Interval {
            variable,
            lower: bound(&caps[3], &caps[2] == "["),
            upper: bound(&caps[4], &caps[5] == "]"),
        });
    }

    if let Some(caps) = BETWEEN.captures(&text) {
        return Some(Interval {
            variable: caps[3].to_string(),
            lower: bound(&caps[1], &caps[2] == "<="),
            upper: bound(&caps[5], &caps[4] == "<="),
        });
    }

    let (variable, op, value) = if let Some(caps) = VAR_FIRST.captures(&text) {
        (caps[1].to_string(), caps[2].to_string(), caps[3].to_string())
    } else if let Some(caps) = BOUND_FIRST.captures(&text) {
        // `a < x` reads as `x > a`.
        let flipped = match &caps[2] {
            "<" => ">",
            "<=" => ">=",
            ">" => "<",
            _ => "<=",
        };
        (caps[3].to_string(), flipped.to_string(), caps[1].to_string())
    } else {
        return None;
    };

    let (lower, upper) = match op.as_str() {
        ">" => (bound(&value, false), None),
        ">=" => (bound(&value, true), None),
        "<" => (None, bound(&value, false)),
        _ => (None, bound(&value, true)),
    };
    Some(Interval {
        variable,
        lower,
        upper,
    })
}

fn intervals_match(user: &str, correct: &str) -> bool {
    match (parse_interval(user), parse_interval(correct)) {
        (Some(u), Some(c)) => {
            u.variable == c.variable && same_bound(&u.lower, &c.lower) && same_bound(&u.upper, &c.upper)
        }
        _ => false,
    }
}
