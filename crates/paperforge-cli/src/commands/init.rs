//! The `paperforge init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_once("paperforge.toml", SAMPLE_CONFIG)?;
    write_once("questions.json", SAMPLE_BANK)?;
    write_once("answers.json", SAMPLE_ANSWERS)?;

    println!("\nNext steps:");
    println!("  1. Add your own questions and blueprints to questions.json");
    println!("  2. Run: paperforge validate --bank questions.json");
    println!("  3. Run: paperforge generate --subject mathematics --grade 12");
    println!("  4. Run: paperforge grade --answers answers.json --user demo");

    Ok(())
}

fn write_once(path: &str, content: &str) -> Result<()> {
    if Path::new(path).exists() {
        println!("{path} already exists, skipping.");
    } else {
        std::fs::write(path, content)?;
        println!("Created {path}");
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# paperforge configuration

[store]
type = "file"
path = "questions.json"
results = "results.jsonl"

# A remote document store instead:
# [store]
# type = "http"
# base_url = "https://questions.example.com/v1"
# api_key = "${PAPERFORGE_API_KEY}"

[engine]
tolerance = 0.30
strategy = "marks_only"
parallelism = 4
max_swaps = 50
topic_pool_limit = 50
pool_factor = 5
"#;

const SAMPLE_BANK: &str = r#"{
  "blueprints": {
    "mathematics_p1_gr12": {
      "topics": { "Algebra": 10, "Functions": 10, "Calculus": 10 },
      "cognitiveLevels": { "Level 1": 0.3, "Level 2": 0.4, "Level 3": 0.3 },
      "totalMarks": 30
    }
  },
  "questions": [
    {
      "id": "alg-1", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Algebra", "cognitiveLevel": "Level 1",
      "format": "multiple-choice", "questionText": "Which value of x solves 2x + 1 = 7?",
      "options": ["A. 2", "B. 3", "C. 4", "D. 6"], "correctAnswer": "B",
      "maxMarks": 3, "pqpData": { "questionNumber": "1.1" }
    },
    {
      "id": "alg-2", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Algebra", "cognitiveLevel": "Level 2",
      "format": "short_answer", "questionText": "Solve for x: 3x - 4 = 5",
      "correctAnswer": "x = 3", "answerType": "algebraic",
      "maxMarks": 4, "pqpData": { "questionNumber": "1.2" }
    },
    {
      "id": "alg-3", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Algebra", "cognitiveLevel": "Level 2",
      "format": "fill-in-blanks", "questionText": "The roots of x^2 - 5x + 6 = 0 are ___ and ___.",
      "correctAnswers": ["2", "3"], "maxMarks": 3, "pqpData": { "questionNumber": "1.3" }
    },
    {
      "id": "alg-4", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Algebra", "cognitiveLevel": "Level 1",
      "format": "true-false", "questionText": "x^2 + 1 = 0 has real roots.",
      "correctAnswer": "false", "maxMarks": 2, "pqpData": { "questionNumber": "1.4" }
    },
    {
      "id": "fn-1", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Functions", "cognitiveLevel": "Level 2",
      "format": "multiple-choice", "questionText": "What is the range of f(x) = x^2 + 2?",
      "options": ["A. y >= 0", "B. y >= 2", "C. y <= 2", "D. all real y"], "correctAnswer": "B",
      "maxMarks": 4, "pqpData": { "questionNumber": "2.1" }
    },
    {
      "id": "fn-2", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Functions", "cognitiveLevel": "Level 3",
      "format": "drag-and-drop", "questionText": "Order the steps to find the inverse of f(x) = 2x + 1.",
      "dragItems": ["Write y = 2x + 1", "Swap x and y", "Solve for y", "Write f^-1(x)"],
      "correctOrder": ["Write y = 2x + 1", "Swap x and y", "Solve for y", "Write f^-1(x)"],
      "maxMarks": 4, "pqpData": { "questionNumber": "2.2" }
    },
    {
      "id": "fn-3", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Functions", "cognitiveLevel": "Level 2",
      "format": "short_answer", "questionText": "Evaluate f(3) for f(x) = x^2 + 3.",
      "correctAnswer": "12", "answerType": "numerical", "tolerance": 0.01,
      "maxMarks": 3, "pqpData": { "questionNumber": "2.3" }
    },
    {
      "id": "fn-4", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Functions", "cognitiveLevel": "Level 3",
      "format": "drag-and-drop", "questionText": "Match each function to its graph shape.",
      "dragItems": ["parabola", "hyperbola", "exponential"],
      "dragTargets": [
        { "id": "t1", "label": "y = x^2", "correctPair": "parabola" },
        { "id": "t2", "label": "y = 1/x", "correctPair": "hyperbola" },
        { "id": "t3", "label": "y = 2^x", "correctPair": "exponential" }
      ],
      "maxMarks": 3, "pqpData": { "questionNumber": "2.4" }
    },
    {
      "id": "calc-1", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Calculus",
      "isParent": true, "childQuestionIds": ["calc-1a", "calc-1b"],
      "questionText": "Given f(x) = x^3 - 3x^2 + 4.", "pqpData": { "questionNumber": "3" }
    },
    {
      "id": "calc-1a", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Calculus", "cognitiveLevel": "Level 2",
      "format": "short_answer", "parentQuestionId": "calc-1", "questionText": "Calculate f'(1).",
      "correctAnswer": "-3", "answerType": "numerical",
      "maxMarks": 4, "pqpData": { "questionNumber": "3.1" }
    },
    {
      "id": "calc-1b", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Calculus", "cognitiveLevel": "Level 3",
      "format": "short_answer", "parentQuestionId": "calc-1", "questionText": "Determine f'(x).",
      "correctAnswer": "3x^2 - 6x", "answerType": "algebraic",
      "maxMarks": 3, "pqpData": { "questionNumber": "3.2" }
    },
    {
      "id": "calc-2", "subject": "mathematics", "grade": 12, "paper": "p1",
      "year": 2023, "season": "november", "topic": "Calculus", "cognitiveLevel": "Level 1",
      "format": "multiple-choice", "questionText": "What is the derivative of 5x?",
      "options": ["A. 5", "B. x", "C. 5x", "D. 0"], "correctAnswer": "A",
      "maxMarks": 3, "pqpData": { "questionNumber": "3.3" }
    }
  ]
}
"#;

const SAMPLE_ANSWERS: &str = r#"{
  "submissions": {
    "alg-1": "B",
    "alg-2": "x=3",
    "fn-3": "12.0",
    "fn-4": { "answer": "t1:parabola, t2:exponential, t3:hyperbola" },
    "calc-2": null
  },
  "subject": "mathematics",
  "paper": "p1",
  "mode": "standard"
}
"#;
