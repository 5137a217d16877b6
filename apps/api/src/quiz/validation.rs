//! Quiz Validator. Turns parsed model output into an accepted [`Quiz`] or an
//! itemized list of violations.
//!
//! # Rules
//! - Structural: required fields present, no unrecognized fields, numeric
//!   ranges, minimum collection sizes, variant tag is one of the four kinds.
//!   All structural violations are collected in a single pass.
//! - Per question, once its own fields are well-formed: MCQ `answer_index`
//!   must index into `choices`; matching `left`/`right` values must each be
//!   pairwise distinct.
//! - Quiz level, once everything above passes: `question_count` must equal
//!   the number of questions, and a non-mixed quiz may only contain questions
//!   of its declared type (the first offender is reported).
//!
//! Acceptance is all-or-nothing: any violation rejects the whole quiz.

use std::collections::HashSet;
use std::fmt::Display;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::quiz::models::{
    FillBlankQuestion, IdentificationQuestion, MatchingPair, MatchingQuestion, McqQuestion,
    Question, QuestionKind, Quiz, QuizType, BLANK_MARKER, MAX_QUESTION_COUNT, MIN_QUESTION_COUNT,
};

const QUIZ_FIELDS: &[&str] = &[
    "quiz_title",
    "quiz_type",
    "question_count",
    "source_summary",
    "questions",
];
const MCQ_FIELDS: &[&str] = &["id", "type", "prompt", "choices", "answer_index", "explanation"];
const ANSWERS_FIELDS: &[&str] = &["id", "type", "prompt", "answers", "explanation"];
const MATCHING_FIELDS: &[&str] = &["id", "type", "pairs", "explanation"];
const PAIR_FIELDS: &[&str] = &["left", "right"];

const MIN_MCQ_CHOICES: usize = 4;
const MIN_MATCHING_PAIRS: usize = 4;
const MAX_MATCHING_PAIRS: usize = 10;

/// A single rejected field: dotted path from the quiz root plus a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

/// Validates parsed model output. Never returns a partially accepted quiz.
pub fn validate_quiz(value: &Value) -> Result<Quiz, Vec<Violation>> {
    let mut checker = Checker::default();
    let quiz = checker.quiz(value);

    match quiz {
        Some(quiz) if checker.violations.is_empty() => {
            checker.cross_field(&quiz);
            if checker.violations.is_empty() {
                Ok(quiz)
            } else {
                Err(checker.violations)
            }
        }
        _ => Err(checker.violations),
    }
}

fn join(base: &str, segment: impl Display) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

/// Integral JSON number, accepting `5.0` as well as `5`.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
        .map(|f| f as i64)
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn fail(&mut self, path: String, message: impl Into<String>) {
        self.violations.push(Violation {
            path,
            message: message.into(),
        });
    }

    fn reject_unknown(&mut self, path: &str, obj: &Map<String, Value>, allowed: &[&str]) {
        for key in obj.keys() {
            if !allowed.contains(&key.as_str()) {
                self.fail(join(path, key), format!("unrecognized field '{key}'"));
            }
        }
    }

    fn field<'v>(&mut self, obj: &'v Map<String, Value>, path: &str, key: &str) -> Option<&'v Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.fail(join(path, key), "required field is missing");
        }
        value
    }

    fn string(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        non_empty: bool,
    ) -> Option<String> {
        let value = self.field(obj, path, key)?;
        match value.as_str() {
            Some(s) if non_empty && s.is_empty() => {
                self.fail(join(path, key), "must not be empty");
                None
            }
            Some(s) => Some(s.to_string()),
            None => {
                self.fail(join(path, key), "expected string");
                None
            }
        }
    }

    fn array<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        path: &str,
        key: &str,
        min: usize,
        max: Option<usize>,
    ) -> Option<&'v Vec<Value>> {
        let value = self.field(obj, path, key)?;
        let Some(items) = value.as_array() else {
            self.fail(join(path, key), "expected array");
            return None;
        };
        if items.len() < min {
            self.fail(
                join(path, key),
                format!("expected at least {min} item(s), got {}", items.len()),
            );
            return None;
        }
        if let Some(max) = max {
            if items.len() > max {
                self.fail(
                    join(path, key),
                    format!("expected at most {max} item(s), got {}", items.len()),
                );
                return None;
            }
        }
        Some(items)
    }

    /// Array of non-empty strings with a minimum length.
    fn string_list(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        min: usize,
    ) -> Option<Vec<String>> {
        let items = self.array(obj, path, key, min, None)?;
        let list_path = join(path, key);
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;

        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some("") => {
                    self.fail(join(&list_path, i), "must not be empty");
                    ok = false;
                }
                Some(s) => out.push(s.to_string()),
                None => {
                    self.fail(join(&list_path, i), "expected string");
                    ok = false;
                }
            }
        }

        ok.then_some(out)
    }

    fn integer(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        min: i64,
        max: Option<i64>,
    ) -> Option<i64> {
        let value = self.field(obj, path, key)?;
        let Some(n) = as_integer(value) else {
            self.fail(join(path, key), "expected integer");
            return None;
        };
        if n < min {
            self.fail(join(path, key), format!("must be >= {min}"));
            return None;
        }
        if let Some(max) = max {
            if n > max {
                self.fail(join(path, key), format!("must be <= {max}"));
                return None;
            }
        }
        Some(n)
    }

    // ── quiz ────────────────────────────────────────────────────────────────

    fn quiz(&mut self, value: &Value) -> Option<Quiz> {
        let Some(obj) = value.as_object() else {
            self.fail(String::new(), "expected object");
            return None;
        };
        self.reject_unknown("", obj, QUIZ_FIELDS);

        let quiz_title = self.string(obj, "", "quiz_title", true);
        let quiz_type = self.quiz_type(obj);
        let question_count = self.integer(
            obj,
            "",
            "question_count",
            MIN_QUESTION_COUNT as i64,
            Some(MAX_QUESTION_COUNT as i64),
        );
        let source_summary = self.string(obj, "", "source_summary", true);
        let questions = self.questions(obj);

        Some(Quiz {
            quiz_title: quiz_title?,
            quiz_type: quiz_type?,
            question_count: question_count? as u32,
            source_summary: source_summary?,
            questions: questions?,
        })
    }

    fn quiz_type(&mut self, obj: &Map<String, Value>) -> Option<QuizType> {
        let value = self.field(obj, "", "quiz_type")?;
        let parsed = value.as_str().and_then(|s| s.parse::<QuizType>().ok());
        if parsed.is_none() {
            self.fail(
                "quiz_type".to_string(),
                "expected one of mcq, fill_blank, identification, matching, mixed",
            );
        }
        parsed
    }

    fn questions(&mut self, obj: &Map<String, Value>) -> Option<Vec<Question>> {
        let items = self.array(
            obj,
            "",
            "questions",
            MIN_QUESTION_COUNT as usize,
            Some(MAX_QUESTION_COUNT as usize),
        )?;

        // Every question is visited so all violations are reported together.
        let parsed: Vec<Option<Question>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| self.question(&join("questions", i), item))
            .collect();

        parsed.into_iter().collect()
    }

    fn cross_field(&mut self, quiz: &Quiz) {
        if quiz.question_count as usize != quiz.questions.len() {
            self.fail(
                "question_count".to_string(),
                format!(
                    "question_count must equal questions.length ({} != {})",
                    quiz.question_count,
                    quiz.questions.len()
                ),
            );
        }

        if quiz.quiz_type != QuizType::Mixed {
            let mismatch = quiz
                .questions
                .iter()
                .enumerate()
                .find(|(_, q)| !quiz.quiz_type.permits(q.kind()));
            if let Some((i, q)) = mismatch {
                self.fail(
                    join(&join("questions", i), "type"),
                    format!(
                        "All question.type values must be {} when quiz_type is not mixed (found {})",
                        quiz.quiz_type,
                        q.kind().as_str()
                    ),
                );
            }
        }
    }

    // ── questions ───────────────────────────────────────────────────────────

    fn question(&mut self, path: &str, value: &Value) -> Option<Question> {
        let Some(obj) = value.as_object() else {
            self.fail(path.to_string(), "expected object");
            return None;
        };

        let tag = self.field(obj, path, "type")?;
        let Some(kind) = tag.as_str().and_then(QuestionKind::parse) else {
            self.fail(
                join(path, "type"),
                "expected one of mcq, fill_blank, identification, matching",
            );
            return None;
        };

        match kind {
            QuestionKind::Mcq => self.mcq(path, obj),
            QuestionKind::FillBlank => self.fill_blank(path, obj),
            QuestionKind::Identification => self.identification(path, obj),
            QuestionKind::Matching => self.matching(path, obj),
        }
    }

    fn mcq(&mut self, path: &str, obj: &Map<String, Value>) -> Option<Question> {
        self.reject_unknown(path, obj, MCQ_FIELDS);
        let id = self.string(obj, path, "id", true);
        let prompt = self.string(obj, path, "prompt", true);
        let choices = self.string_list(obj, path, "choices", MIN_MCQ_CHOICES);
        let answer_index = self.integer(obj, path, "answer_index", 0, None);
        let explanation = self.string(obj, path, "explanation", true);

        let choices = choices?;
        let answer_index = answer_index? as usize;
        if answer_index >= choices.len() {
            self.fail(
                join(path, "answer_index"),
                format!(
                    "answer_index must reference a valid choice (0..{})",
                    choices.len()
                ),
            );
            return None;
        }

        Some(Question::Mcq(McqQuestion {
            id: id?,
            prompt: prompt?,
            choices,
            answer_index,
            explanation: explanation?,
        }))
    }

    fn fill_blank(&mut self, path: &str, obj: &Map<String, Value>) -> Option<Question> {
        self.reject_unknown(path, obj, ANSWERS_FIELDS);
        let id = self.string(obj, path, "id", true);
        let prompt = self.string(obj, path, "prompt", false).and_then(|p| {
            if p.contains(BLANK_MARKER) {
                Some(p)
            } else {
                self.fail(
                    join(path, "prompt"),
                    format!("fill_blank prompt must include {BLANK_MARKER}"),
                );
                None
            }
        });
        let answers = self.string_list(obj, path, "answers", 1);
        let explanation = self.string(obj, path, "explanation", true);

        Some(Question::FillBlank(FillBlankQuestion {
            id: id?,
            prompt: prompt?,
            answers: answers?,
            explanation: explanation?,
        }))
    }

    fn identification(&mut self, path: &str, obj: &Map<String, Value>) -> Option<Question> {
        self.reject_unknown(path, obj, ANSWERS_FIELDS);
        let id = self.string(obj, path, "id", true);
        let prompt = self.string(obj, path, "prompt", true);
        let answers = self.string_list(obj, path, "answers", 1);
        let explanation = self.string(obj, path, "explanation", true);

        Some(Question::Identification(IdentificationQuestion {
            id: id?,
            prompt: prompt?,
            answers: answers?,
            explanation: explanation?,
        }))
    }

    fn matching(&mut self, path: &str, obj: &Map<String, Value>) -> Option<Question> {
        self.reject_unknown(path, obj, MATCHING_FIELDS);
        let id = self.string(obj, path, "id", true);
        let pairs = self.pairs(path, obj);
        let explanation = self.string(obj, path, "explanation", true);

        let pairs = pairs?;
        let lefts: HashSet<&str> = pairs.iter().map(|p| p.left.as_str()).collect();
        let rights: HashSet<&str> = pairs.iter().map(|p| p.right.as_str()).collect();
        if lefts.len() != pairs.len() || rights.len() != pairs.len() {
            self.fail(
                join(path, "pairs"),
                "matching pairs must have unique left/right values",
            );
            return None;
        }

        Some(Question::Matching(MatchingQuestion {
            id: id?,
            pairs,
            explanation: explanation?,
        }))
    }

    fn pairs(&mut self, path: &str, obj: &Map<String, Value>) -> Option<Vec<MatchingPair>> {
        let items = self.array(
            obj,
            path,
            "pairs",
            MIN_MATCHING_PAIRS,
            Some(MAX_MATCHING_PAIRS),
        )?;
        let pairs_path = join(path, "pairs");

        let parsed: Vec<Option<MatchingPair>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let pair_path = join(&pairs_path, i);
                let Some(pair) = item.as_object() else {
                    self.fail(pair_path, "expected object");
                    return None;
                };
                self.reject_unknown(&pair_path, pair, PAIR_FIELDS);
                let left = self.string(pair, &pair_path, "left", true);
                let right = self.string(pair, &pair_path, "right", true);
                Some(MatchingPair {
                    left: left?,
                    right: right?,
                })
            })
            .collect();

        parsed.into_iter().collect()
    }
}
