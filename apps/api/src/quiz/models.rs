//! Quiz domain types: the request shape and the accepted quiz.
//!
//! `Question` is a closed union keyed by the `type` discriminator. Values of
//! these types are only constructed by the validator, so every `Quiz` in
//! circulation already satisfies the structural and cross-field invariants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Literal marker a fill-in-the-blank prompt must contain.
pub const BLANK_MARKER: &str = "____";

pub const MIN_QUESTION_COUNT: u32 = 1;
pub const MAX_QUESTION_COUNT: u32 = 100;

/// Declared question-format constraint for a whole quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    Mcq,
    FillBlank,
    Identification,
    Matching,
    Mixed,
}

impl QuizType {
    pub const ALL: [QuizType; 5] = [
        QuizType::Mcq,
        QuizType::FillBlank,
        QuizType::Identification,
        QuizType::Matching,
        QuizType::Mixed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuizType::Mcq => "mcq",
            QuizType::FillBlank => "fill_blank",
            QuizType::Identification => "identification",
            QuizType::Matching => "matching",
            QuizType::Mixed => "mixed",
        }
    }

    /// Whether a question of `kind` is permitted in a quiz of this type.
    pub fn permits(self, kind: QuestionKind) -> bool {
        match self {
            QuizType::Mixed => true,
            QuizType::Mcq => kind == QuestionKind::Mcq,
            QuizType::FillBlank => kind == QuestionKind::FillBlank,
            QuizType::Identification => kind == QuestionKind::Identification,
            QuizType::Matching => kind == QuestionKind::Matching,
        }
    }
}

impl fmt::Display for QuizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuizType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// Variant tag of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Mcq,
    FillBlank,
    Identification,
    Matching,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Mcq => "mcq",
            QuestionKind::FillBlank => "fill_blank",
            QuestionKind::Identification => "identification",
            QuestionKind::Matching => "matching",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mcq" => Some(QuestionKind::Mcq),
            "fill_blank" => Some(QuestionKind::FillBlank),
            "identification" => Some(QuestionKind::Identification),
            "matching" => Some(QuestionKind::Matching),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(()),
        }
    }
}

/// The requested quiz shape. Only constructed through [`GenerationRequest::new`],
/// which enforces the question count range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    quiz_type: QuizType,
    question_count: u32,
    difficulty: Option<Difficulty>,
}

impl GenerationRequest {
    pub fn new(
        quiz_type: QuizType,
        question_count: u32,
        difficulty: Option<Difficulty>,
    ) -> Option<Self> {
        (MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT)
            .contains(&question_count)
            .then_some(Self {
                quiz_type,
                question_count,
                difficulty,
            })
    }

    pub fn quiz_type(&self) -> QuizType {
        self.quiz_type
    }

    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Accepted quiz
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub quiz_title: String,
    pub quiz_type: QuizType,
    pub question_count: u32,
    pub source_summary: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    Mcq(McqQuestion),
    FillBlank(FillBlankQuestion),
    Identification(IdentificationQuestion),
    Matching(MatchingQuestion),
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::Mcq(_) => QuestionKind::Mcq,
            Question::FillBlank(_) => QuestionKind::FillBlank,
            Question::Identification(_) => QuestionKind::Identification,
            Question::Matching(_) => QuestionKind::Matching,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqQuestion {
    pub id: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub answer_index: usize,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillBlankQuestion {
    pub id: String,
    pub prompt: String,
    pub answers: Vec<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationQuestion {
    pub id: String,
    pub prompt: String,
    pub answers: Vec<String>,
    pub explanation: String,
}

/// Pairs are kept in canonical (model-emitted) order; display shuffling is a
/// client concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingQuestion {
    pub id: String,
    pub pairs: Vec<MatchingPair>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}
