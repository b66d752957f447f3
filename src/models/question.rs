// src/models/question.rs

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Options shown for every judge (true/false) question, letters A and B.
pub const JUDGE_OPTIONS: [&str; 2] = ["True", "False"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multiple,
    Judge,
}

impl QuestionType {
    /// Presentation order of the question groups inside a paper.
    pub const ALL: [QuestionType; 3] = [QuestionType::Single, QuestionType::Multiple, QuestionType::Judge];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Single => "single",
            QuestionType::Multiple => "multiple",
            QuestionType::Judge => "judge",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(QuestionType::Single),
            "multiple" => Ok(QuestionType::Multiple),
            "judge" => Ok(QuestionType::Judge),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// An answer as stored or submitted.
///
/// Single and judge answers are one letter (`"A"`). Multi-select answers may
/// arrive either as a list (`["A", "C"]`) or as a packed string (`"AC"`,
/// `"A,C"`); both are read as a set of letters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(String),
    Choices(Vec<String>),
}

impl Answer {
    /// The single selected value, if this answer holds exactly one.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Answer::Choice(s) => Some(s.as_str()),
            Answer::Choices(v) if v.len() == 1 => v.first().map(String::as_str),
            Answer::Choices(_) => None,
        }
    }

    /// Selected option letters, upper-cased. Separators are ignored.
    pub fn letters(&self) -> BTreeSet<char> {
        let pick = |s: &str| {
            s.chars()
                .filter(char::is_ascii_alphabetic)
                .map(|c| c.to_ascii_uppercase())
                .collect::<Vec<_>>()
        };
        match self {
            Answer::Choice(s) => pick(s).into_iter().collect(),
            Answer::Choices(v) => v.iter().flat_map(|s| pick(s)).collect(),
        }
    }
}

/// A question as held by the question bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Mapped from the storage column 'type' since `type` is a reserved keyword in Rust.
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// The text content of the question.
    pub content: String,

    /// Ordered option texts. Absent for judge questions, which use [`JUDGE_OPTIONS`].
    pub options: Option<Vec<String>>,

    /// The canonical answer.
    pub answer: Answer,
}

/// DTO for sending question to client (excludes answer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        let options = match q.question_type {
            QuestionType::Judge => JUDGE_OPTIONS.iter().map(|s| s.to_string()).collect(),
            _ => q.options.clone().unwrap_or_default(),
        };
        Self {
            id: q.id,
            question_type: q.question_type,
            content: q.content.clone(),
            options,
        }
    }
}
