// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    paper::PaperInfo,
    question::{Answer, PublicQuestion},
};

/// One slot of the answer list. `answer: None` marks a question that timed
/// out unanswered; such a slot is locked for the rest of the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: i64,
    pub answer: Option<Answer>,
}

/// Answers in presentation order.
///
/// Kept as a list rather than a map so insertion order survives storage
/// engines that reorder object keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionAnswers(Vec<AnswerEntry>);

impl SessionAnswers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnswerEntry> {
        self.0.iter()
    }

    /// `None` if the question has no slot, `Some(None)` if it timed out.
    pub fn get(&self, question_id: i64) -> Option<Option<&Answer>> {
        self.0
            .iter()
            .find(|e| e.question_id == question_id)
            .map(|e| e.answer.as_ref())
    }

    pub fn contains(&self, question_id: i64) -> bool {
        self.0.iter().any(|e| e.question_id == question_id)
    }

    pub fn is_locked(&self, question_id: i64) -> bool {
        matches!(self.get(question_id), Some(None))
    }

    /// Overwrites the slot for `question_id` or appends a new one.
    /// Returns `true` when a slot was appended.
    pub fn upsert(&mut self, question_id: i64, answer: Option<Answer>) -> bool {
        match self.0.iter_mut().find(|e| e.question_id == question_id) {
            Some(entry) => {
                entry.answer = answer;
                false
            }
            None => {
                self.0.push(AnswerEntry { question_id, answer });
                true
            }
        }
    }

    /// Copies incoming answers onto slots that already exist.
    ///
    /// Locked slots stay locked and questions without a slot are left
    /// alone; appending is the caller's decision.
    pub fn merge_from(&mut self, incoming: &SessionAnswers) {
        for entry in &mut self.0 {
            if entry.answer.is_none() {
                continue;
            }
            if let Some(answer) = incoming.get(entry.question_id) {
                entry.answer = answer.cloned();
            }
        }
    }
}

impl FromIterator<AnswerEntry> for SessionAnswers {
    fn from_iter<I: IntoIterator<Item = AnswerEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Represents the 'attempt_sessions' table: one live attempt per (user, paper).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSession {
    pub user_id: i64,
    pub paper_id: i64,

    /// First-ever entry into the exam.
    pub start_time: DateTime<Utc>,

    /// When the current unanswered question started.
    pub last_question_start_time: DateTime<Utc>,

    pub answers: SessionAnswers,
}

impl AttemptSession {
    pub fn new(user_id: i64, paper_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            paper_id,
            start_time: now,
            last_question_start_time: now,
            answers: SessionAnswers::new(),
        }
    }
}

/// Where the student picks up after (re)loading the exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeState {
    pub start_time: DateTime<Utc>,
    pub last_question_start_time: DateTime<Utc>,
    pub answers: SessionAnswers,
    pub resume_index: usize,
    pub remaining_seconds: i64,
    pub skipped: usize,

    /// Every question is consumed; the client should submit right away.
    pub finished: bool,
}

/// Response body of the "fetch exam" endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExamPayload {
    pub paper: PaperInfo,
    pub questions: Vec<PublicQuestion>,
    pub session: ResumeState,
}

/// DTO for saving progress.
#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub answers: SessionAnswers,
    pub last_question_start_time: DateTime<Utc>,
}

/// Response body of the "save progress" endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateSessionResponse {
    /// `false` when there was no live session to write to.
    pub updated: bool,
    pub session: Option<ResumeState>,
}

/// DTO for recording a single answer.
#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    pub question_id: i64,
    pub answer: Option<Answer>,
}
