// src/models/record.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::session::SessionAnswers;

/// Represents the 'records' table in the database.
/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub paper_id: i64,
    pub user_id: i64,
    pub score: f64,

    /// Seconds spent on the attempt.
    pub total_time: i64,

    /// Snapshot of the final answers, one slot per question.
    pub answers: SessionAnswers,

    pub submit_time: DateTime<Utc>,
}

/// A record before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub paper_id: i64,
    pub user_id: i64,
    pub score: f64,
    pub total_time: i64,
    pub answers: SessionAnswers,
    pub submit_time: DateTime<Utc>,
}

impl NewRecord {
    pub fn into_record(self, id: i64) -> Record {
        Record {
            id,
            paper_id: self.paper_id,
            user_id: self.user_id,
            score: self.score,
            total_time: self.total_time,
            answers: self.answers,
            submit_time: self.submit_time,
        }
    }
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRecordRequest {
    pub paper_id: i64,

    pub answers: SessionAnswers,

    /// Client-measured seconds; clamped server side.
    #[validate(range(min = 0))]
    pub total_time: i64,
}

/// Points awarded for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub question_id: i64,
    pub points: f64,
}

/// DTO returned after a successful submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRecordResponse {
    pub record: Record,
    pub per_question: Vec<QuestionScore>,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub user_id: i64,
    pub username: String,
    pub score: f64,
    pub total_time: i64,
    pub submit_date: DateTime<Utc>,
    pub rank: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RankingResponse {
    /// Students the paper was pushed to, whether or not they submitted.
    pub total_assigned: usize,
    pub ranking: Vec<RankingEntry>,
}

/// Row of the caller's record history.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: i64,
    pub paper_id: i64,
    pub paper_name: Option<String>,
    pub score: f64,
    pub total_time: i64,
    pub submit_time: DateTime<Utc>,
}
