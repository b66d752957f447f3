// src/store/mod.rs

//! Persistence seam of the exam core.
//!
//! Handlers and services only ever see `dyn Store`; which engine sits behind
//! it is decided once at startup.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        paper::Paper,
        question::Question,
        record::{NewRecord, Record},
        session::{AttemptSession, SessionAnswers},
        user::User,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn get_users_in_groups(&self, group_ids: &[i64]) -> Result<Vec<User>, AppError>;
    async fn list_students(&self) -> Result<Vec<User>, AppError>;

    // Papers and questions (read-only for the core)
    async fn get_paper(&self, id: i64) -> Result<Option<Paper>, AppError>;
    async fn list_papers(&self) -> Result<Vec<Paper>, AppError>;
    async fn get_questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError>;

    // Attempt sessions
    async fn get_attempt_session(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<AttemptSession>, AppError>;

    /// Inserts `session` unless one already exists for the pair, and returns
    /// whichever session is stored afterwards.
    async fn create_attempt_session(
        &self,
        session: AttemptSession,
    ) -> Result<AttemptSession, AppError>;

    /// Returns `false` when there was no session to update.
    async fn update_attempt_session(
        &self,
        user_id: i64,
        paper_id: i64,
        answers: &SessionAnswers,
        last_question_start_time: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn delete_attempt_session(&self, user_id: i64, paper_id: i64) -> Result<bool, AppError>;

    // Records
    /// Most recent record of the user for the paper.
    async fn get_record_by_user_and_paper(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<Record>, AppError>;
    async fn create_record(&self, record: NewRecord) -> Result<Record, AppError>;
    async fn get_records_by_paper(&self, paper_id: i64) -> Result<Vec<Record>, AppError>;
    async fn get_records_by_user(&self, user_id: i64) -> Result<Vec<Record>, AppError>;

    /// Deletes the live session of `(record.user_id, record.paper_id)` and
    /// inserts `record` as one unit.
    ///
    /// `Ok(None)` means the session was already gone and nothing was written.
    /// On `Err` neither change is visible.
    async fn commit_submission(&self, record: NewRecord) -> Result<Option<Record>, AppError>;
}
