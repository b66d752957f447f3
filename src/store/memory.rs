// src/store/memory.rs

use std::{
    collections::{BTreeMap, HashMap},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

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
    store::Store,
};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    questions: HashMap<i64, Question>,
    papers: BTreeMap<i64, Paper>,
    sessions: HashMap<(i64, i64), AttemptSession>,
    records: Vec<Record>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Store for deployments without a database, and for tests.
///
/// All tables sit behind one lock, so every trait call is atomic on its own
/// and `commit_submission` needs nothing extra.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, AppError> {
        self.tables
            .read()
            .map_err(|_| AppError::StoreFailure("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, AppError> {
        self.tables
            .write()
            .map_err(|_| AppError::StoreFailure("memory store lock poisoned".to_string()))
    }

    /// Adds a user; `user.id` is replaced by a fresh id.
    pub fn insert_user(&self, mut user: User) -> Result<User, AppError> {
        let mut tables = self.write()?;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::BadRequest(format!(
                "Username '{}' already exists",
                user.username
            )));
        }
        user.id = tables.next_id();
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Adds a question; `question.id` is replaced by a fresh id.
    pub fn insert_question(&self, mut question: Question) -> Result<Question, AppError> {
        let mut tables = self.write()?;
        question.id = tables.next_id();
        tables.questions.insert(question.id, question.clone());
        Ok(question)
    }

    /// Adds a paper; `paper.id` is replaced by a fresh id.
    pub fn insert_paper(&self, mut paper: Paper) -> Result<Paper, AppError> {
        let mut tables = self.write()?;
        paper.id = tables.next_id();
        tables.papers.insert(paper.id, paper.clone());
        Ok(paper)
    }

    /// Replaces a stored paper, e.g. to republish it.
    pub fn save_paper(&self, paper: Paper) -> Result<(), AppError> {
        let mut tables = self.write()?;
        if !tables.papers.contains_key(&paper.id) {
            return Err(AppError::NotFound("Paper not found".to_string()));
        }
        tables.papers.insert(paper.id, paper);
        Ok(())
    }

    /// Overwrites a session wholesale, bypassing the create-once rule.
    pub fn put_attempt_session(&self, session: AttemptSession) -> Result<(), AppError> {
        let mut tables = self.write()?;
        tables
            .sessions
            .insert((session.user_id, session.paper_id), session);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_users_in_groups(&self, group_ids: &[i64]) -> Result<Vec<User>, AppError> {
        Ok(self
            .read()?
            .users
            .values()
            .filter(|u| u.group_id.is_some_and(|g| group_ids.contains(&g)))
            .cloned()
            .collect())
    }

    async fn list_students(&self) -> Result<Vec<User>, AppError> {
        Ok(self
            .read()?
            .users
            .values()
            .filter(|u| u.is_student())
            .cloned()
            .collect())
    }

    async fn get_paper(&self, id: i64) -> Result<Option<Paper>, AppError> {
        Ok(self.read()?.papers.get(&id).cloned())
    }

    async fn list_papers(&self) -> Result<Vec<Paper>, AppError> {
        Ok(self.read()?.papers.values().cloned().collect())
    }

    async fn get_questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        let tables = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.questions.get(id).cloned())
            .collect())
    }

    async fn get_attempt_session(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<AttemptSession>, AppError> {
        Ok(self.read()?.sessions.get(&(user_id, paper_id)).cloned())
    }

    async fn create_attempt_session(
        &self,
        session: AttemptSession,
    ) -> Result<AttemptSession, AppError> {
        let mut tables = self.write()?;
        let stored = tables
            .sessions
            .entry((session.user_id, session.paper_id))
            .or_insert(session);
        Ok(stored.clone())
    }

    async fn update_attempt_session(
        &self,
        user_id: i64,
        paper_id: i64,
        answers: &SessionAnswers,
        last_question_start_time: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.write()?;
        match tables.sessions.get_mut(&(user_id, paper_id)) {
            Some(session) => {
                session.answers = answers.clone();
                session.last_question_start_time = last_question_start_time;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_attempt_session(&self, user_id: i64, paper_id: i64) -> Result<bool, AppError> {
        Ok(self.write()?.sessions.remove(&(user_id, paper_id)).is_some())
    }

    async fn get_record_by_user_and_paper(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<Record>, AppError> {
        Ok(self
            .read()?
            .records
            .iter()
            .filter(|r| r.user_id == user_id && r.paper_id == paper_id)
            .max_by_key(|r| r.submit_time)
            .cloned())
    }

    async fn create_record(&self, record: NewRecord) -> Result<Record, AppError> {
        let mut tables = self.write()?;
        let record = record.into_record(tables.next_id());
        tables.records.push(record.clone());
        Ok(record)
    }

    async fn get_records_by_paper(&self, paper_id: i64) -> Result<Vec<Record>, AppError> {
        Ok(self
            .read()?
            .records
            .iter()
            .filter(|r| r.paper_id == paper_id)
            .cloned()
            .collect())
    }

    async fn get_records_by_user(&self, user_id: i64) -> Result<Vec<Record>, AppError> {
        let mut records: Vec<Record> = self
            .read()?
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.submit_time.cmp(&a.submit_time));
        Ok(records)
    }

    async fn commit_submission(&self, record: NewRecord) -> Result<Option<Record>, AppError> {
        let mut tables = self.write()?;
        if tables
            .sessions
            .remove(&(record.user_id, record.paper_id))
            .is_none()
        {
            return Ok(None);
        }
        let record = record.into_record(tables.next_id());
        tables.records.push(record.clone());
        Ok(Some(record))
    }
}
