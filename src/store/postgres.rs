// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::AppError,
    models::{
        paper::{Paper, PaperQuestions},
        question::{Answer, Question},
        record::{NewRecord, Record},
        session::{AttemptSession, SessionAnswers},
        user::{ROLE_STUDENT, User},
    },
    store::Store,
};

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    role: String,
    group_id: Option<i64>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password: row.password,
            role: row.role,
            group_id: row.group_id,
        }
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    question_type: String,
    content: String,
    options: Option<Json<Vec<String>>>,
    answer: Json<Answer>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let question_type = row.question_type.parse().map_err(|e| {
            AppError::InternalServerError(format!("question {} has invalid type: {}", row.id, e))
        })?;
        Ok(Self {
            id: row.id,
            question_type,
            content: row.content,
            options: row.options.map(|o| o.0),
            answer: row.answer.0,
        })
    }
}

#[derive(FromRow)]
struct PaperRow {
    id: i64,
    name: String,
    questions: Json<PaperQuestions>,
    rules: Json<serde_json::Value>,
    published: bool,
    target_groups: Json<Vec<i64>>,
    target_users: Json<Vec<i64>>,
    deadline: Option<DateTime<Utc>>,
    publish_date: Option<DateTime<Utc>>,
}

impl From<PaperRow> for Paper {
    fn from(row: PaperRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            questions: row.questions.0,
            rules: row.rules.0,
            published: row.published,
            target_groups: row.target_groups.0,
            target_users: row.target_users.0,
            deadline: row.deadline,
            publish_date: row.publish_date,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    user_id: i64,
    paper_id: i64,
    start_time: DateTime<Utc>,
    last_question_start_time: DateTime<Utc>,
    answers: Json<SessionAnswers>,
}

impl From<SessionRow> for AttemptSession {
    fn from(row: SessionRow) -> Self {
        Self {
            user_id: row.user_id,
            paper_id: row.paper_id,
            start_time: row.start_time,
            last_question_start_time: row.last_question_start_time,
            answers: row.answers.0,
        }
    }
}

#[derive(FromRow)]
struct RecordRow {
    id: i64,
    paper_id: i64,
    user_id: i64,
    score: f64,
    total_time: i64,
    answers: Json<SessionAnswers>,
    submit_time: DateTime<Utc>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Self {
            id: row.id,
            paper_id: row.paper_id,
            user_id: row.user_id,
            score: row.score,
            total_time: row.total_time,
            answers: row.answers.0,
            submit_time: row.submit_time,
        }
    }
}

const USER_COLUMNS: &str = "id, username, password, role, group_id";
const PAPER_COLUMNS: &str = "id, name, questions, rules, published, target_groups, target_users, deadline, publish_date";
const SESSION_COLUMNS: &str = "user_id, paper_id, start_time, last_question_start_time, answers";
const RECORD_COLUMNS: &str = "id, paper_id, user_id, score, total_time, answers, submit_time";

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_users_in_groups(&self, group_ids: &[i64]) -> Result<Vec<User>, AppError> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Dynamic IN clause
        let mut query_builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM users WHERE group_id IN (",
            USER_COLUMNS
        ));
        let mut separated = query_builder.separated(",");
        for id in group_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<UserRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_students(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY id",
            USER_COLUMNS
        ))
        .bind(ROLE_STUDENT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn get_paper(&self, id: i64) -> Result<Option<Paper>, AppError> {
        let row = sqlx::query_as::<_, PaperRow>(&format!(
            "SELECT {} FROM papers WHERE id = $1",
            PAPER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Paper::from))
    }

    async fn list_papers(&self) -> Result<Vec<Paper>, AppError> {
        let rows = sqlx::query_as::<_, PaperRow>(&format!(
            "SELECT {} FROM papers ORDER BY id",
            PAPER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Paper::from).collect())
    }

    async fn get_questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Postgres>::new(
            "SELECT id, type AS question_type, content, options, answer FROM questions WHERE id IN (",
        );
        let mut separated = query_builder.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<QuestionRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        // IN does not preserve order; put rows back in the order asked for.
        let mut by_id: HashMap<i64, Question> = HashMap::with_capacity(rows.len());
        for row in rows {
            let question = Question::try_from(row)?;
            by_id.insert(question.id, question);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_attempt_session(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<AttemptSession>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM attempt_sessions WHERE user_id = $1 AND paper_id = $2",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(paper_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AttemptSession::from))
    }

    async fn create_attempt_session(
        &self,
        session: AttemptSession,
    ) -> Result<AttemptSession, AppError> {
        sqlx::query(
            r#"
            INSERT INTO attempt_sessions (user_id, paper_id, start_time, last_question_start_time, answers)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, paper_id) DO NOTHING
            "#,
        )
        .bind(session.user_id)
        .bind(session.paper_id)
        .bind(session.start_time)
        .bind(session.last_question_start_time)
        .bind(Json(&session.answers))
        .execute(&self.pool)
        .await?;

        self.get_attempt_session(session.user_id, session.paper_id)
            .await?
            .ok_or_else(|| {
                AppError::StoreFailure("attempt session vanished right after insert".to_string())
            })
    }

    async fn update_attempt_session(
        &self,
        user_id: i64,
        paper_id: i64,
        answers: &SessionAnswers,
        last_question_start_time: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE attempt_sessions
            SET answers = $3, last_question_start_time = $4
            WHERE user_id = $1 AND paper_id = $2
            "#,
        )
        .bind(user_id)
        .bind(paper_id)
        .bind(Json(answers))
        .bind(last_question_start_time)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_attempt_session(&self, user_id: i64, paper_id: i64) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM attempt_sessions WHERE user_id = $1 AND paper_id = $2")
                .bind(user_id)
                .bind(paper_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_record_by_user_and_paper(
        &self,
        user_id: i64,
        paper_id: i64,
    ) -> Result<Option<Record>, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM records WHERE user_id = $1 AND paper_id = $2 ORDER BY submit_time DESC LIMIT 1",
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .bind(paper_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Record::from))
    }

    async fn create_record(&self, record: NewRecord) -> Result<Record, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            INSERT INTO records (paper_id, user_id, score, total_time, answers, submit_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(record.paper_id)
        .bind(record.user_id)
        .bind(record.score)
        .bind(record.total_time)
        .bind(Json(&record.answers))
        .bind(record.submit_time)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_records_by_paper(&self, paper_id: i64) -> Result<Vec<Record>, AppError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM records WHERE paper_id = $1 ORDER BY id",
            RECORD_COLUMNS
        ))
        .bind(paper_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn get_records_by_user(&self, user_id: i64) -> Result<Vec<Record>, AppError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM records WHERE user_id = $1 ORDER BY submit_time DESC",
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn commit_submission(&self, record: NewRecord) -> Result<Option<Record>, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Consume the session. Whoever deletes the row owns the submission.
        let consumed = sqlx::query(
            "DELETE FROM attempt_sessions WHERE user_id = $1 AND paper_id = $2 RETURNING user_id",
        )
        .bind(record.user_id)
        .bind(record.paper_id)
        .fetch_optional(&mut *tx)
        .await?;

        if consumed.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        // 2. Persist the record in the same transaction.
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            INSERT INTO records (paper_id, user_id, score, total_time, answers, submit_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(record.paper_id)
        .bind(record.user_id)
        .bind(record.score)
        .bind(record.total_time)
        .bind(Json(&record.answers))
        .bind(record.submit_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }
}
