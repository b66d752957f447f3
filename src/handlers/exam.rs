// src/handlers/exam.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    handlers::current_user,
    models::{
        paper::PaperInfo,
        question::PublicQuestion,
        session::{ExamPayload, RecordAnswerRequest, UpdateSessionRequest, UpdateSessionResponse},
    },
    services::{paper, resync::resync, rules, session},
    state::AppState,
    utils::jwt::Claims,
};

/// Returns the exam for a paper together with where to resume.
///
/// * Creates the attempt session on first entry (refused past the deadline).
/// * A session left over from an earlier publish cycle is discarded.
/// * Catches the session up to now, persisting any timed-out questions,
///   before answering.
pub async fn get_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(paper_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store.as_ref();
    let user = current_user(store, &claims).await?;
    let now = Utc::now();

    let paper = paper::get_published(store, paper_id).await?;
    paper::check_audience(&paper, &user)?;
    paper::check_not_completed(store, &paper, user.id).await?;

    // Session creation shares the submission lock, so a session cannot be
    // opened while a record for the same cycle is being committed.
    let attempt = {
        let _guard = state.attempt_locks.lock(user.id, paper.id).await;

        let mut existing = store.get_attempt_session(user.id, paper.id).await?;
        if let Some(stale) = &existing {
            if paper.predates_cycle(stale.start_time) {
                tracing::info!(
                    "Discarding session of user {} for paper {} from an earlier publish cycle",
                    user.id,
                    paper.id
                );
                session::delete(store, user.id, paper.id).await?;
                existing = None;
            }
        }

        match existing {
            Some(attempt) => attempt,
            None => {
                paper::check_deadline(&paper, now)?;
                paper::check_not_completed(store, &paper, user.id).await?;
                session::get_or_create(store, user.id, paper.id, now).await?
            }
        }
    };

    let questions = paper::ordered_questions(store, &paper).await?;
    let rule_map = rules::resolve(&paper.rules);
    let (attempt, outcome) = session::catch_up(store, attempt, &questions, &rule_map, now).await?;

    Ok(Json(ExamPayload {
        paper: PaperInfo {
            id: paper.id,
            name: paper.name,
            rules: rule_map,
            deadline: paper.deadline,
            publish_date: paper.publish_date,
        },
        questions: questions.iter().map(PublicQuestion::from).collect(),
        session: outcome.into_resume_state(attempt.start_time),
    }))
}

/// Saves progress reported by the client.
///
/// The session is caught up first; timed-out questions stay locked and the
/// question clock only moves when new answers arrive. Without a live
/// session the call succeeds and writes nothing.
pub async fn update_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(paper_id): Path<i64>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store.as_ref();
    let user = current_user(store, &claims).await?;
    let now = Utc::now();

    let paper = paper::get_published(store, paper_id).await?;
    paper::check_audience(&paper, &user)?;

    let questions = paper::ordered_questions(store, &paper).await?;
    let rule_map = rules::resolve(&paper.rules);

    let updated =
        session::update_progress(store, user.id, paper.id, &req, &questions, &rule_map, now)
            .await?;

    let resume = updated.map(|attempt| {
        resync(
            &attempt.answers,
            &questions,
            &rule_map,
            attempt.last_question_start_time,
            now,
        )
        .into_resume_state(attempt.start_time)
    });

    Ok(Json(UpdateSessionResponse {
        updated: resume.is_some(),
        session: resume,
    }))
}

/// Records one answer with a server-side timestamp.
///
/// Only the current question, or one already answered (a retry), may be
/// written. Questions that already timed out are refused.
pub async fn record_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(paper_id): Path<i64>,
    Json(req): Json<RecordAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store.as_ref();
    let user = current_user(store, &claims).await?;
    let now = Utc::now();

    let paper = paper::get_published(store, paper_id).await?;
    paper::check_audience(&paper, &user)?;

    let attempt = store
        .get_attempt_session(user.id, paper.id)
        .await?
        .ok_or_else(|| {
            AppError::SessionMissing("No active attempt for this paper; please re-enter the exam".to_string())
        })?;

    let questions = paper::ordered_questions(store, &paper).await?;
    let rule_map = rules::resolve(&paper.rules);
    let (attempt, outcome) = session::catch_up(store, attempt, &questions, &rule_map, now).await?;

    let index = questions
        .iter()
        .position(|q| q.id == req.question_id)
        .ok_or_else(|| AppError::NotFound("Question is not part of this paper".to_string()))?;

    if attempt.answers.is_locked(req.question_id) {
        return Err(AppError::BadRequest(
            "Time limit for this question has passed".to_string(),
        ));
    }

    let is_retry = attempt.answers.contains(req.question_id);
    if !is_retry && index != outcome.resume_index {
        return Err(AppError::BadRequest("This question is not open".to_string()));
    }

    // A retry must not restart the clock of the question that follows it.
    let next_start_time = if is_retry {
        attempt.last_question_start_time
    } else {
        now
    };

    let attempt = session::record_answer(
        store,
        user.id,
        paper.id,
        req.question_id,
        req.answer,
        next_start_time,
    )
    .await?
    .ok_or_else(|| {
        AppError::SessionMissing("No active attempt for this paper; please re-enter the exam".to_string())
    })?;

    let outcome = resync(
        &attempt.answers,
        &questions,
        &rule_map,
        attempt.last_question_start_time,
        now,
    );
    Ok(Json(outcome.into_resume_state(attempt.start_time)))
}
