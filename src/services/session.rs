// src/services/session.rs

//! Attempt session manager: the only writer of live sessions besides the
//! submission gate.

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::AppError,
    models::{
        paper::RuleMap,
        question::{Answer, Question},
        session::{AttemptSession, SessionAnswers, UpdateSessionRequest},
    },
    services::resync::{ResyncOutcome, resync},
    store::Store,
};

/// Returns the live session, creating it on first entry. A plain lookup has
/// no side effects.
pub async fn get_or_create(
    store: &dyn Store,
    user_id: i64,
    paper_id: i64,
    now: DateTime<Utc>,
) -> Result<AttemptSession, AppError> {
    if let Some(session) = store.get_attempt_session(user_id, paper_id).await? {
        return Ok(session);
    }

    tracing::info!("Starting attempt: user {} paper {}", user_id, paper_id);
    store
        .create_attempt_session(AttemptSession::new(user_id, paper_id, now))
        .await
}

/// Merges one answer and moves `last_question_start_time`.
///
/// Writing the same question twice overwrites it (last write wins).
/// Returns `None` if there is no live session.
pub async fn record_answer(
    store: &dyn Store,
    user_id: i64,
    paper_id: i64,
    question_id: i64,
    answer: Option<Answer>,
    next_start_time: DateTime<Utc>,
) -> Result<Option<AttemptSession>, AppError> {
    let Some(mut session) = store.get_attempt_session(user_id, paper_id).await? else {
        return Ok(None);
    };

    session.answers.upsert(question_id, answer);
    session.last_question_start_time = next_start_time;

    let updated = store
        .update_attempt_session(
            user_id,
            paper_id,
            &session.answers,
            session.last_question_start_time,
        )
        .await?;
    Ok(updated.then_some(session))
}

/// Saves client-reported progress.
///
/// The stored session is caught up to `now` first, so a question that ran
/// out while the client was away is locked before any incoming answer is
/// looked at. See [`merge_progress`] for what the client may change.
/// A missing session makes this a no-op.
pub async fn update_progress(
    store: &dyn Store,
    user_id: i64,
    paper_id: i64,
    report: &UpdateSessionRequest,
    questions: &[Question],
    rules: &RuleMap,
    now: DateTime<Utc>,
) -> Result<Option<AttemptSession>, AppError> {
    let Some(session) = store.get_attempt_session(user_id, paper_id).await? else {
        tracing::debug!(
            "Progress for user {} paper {} dropped: no live session",
            user_id,
            paper_id
        );
        return Ok(None);
    };

    let outcome = resync(
        &session.answers,
        questions,
        rules,
        session.last_question_start_time,
        now,
    );
    if outcome.skipped > 0 {
        tracing::info!(
            "User {} paper {}: {} question(s) timed out before progress was saved",
            user_id,
            paper_id,
            outcome.skipped
        );
    }

    let (answers, clock) = merge_progress(&outcome, report, questions, rules, now);

    let updated = store
        .update_attempt_session(user_id, paper_id, &answers, clock)
        .await?;
    Ok(updated.then_some(AttemptSession {
        answers,
        last_question_start_time: clock,
        ..session
    }))
}

/// Folds a client report into a caught-up session.
///
/// * Timed-out slots stay locked; answered slots take the incoming value.
/// * New answers are taken only for the open question and the ones directly
///   after it, in presentation order. Anything further ahead is ignored.
/// * The clock only moves when new answers were taken, and never past the
///   time those questions were owed (nor past `now`).
pub fn merge_progress(
    outcome: &ResyncOutcome,
    report: &UpdateSessionRequest,
    questions: &[Question],
    rules: &RuleMap,
    now: DateTime<Utc>,
) -> (SessionAnswers, DateTime<Utc>) {
    let mut answers = outcome.answers.clone();
    answers.merge_from(&report.answers);

    let mut owed_until = outcome.clock;
    let mut appended = 0;
    for question in questions.iter().skip(outcome.resume_index) {
        if answers.contains(question.id) {
            continue;
        }
        let Some(answer) = report.answers.get(question.id) else {
            break;
        };
        answers.upsert(question.id, answer.cloned());
        owed_until += Duration::seconds(rules.get(question.question_type).time_limit_seconds);
        appended += 1;
    }

    let clock = if appended == 0 {
        outcome.clock
    } else {
        report
            .last_question_start_time
            .min(owed_until)
            .min(now)
            .max(outcome.clock)
    };
    (answers, clock)
}

pub async fn delete(store: &dyn Store, user_id: i64, paper_id: i64) -> Result<bool, AppError> {
    store.delete_attempt_session(user_id, paper_id).await
}

/// Runs the catch-up over `session` and persists any newly timed-out slots
/// before the caller shows the resumed question.
pub async fn catch_up(
    store: &dyn Store,
    mut session: AttemptSession,
    questions: &[Question],
    rules: &RuleMap,
    now: DateTime<Utc>,
) -> Result<(AttemptSession, ResyncOutcome), AppError> {
    let outcome = resync(
        &session.answers,
        questions,
        rules,
        session.last_question_start_time,
        now,
    );

    if outcome.skipped > 0 {
        tracing::info!(
            "User {} paper {}: {} question(s) timed out while away",
            session.user_id,
            session.paper_id,
            outcome.skipped
        );
        store
            .update_attempt_session(
                session.user_id,
                session.paper_id,
                &outcome.answers,
                outcome.clock,
            )
            .await?;
        session.answers = outcome.answers.clone();
        session.last_question_start_time = outcome.clock;
    }

    Ok((session, outcome))
}
