// src/services/submission.rs

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        paper::RuleMap,
        question::Question,
        record::{NewRecord, Record, SubmitRecordRequest},
        session::{AnswerEntry, AttemptSession, SessionAnswers},
        user::User,
    },
    services::{
        locks::KeyedLocks,
        paper::{check_audience, check_deadline, check_not_completed, get_published, ordered_questions},
        resync::resync,
        rules,
        scoring::{ScoreSheet, score},
    },
    store::Store,
};

#[derive(Debug)]
pub struct SubmissionOutcome {
    pub record: Record,
    pub sheet: ScoreSheet,
}

/// Validates and commits a submission.
///
/// Checks run in order and stop at the first failure: paper published,
/// caller targeted, deadline, no record in the current publish cycle, live
/// session present. A session from an earlier publish cycle counts as
/// missing and is removed. The session check, a second record check and the
/// commit run under the per-(user, paper) lock, so of two concurrent
/// submissions exactly one sees the session; the other gets `SessionMissing`.
pub async fn submit(
    store: &dyn Store,
    locks: &KeyedLocks,
    user: &User,
    req: SubmitRecordRequest,
    now: DateTime<Utc>,
) -> Result<SubmissionOutcome, AppError> {
    let paper = get_published(store, req.paper_id).await?;
    check_audience(&paper, user)?;
    check_deadline(&paper, now)?;

    check_not_completed(store, &paper, user.id).await?;

    let _guard = locks.lock(user.id, paper.id).await;

    let session = match store.get_attempt_session(user.id, paper.id).await? {
        Some(stale) if paper.predates_cycle(stale.start_time) => {
            tracing::info!(
                "Dropping session of user {} for paper {} from an earlier publish cycle",
                user.id,
                paper.id
            );
            store.delete_attempt_session(user.id, paper.id).await?;
            return Err(session_missing());
        }
        Some(session) => session,
        None => return Err(session_missing()),
    };

    // Another request may have committed between the first check and the lock.
    check_not_completed(store, &paper, user.id).await?;

    let questions = ordered_questions(store, &paper).await?;
    let rule_map = rules::resolve(&paper.rules);

    let answers = final_answers(&session, &req.answers, &questions, &rule_map, now);
    let sheet = score(&questions, &answers, &rule_map);

    let max_time = (now - session.start_time).num_seconds().max(0);
    let total_time = req.total_time.clamp(0, max_time);

    let new_record = NewRecord {
        paper_id: paper.id,
        user_id: user.id,
        score: sheet.total,
        total_time,
        answers,
        submit_time: now,
    };

    // Record insert and session delete are one unit; on error the session
    // survives and the client may retry.
    let record = store
        .commit_submission(new_record)
        .await?
        .ok_or_else(session_missing)?;

    tracing::info!(
        "Record {} committed: user {} paper {} score {} time {}s",
        record.id,
        user.id,
        paper.id,
        record.score,
        record.total_time
    );

    Ok(SubmissionOutcome { record, sheet })
}

fn session_missing() -> AppError {
    AppError::SessionMissing(
        "No active attempt for this paper; please re-enter the exam".to_string(),
    )
}

/// One slot per question in presentation order.
///
/// The server's view wins: the stored session is caught up to `now` first,
/// and whatever it holds (including timed-out slots) overrides the client.
/// Client answers only fill questions the session never recorded.
fn final_answers(
    session: &AttemptSession,
    client: &SessionAnswers,
    questions: &[Question],
    rule_map: &RuleMap,
    now: DateTime<Utc>,
) -> SessionAnswers {
    let server = resync(
        &session.answers,
        questions,
        rule_map,
        session.last_question_start_time,
        now,
    )
    .answers;

    questions
        .iter()
        .map(|q| {
            let answer = match server.get(q.id) {
                Some(stored) => stored.cloned(),
                None => client.get(q.id).flatten().cloned(),
            };
            AnswerEntry {
                question_id: q.id,
                answer,
            }
        })
        .collect()
}
