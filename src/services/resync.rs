// src/services/resync.rs

//! Catch-up after the client was away.
//!
//! Rebuilds what the per-question countdown would have done between the
//! stored `last_question_start_time` and `now`. Each expired question costs
//! exactly its own time limit, so a long offline gap only burns the time
//! actually owed and the result is the same no matter how often it is
//! recomputed.

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    paper::RuleMap,
    question::Question,
    session::{ResumeState, SessionAnswers},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResyncOutcome {
    pub answers: SessionAnswers,

    /// Index into the ordered question list of the question to show next.
    /// Equal to the number of questions once everything is consumed.
    pub resume_index: usize,

    /// Seconds left on the question at `resume_index`; 0 when finished.
    pub remaining_seconds: i64,

    /// Questions newly locked as timed out by this call.
    pub skipped: usize,

    /// Start of the question at `resume_index`. Becomes the new
    /// `last_question_start_time` when `skipped > 0`.
    pub clock: DateTime<Utc>,

    pub finished: bool,
}

impl ResyncOutcome {
    pub fn into_resume_state(self, start_time: DateTime<Utc>) -> ResumeState {
        ResumeState {
            start_time,
            last_question_start_time: self.clock,
            answers: self.answers,
            resume_index: self.resume_index,
            remaining_seconds: self.remaining_seconds,
            skipped: self.skipped,
            finished: self.finished,
        }
    }
}

/// Replays elapsed time over the unanswered questions.
///
/// Pure: the same inputs always give the same outcome.
pub fn resync(
    answers: &SessionAnswers,
    questions: &[Question],
    rules: &RuleMap,
    last_question_start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ResyncOutcome {
    let mut answers = answers.clone();
    // Same as the number of answers while they are filled front to back.
    let mut cursor = questions
        .iter()
        .position(|q| !answers.contains(q.id))
        .unwrap_or(questions.len());
    let mut clock = last_question_start_time;
    let mut skipped = 0;

    while let Some(question) = questions.get(cursor) {
        // Answered out of order; no time is owed for it.
        if answers.contains(question.id) {
            cursor += 1;
            continue;
        }

        let limit = rules.get(question.question_type).time_limit_seconds;
        // A clock ahead of `now` counts as no time elapsed.
        let elapsed = (now - clock).num_seconds().max(0);

        if elapsed < limit {
            return ResyncOutcome {
                answers,
                resume_index: cursor,
                remaining_seconds: limit - elapsed,
                skipped,
                clock,
                finished: false,
            };
        }

        answers.upsert(question.id, None);
        clock += Duration::seconds(limit);
        cursor += 1;
        skipped += 1;
    }

    ResyncOutcome {
        answers,
        resume_index: questions.len(),
        remaining_seconds: 0,
        skipped,
        clock,
        finished: true,
    }
}
