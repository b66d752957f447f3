// src/services/paper.rs

//! Paper lookups and the eligibility checks shared by the exam and
//! submission paths.

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        paper::{Paper, PaperSummary},
        question::Question,
        user::User,
    },
    store::Store,
};

/// Loads a paper a student may see: it must exist and be published.
pub async fn get_published(store: &dyn Store, paper_id: i64) -> Result<Paper, AppError> {
    store
        .get_paper(paper_id)
        .await?
        .filter(|p| p.published)
        .ok_or_else(|| AppError::NotFound("Paper not found".to_string()))
}

pub fn check_audience(paper: &Paper, user: &User) -> Result<(), AppError> {
    if paper.targets(user) {
        Ok(())
    } else {
        Err(AppError::NotEligible(
            "This paper was not assigned to you".to_string(),
        ))
    }
}

pub fn check_deadline(paper: &Paper, now: DateTime<Utc>) -> Result<(), AppError> {
    if paper.is_deadline_passed(now) {
        Err(AppError::Expired(
            "The deadline for this paper has passed".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Rejects when the user already holds a record for the current publish cycle.
pub async fn check_not_completed(
    store: &dyn Store,
    paper: &Paper,
    user_id: i64,
) -> Result<(), AppError> {
    match store.get_record_by_user_and_paper(user_id, paper.id).await? {
        Some(record) if paper.is_completed_by(&record) => Err(AppError::AlreadyCompleted(
            "You have already completed this paper".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Questions of the paper in presentation order. Dangling ids are dropped.
pub async fn ordered_questions(store: &dyn Store, paper: &Paper) -> Result<Vec<Question>, AppError> {
    let ids = paper.questions.ordered_ids();
    let questions = store.get_questions_by_ids(&ids).await?;
    if questions.len() != ids.len() {
        tracing::warn!(
            "Paper {} references {} missing question(s)",
            paper.id,
            ids.len() - questions.len()
        );
    }
    Ok(questions)
}

/// Published papers that target `user`, newest first.
pub async fn available_for(
    store: &dyn Store,
    user: &User,
    now: DateTime<Utc>,
) -> Result<Vec<PaperSummary>, AppError> {
    let papers: Vec<Paper> = store
        .list_papers()
        .await?
        .into_iter()
        .filter(|p| p.published && p.targets(user))
        .collect();

    let mut summaries = Vec::with_capacity(papers.len());
    for paper in papers.into_iter().rev() {
        let completed = store
            .get_record_by_user_and_paper(user.id, paper.id)
            .await?
            .is_some_and(|record| paper.is_completed_by(&record));
        summaries.push(PaperSummary {
            id: paper.id,
            name: paper.name.clone(),
            question_count: paper.questions.len(),
            deadline: paper.deadline,
            publish_date: paper.publish_date,
            expired: paper.is_deadline_passed(now),
            completed,
        });
    }
    Ok(summaries)
}
