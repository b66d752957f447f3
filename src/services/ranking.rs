// src/services/ranking.rs

use std::collections::HashMap;

use crate::{
    error::AppError,
    models::{
        paper::Paper,
        record::{RankingEntry, RankingResponse, Record},
    },
    store::Store,
};

const UNKNOWN_USERNAME: &str = "(deleted user)";

/// Leaderboard of a paper over all of its records.
pub async fn rank(store: &dyn Store, paper_id: i64) -> Result<RankingResponse, AppError> {
    let paper = store
        .get_paper(paper_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Paper not found".to_string()))?;

    let total_assigned = total_assigned(store, &paper).await?;

    let records = store.get_records_by_paper(paper.id).await?;
    let mut usernames = HashMap::new();
    for record in &records {
        if usernames.contains_key(&record.user_id) {
            continue;
        }
        if let Some(user) = store.get_user(record.user_id).await? {
            usernames.insert(user.id, user.username);
        }
    }

    Ok(RankingResponse {
        total_assigned,
        ranking: build_ranking(records, &usernames),
    })
}

/// Students the paper was pushed to.
///
/// Without group targeting a published paper counts every student.
// TODO: confirm the all-students fallback with stakeholders; it is a floor, not a rule.
pub async fn total_assigned(store: &dyn Store, paper: &Paper) -> Result<usize, AppError> {
    if !paper.target_groups.is_empty() {
        let users = store.get_users_in_groups(&paper.target_groups).await?;
        return Ok(users.iter().filter(|u| u.is_student()).count());
    }
    if paper.published {
        return Ok(store.list_students().await?.len());
    }
    Ok(0)
}

/// Sorts by score desc, then time asc, and numbers rows 1..n. Full ties keep
/// their record order and still get distinct ranks.
pub fn build_ranking(mut records: Vec<Record>, usernames: &HashMap<i64, String>) -> Vec<RankingEntry> {
    records.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.total_time.cmp(&b.total_time))
    });

    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| RankingEntry {
            user_id: r.user_id,
            username: usernames
                .get(&r.user_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            score: r.score,
            total_time: r.total_time,
            submit_date: r.submit_time,
            rank: i + 1,
        })
        .collect()
}
