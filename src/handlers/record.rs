// src/handlers/record.rs

use std::{collections::HashMap, sync::Arc};

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::current_user,
    models::record::{RecordSummary, SubmitRecordRequest, SubmitRecordResponse},
    services::submission,
    state::AppState,
    store::Store,
    utils::jwt::Claims,
};

/// Submits an attempt and returns the scored record.
///
/// See `services::submission::submit` for the checks and their order.
pub async fn submit_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitRecordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let store = state.store.as_ref();
    let user = current_user(store, &claims).await?;

    let outcome = submission::submit(store, &state.attempt_locks, &user, req, Utc::now())
        .await
        .inspect_err(|e| {
            if !e.is_retryable() {
                tracing::info!("Submission by user {} rejected: {}", user.id, e.code());
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitRecordResponse {
            record: outcome.record,
            per_question: outcome.sheet.per_question,
        }),
    ))
}

/// Lists the caller's records, newest first.
pub async fn list_my_records(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(store.as_ref(), &claims).await?;
    let records = store.get_records_by_user(user.id).await?;

    let mut paper_names: HashMap<i64, Option<String>> = HashMap::new();
    let mut list = Vec::with_capacity(records.len());
    for record in records {
        if !paper_names.contains_key(&record.paper_id) {
            let name = store.get_paper(record.paper_id).await?.map(|p| p.name);
            paper_names.insert(record.paper_id, name);
        }
        list.push(RecordSummary {
            id: record.id,
            paper_id: record.paper_id,
            paper_name: paper_names.get(&record.paper_id).cloned().flatten(),
            score: record.score,
            total_time: record.total_time,
            submit_time: record.submit_time,
        });
    }

    Ok(Json(list))
}
