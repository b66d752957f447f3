// src/handlers/paper.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    handlers::current_user,
    services::{paper, ranking},
    store::Store,
    utils::jwt::Claims,
};

/// Lists published papers pushed to the caller.
pub async fn list_papers(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(store.as_ref(), &claims).await?;
    let papers = paper::available_for(store.as_ref(), &user, Utc::now()).await?;
    Ok(Json(papers))
}

/// Leaderboard of a paper.
pub async fn get_ranking(
    State(store): State<Arc<dyn Store>>,
    Path(paper_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let ranking = ranking::rank(store.as_ref(), paper_id).await?;
    Ok(Json(ranking))
}
