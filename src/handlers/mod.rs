// src/handlers/mod.rs

pub mod auth;
pub mod exam;
pub mod paper;
pub mod record;

use crate::{error::AppError, models::user::User, store::Store, utils::jwt::Claims};

/// Resolves the token subject to a stored user.
pub(crate) async fn current_user(store: &dyn Store, claims: &Claims) -> Result<User, AppError> {
    store
        .get_user(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))
}
