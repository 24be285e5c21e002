// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError, models::ProgressReport, repository::AttemptRepository, utils::jwt::Claims,
};

/// Lists the caller's attempts, newest first.
pub async fn list_attempts(
    State(attempts): State<Arc<dyn AttemptRepository>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let summaries = attempts.list_for_user(&claims.sub).await?;
    Ok(Json(summaries))
}

/// Returns one stored attempt with everything needed to render its results.
pub async fn get_attempt(
    State(attempts): State<Arc<dyn AttemptRepository>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts
        .get(&claims.sub, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;
    Ok(Json(attempt))
}

/// Aggregates scores across the retakes that share `root_id`.
pub async fn get_progress(
    State(attempts): State<Arc<dyn AttemptRepository>>,
    Extension(claims): Extension<Claims>,
    Path(root_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let chain = attempts.list_for_root(&claims.sub, &root_id).await?;
    let report = ProgressReport::from_attempts(&root_id, &chain)
        .ok_or_else(|| AppError::NotFound("No attempts for this assessment".to_string()))?;
    Ok(Json(report))
}
