// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{AnswerPatch, Assessment},
    runner::{AssessmentRunner, BatchOutcome, SessionView, SubmitOutcome, SubmitTrigger},
    utils::jwt::Claims,
};

/// Checks that the active session belongs to the caller.
fn ensure_owner(runner: &AssessmentRunner, claims: &Claims) -> Result<(), AppError> {
    match runner.owner() {
        None => Err(AppError::NotFound("No active assessment session".to_string())),
        Some(owner) if owner == claims.sub => Ok(()),
        Some(_) => Err(AppError::Forbidden(
            "This assessment session belongs to another candidate".to_string(),
        )),
    }
}

fn current_view(runner: &AssessmentRunner) -> Result<Json<SessionView>, AppError> {
    runner
        .view()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No active assessment session".to_string()))
}

/// Starts an assessment for the caller.
///
/// * Validates the assessment.
/// * Replaces the caller's unsubmitted session, if any.
/// * Refuses to replace another candidate's session.
pub async fn start_session(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
    Json(assessment): Json<Assessment>,
) -> Result<impl IntoResponse, AppError> {
    assessment.validate()?;

    let view = runner.start(assessment, &claims.sub)?;
    tracing::info!(user_id = %claims.sub, assessment_id = %view.assessment_id, "Assessment started");

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&runner, &claims)?;
    current_view(&runner)
}

/// Abandons the caller's session without scoring it.
pub async fn abandon_session(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&runner, &claims)?;
    runner.abandon();
    Ok(StatusCode::NO_CONTENT)
}

/// Merges a partial answer into one question's response.
/// Unknown question ids leave the session unchanged. Execution results in
/// the body are ignored; only the runner records those.
pub async fn update_response(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<String>,
    Json(patch): Json<AnswerPatch>,
) -> Result<impl IntoResponse, AppError> {
    patch.validate()?;
    ensure_owner(&runner, &claims)?;
    if !runner.set_response(&question_id, patch.into()) {
        tracing::warn!(%question_id, "Response for a question outside the assessment ignored");
    }
    current_view(&runner)
}

pub async fn next_question(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&runner, &claims)?;
    runner.next();
    current_view(&runner)
}

pub async fn previous_question(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&runner, &claims)?;
    runner.previous();
    current_view(&runner)
}

pub async fn go_to_question(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&runner, &claims)?;
    runner.go_to(index);
    current_view(&runner)
}

/// Runs every coding answer through the simulated execution service.
pub async fn run_all_code(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&runner, &claims)?;

    match runner.run_all_code().await? {
        BatchOutcome::Applied { updated } => {
            tracing::info!(updated, "Batch execution finished");
        }
        BatchOutcome::NoCodingQuestions => {}
        BatchOutcome::AlreadyRunning => {
            return Err(AppError::Conflict("Code is already running".to_string()));
        }
        BatchOutcome::Superseded => {
            return Err(AppError::Conflict(
                "The assessment session changed while code was running".to_string(),
            ));
        }
    }

    current_view(&runner)
}

/// Submits the caller's session for scoring.
///
/// * Scores the attempt through the scoring service.
/// * Stores the attempt and clears the session.
/// * Leaves the session intact on failure so the caller can retry.
pub async fn submit_session(
    State(runner): State<Arc<AssessmentRunner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&runner, &claims)?;

    match runner.submit(SubmitTrigger::Manual).await? {
        SubmitOutcome::Submitted(attempt) => Ok((StatusCode::CREATED, Json(*attempt))),
        SubmitOutcome::AlreadyInFlight => Err(AppError::Conflict(
            "Submission already in progress".to_string(),
        )),
        SubmitOutcome::Superseded => Err(AppError::Conflict(
            "The assessment session changed during submission".to_string(),
        )),
    }
}
