use std::sync::Arc;

use crate::{config::Config, repository::AttemptRepository, runner::AssessmentRunner};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<AssessmentRunner>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<AssessmentRunner> {
    fn from_ref(state: &AppState) -> Self {
        state.runner.clone()
    }
}

impl FromRef<AppState> for Arc<dyn AttemptRepository> {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
