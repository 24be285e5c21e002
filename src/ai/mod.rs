//! Remote collaborators that grade attempts and simulate code runs.
//!
//! Both are opaque, possibly slow and possibly failing calls. The runner only
//! depends on the traits here; the LLM-backed implementations live in the
//! submodules.

pub mod client;
pub mod execution;
pub mod scoring;

use async_trait::async_trait;

use crate::models::{BatchExecutionRequest, BatchExecutionResult, ScoringRequest, ScoringResult};

pub use client::LlmClient;
pub use execution::LlmExecutionService;
pub use scoring::LlmScoringService;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI service is rate limited")]
    RateLimited,

    #[error("AI service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("AI service returned malformed output: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::Malformed(err.to_string())
    }
}

/// Grades a full attempt.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringResult, AiError>;
}

/// Simulates running code submissions against their test cases.
///
/// Implementations return `Err` only when the service could not be reached.
/// A reachable service that answers with missing or garbled results yields
/// `Ok` with whatever could be parsed; the caller fills the gaps with errors.
#[async_trait]
pub trait CodeExecutionService: Send + Sync {
    async fn run_batch(
        &self,
        request: &BatchExecutionRequest,
    ) -> Result<BatchExecutionResult, AiError>;
}
