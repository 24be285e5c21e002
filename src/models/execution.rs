// src/models/execution.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::question::TestCase;

/// Outcome of one simulated test-case run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Passed,
    Failed,
    Error,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
}

/// Result of one test case. Produced by a model simulating execution, so it is
/// a best-effort judgement rather than a guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub expected_output: Option<String>,
    /// Simulated run time, e.g. "52ms".
    #[serde(default)]
    pub time: String,
    /// Simulated memory, e.g. "1.4MB".
    #[serde(default)]
    pub memory: String,
}

impl ExecutionResult {
    /// Placeholder used when no trustworthy result exists for a test case.
    pub fn unavailable(test_case: &TestCase, message: &str) -> Self {
        Self {
            status: ExecutionStatus::Error,
            output: message.to_string(),
            expected_output: Some(test_case.expected_output.clone()),
            time: "0ms".to_string(),
            memory: "0MB".to_string(),
        }
    }
}

/// One coding answer sent for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSubmission {
    pub question_id: String,
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
}

impl CodeSubmission {
    pub fn is_markdown(&self) -> bool {
        self.language == "markdown"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExecutionRequest {
    pub submissions: Vec<CodeSubmission>,
}

/// Question id to per-test-case results.
pub type BatchExecutionResult = HashMap<String, Vec<ExecutionResult>>;
