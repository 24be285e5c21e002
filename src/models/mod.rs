// src/models/mod.rs

pub mod assessment;
pub mod attempt;
pub mod execution;
pub mod question;
pub mod response;
pub mod scoring;

pub use assessment::Assessment;
pub use attempt::{AssessmentAttempt, AttemptSummary, ProgressReport};
pub use execution::{
    BatchExecutionRequest, BatchExecutionResult, CodeSubmission, ExecutionResult, ExecutionStatus,
};
pub use question::{PublicQuestion, Question, QuestionType, TestCase};
pub use response::{AnswerPatch, Response, ResponsePatch};
pub use scoring::{AiFeedback, QuestionResult, ScoringRequest, ScoringResult};
