// src/models/scoring.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{question::Question, response::Response};

/// Everything the scoring collaborator needs to grade one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRequest {
    pub user_id: String,
    pub assessment_id: String,
    pub role_id: String,
    /// Epoch milliseconds.
    pub started_at: i64,
    /// Epoch milliseconds.
    pub submitted_at: i64,
    pub responses: Vec<Response>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiFeedback {
    pub summary: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
    /// 0-100.
    pub final_score: f64,
    /// Skill name to 0-100.
    pub skill_scores: BTreeMap<String, f64>,
    pub ai_feedback: AiFeedback,
    pub per_question_results: Vec<QuestionResult>,
}
