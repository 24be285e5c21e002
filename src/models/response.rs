// src/models/response.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    config::DEFAULT_CODE_LANGUAGE,
    models::{execution::ExecutionResult, question::Question},
};

/// A candidate's answer to one question, mutated as they work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub question_id: String,
    pub skill: String,
    pub difficulty: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Populated only for coding questions after a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<Vec<ExecutionResult>>,

    /// Seconds attributed to this question. Filled in at submission.
    #[serde(default)]
    pub time_taken: f64,

    /// Set from the scoring result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

impl Response {
    /// Blank response for `question`. Coding questions start from their starter code.
    pub fn initial(question: &Question) -> Self {
        let (code, language) = if question.is_coding() {
            (
                question.starter_code.clone(),
                Some(DEFAULT_CODE_LANGUAGE.to_string()),
            )
        } else {
            (None, None)
        };

        Self {
            question_id: question.id.clone(),
            skill: question.skill.clone(),
            difficulty: question.difficulty,
            answer: None,
            code,
            language,
            execution_result: None,
            time_taken: 0.0,
            is_correct: None,
        }
    }

    pub fn apply(&mut self, patch: ResponsePatch) {
        if let Some(answer) = patch.answer {
            self.answer = Some(answer);
        }
        if let Some(code) = patch.code {
            self.code = Some(code);
        }
        if let Some(language) = patch.language {
            self.language = Some(language);
        }
        if let Some(results) = patch.execution_result {
            self.execution_result = Some(results);
        }
    }
}

/// Partial update to a `Response`. Present fields overwrite, absent ones are kept.
///
/// Execution results are only ever written by the runner; candidates send an
/// `AnswerPatch`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePatch {
    pub answer: Option<String>,
    pub code: Option<String>,
    pub language: Option<String>,
    pub execution_result: Option<Vec<ExecutionResult>>,
}

impl ResponsePatch {
    pub fn answer(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            ..Default::default()
        }
    }

    pub fn code(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            language: Some(language.into()),
            ..Default::default()
        }
    }

    pub fn execution(results: Vec<ExecutionResult>) -> Self {
        Self {
            execution_result: Some(results),
            ..Default::default()
        }
    }
}

/// What a candidate may change on a response.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPatch {
    #[validate(length(max = 20000))]
    pub answer: Option<String>,
    #[validate(length(max = 100000))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub language: Option<String>,
}

impl From<AnswerPatch> for ResponsePatch {
    fn from(patch: AnswerPatch) -> Self {
        Self {
            answer: patch.answer,
            code: patch.code,
            language: patch.language,
            execution_result: None,
        }
    }
}
