// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Kind of question, which decides the type-specific fields that apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "mcq", alias = "multiple_choice")]
    MultipleChoice,
    #[serde(rename = "short", alias = "short_answer")]
    ShortAnswer,
    #[serde(rename = "coding")]
    Coding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[validate(length(max = 10000))]
    pub input: String,
    #[validate(length(max = 10000))]
    pub expected_output: String,
}

/// A question from the bank, as embedded in an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[validate(length(min = 1, max = 100))]
    pub id: String,

    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,

    /// `type` is a reserved keyword in Rust.
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// Difficulty label on a 1-10 scale.
    #[validate(range(min = 1, max = 10))]
    pub difficulty: u8,

    /// Skill tag used to aggregate per-skill scores.
    #[validate(length(min = 1, max = 100))]
    pub skill: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_max_score")]
    pub max_score: u32,

    /// Advisory per-question time in seconds. Only the assessment-wide limit is enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,

    /// Multiple-choice options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Correct option for multiple choice, reference answer for short answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub test_cases: Option<Vec<TestCase>>,
}

fn default_max_score() -> u32 {
    10
}

/// DTO for sending a question to the candidate (excludes the answer key).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub difficulty: u8,
    pub skill: String,
    pub tags: Vec<String>,
    pub max_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starter_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<Vec<TestCase>>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            question_text: q.question_text.clone(),
            question_type: q.question_type,
            difficulty: q.difficulty,
            skill: q.skill.clone(),
            tags: q.tags.clone(),
            max_score: q.max_score,
            time_limit: q.time_limit,
            options: q.options.clone(),
            starter_code: q.starter_code.clone(),
            test_cases: q.test_cases.clone(),
        }
    }
}

impl Question {
    pub fn is_coding(&self) -> bool {
        self.question_type == QuestionType::Coding
    }

    pub fn test_cases(&self) -> &[TestCase] {
        self.test_cases.as_deref().unwrap_or_default()
    }
}
