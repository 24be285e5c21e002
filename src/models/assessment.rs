// src/models/assessment.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{config::MAX_TIME_LIMIT_SECS, models::question::Question};

/// A generated assessment as handed to a candidate. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[validate(length(min = 1, max = 100))]
    pub id: String,

    #[validate(length(min = 1, max = 100))]
    pub role_id: String,

    pub role_name: String,

    #[validate(
        length(min = 1, message = "An assessment needs at least one question."),
        custom(function = validate_unique_ids),
        nested
    )]
    pub questions: Vec<Question>,

    /// Total time limit in seconds.
    #[validate(range(min = 1, max = MAX_TIME_LIMIT_SECS))]
    pub total_time_limit: u64,

    /// First assessment in a chain of retakes. Absent on a first attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_assessment_id: Option<String>,
}

fn validate_unique_ids(questions: &[Question]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    for q in questions {
        if !seen.insert(q.id.as_str()) {
            return Err(validator::ValidationError::new("duplicate_question_id"));
        }
    }
    Ok(())
}

impl Assessment {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.question(id).is_some()
    }

    pub fn coding_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| q.is_coding())
    }

    /// Id that groups this assessment with its retakes.
    pub fn root_id(&self) -> &str {
        self.root_assessment_id.as_deref().unwrap_or(&self.id)
    }
}
