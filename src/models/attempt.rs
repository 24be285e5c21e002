// src/models/attempt.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{question::Question, response::Response, scoring::AiFeedback};

/// A completed, scored assessment. Written once per submission and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentAttempt {
    pub id: String,
    pub user_id: String,
    pub assessment_id: String,
    pub role_id: String,
    /// Groups an attempt with its retakes for progress tracking.
    pub root_assessment_id: String,
    pub started_at: i64,
    pub submitted_at: i64,
    pub responses: Vec<Response>,
    /// Kept so results can be re-rendered without calling the scorer again.
    pub questions: Vec<Question>,
    pub final_score: f64,
    pub skill_scores: BTreeMap<String, f64>,
    pub ai_feedback: AiFeedback,
}

/// Row shape of the `assessment_attempts` table when listing.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub id: String,
    pub assessment_id: String,
    pub root_assessment_id: String,
    pub role_id: String,
    pub submitted_at: i64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPoint {
    pub attempt_id: String,
    pub submitted_at: i64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProgress {
    pub first: f64,
    pub latest: f64,
    pub delta: f64,
}

/// Score history across the retakes of one assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub root_assessment_id: String,
    pub attempts: Vec<ProgressPoint>,
    pub best_score: f64,
    pub latest_score: f64,
    pub average_score: f64,
    /// Latest score minus first score.
    pub improvement: f64,
    pub skills: BTreeMap<String, SkillProgress>,
}

impl ProgressReport {
    /// Aggregates attempts in any order. Returns `None` when there are none.
    pub fn from_attempts(root_assessment_id: &str, attempts: &[AssessmentAttempt]) -> Option<Self> {
        let mut ordered: Vec<&AssessmentAttempt> = attempts.iter().collect();
        ordered.sort_by_key(|a| a.submitted_at);

        let first = *ordered.first()?;
        let latest = *ordered.last()?;

        let best_score = ordered
            .iter()
            .map(|a| a.final_score)
            .fold(f64::MIN, f64::max);
        let average_score =
            ordered.iter().map(|a| a.final_score).sum::<f64>() / ordered.len() as f64;

        // A skill first seen in a later retake uses that attempt as its baseline.
        let mut skills: BTreeMap<String, SkillProgress> = BTreeMap::new();
        for attempt in &ordered {
            for (skill, score) in &attempt.skill_scores {
                skills
                    .entry(skill.clone())
                    .and_modify(|p| {
                        p.latest = *score;
                        p.delta = p.latest - p.first;
                    })
                    .or_insert(SkillProgress {
                        first: *score,
                        latest: *score,
                        delta: 0.0,
                    });
            }
        }

        Some(Self {
            root_assessment_id: root_assessment_id.to_string(),
            attempts: ordered
                .iter()
                .map(|a| ProgressPoint {
                    attempt_id: a.id.clone(),
                    submitted_at: a.submitted_at,
                    final_score: a.final_score,
                })
                .collect(),
            best_score,
            latest_score: latest.final_score,
            average_score,
            improvement: latest.final_score - first.final_score,
            skills,
        })
    }
}
