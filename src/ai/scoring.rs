use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{
    ai::{AiError, LlmClient, ScoringService},
    models::{
        AiFeedback, ExecutionStatus, Question, QuestionResult, QuestionType, Response,
        ScoringRequest, ScoringResult,
    },
};

const SYSTEM_PROMPT: &str = r#"You are an expert technical interviewer grading a candidate's skill assessment.
You receive the questions the candidate had to answer and their responses.
For every question listed under "toJudge", decide whether the response is correct, judging conceptual understanding and reasoning for short answers, and correctness of the code for coding questions (simulated test results are included when available, but they are not authoritative).
Then write feedback for the candidate: a concise, encouraging 2-3 sentence summary naming one key strength and one main area for improvement, and a list of specific, actionable suggestions.

Respond with a JSON object of the form:
{"perQuestionResults": [{"questionId": "...", "isCorrect": true}], "feedback": {"summary": "...", "suggestions": ["..."]}}
Do not include any other text."#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoringReply {
    per_question_results: Vec<QuestionResult>,
    feedback: AiFeedback,
}

/// Scoring collaborator backed by a language model.
///
/// Multiple-choice questions are checked locally against the answer key; the
/// model judges the rest and writes the feedback.
#[derive(Clone)]
pub struct LlmScoringService {
    client: LlmClient,
}

impl LlmScoringService {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScoringService for LlmScoringService {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringResult, AiError> {
        let responses: HashMap<&str, &Response> = request
            .responses
            .iter()
            .map(|r| (r.question_id.as_str(), r))
            .collect();

        let mut correctness: HashMap<String, bool> = HashMap::new();
        let mut to_judge = Vec::new();
        for question in &request.questions {
            let response = responses.get(question.id.as_str()).copied();
            match question.question_type {
                QuestionType::MultipleChoice => {
                    correctness.insert(question.id.clone(), is_choice_correct(question, response));
                }
                _ => to_judge.push(judge_entry(question, response)),
            }
        }

        let user_content = serde_json::to_string_pretty(&json!({
            "roleId": request.role_id,
            "objectiveResults": correctness,
            "toJudge": to_judge,
        }))?;

        let reply = self.client.chat_json(SYSTEM_PROMPT, &user_content, 0.2).await?;
        let reply: ScoringReply = serde_json::from_value(reply)?;

        let judged: HashMap<&str, bool> = reply
            .per_question_results
            .iter()
            .map(|r| (r.question_id.as_str(), r.is_correct))
            .collect();
        for question in &request.questions {
            if question.question_type == QuestionType::MultipleChoice {
                continue;
            }
            let verdict = judged.get(question.id.as_str()).ok_or_else(|| {
                AiError::Malformed(format!("no verdict for question {}", question.id))
            })?;
            correctness.insert(question.id.clone(), *verdict);
        }

        if reply.feedback.summary.trim().is_empty() {
            return Err(AiError::Malformed("empty feedback summary".to_string()));
        }

        let (final_score, skill_scores) = calculate_scores(&request.questions, &correctness);
        tracing::info!(
            assessment_id = %request.assessment_id,
            final_score,
            "Attempt scored"
        );

        Ok(ScoringResult {
            final_score,
            skill_scores,
            ai_feedback: reply.feedback,
            per_question_results: request
                .questions
                .iter()
                .map(|q| QuestionResult {
                    question_id: q.id.clone(),
                    is_correct: correctness.get(&q.id).copied().unwrap_or(false),
                })
                .collect(),
        })
    }
}

fn is_choice_correct(question: &Question, response: Option<&Response>) -> bool {
    match (
        question.correct_answer.as_deref(),
        response.and_then(|r| r.answer.as_deref()),
    ) {
        (Some(expected), Some(given)) => expected.trim().eq_ignore_ascii_case(given.trim()),
        _ => false,
    }
}

fn judge_entry(question: &Question, response: Option<&Response>) -> serde_json::Value {
    let passed = response
        .and_then(|r| r.execution_result.as_ref())
        .map(|results| {
            results
                .iter()
                .filter(|r| r.status == ExecutionStatus::Passed)
                .count()
        });
    json!({
        "questionId": question.id,
        "type": question.question_type,
        "questionText": question.question_text,
        "referenceAnswer": question.correct_answer,
        "testCases": question.test_cases,
        "answer": response.and_then(|r| r.answer.as_deref()),
        "code": response.and_then(|r| r.code.as_deref()),
        "language": response.and_then(|r| r.language.as_deref()),
        "simulatedTestsPassed": passed,
    })
}

/// Returns (final score, per-skill scores), both as percentages of questions
/// answered correctly.
fn calculate_scores(
    questions: &[Question],
    correctness: &HashMap<String, bool>,
) -> (f64, BTreeMap<String, f64>) {
    if questions.is_empty() {
        return (0.0, BTreeMap::new());
    }

    let mut per_skill: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut correct_count = 0;
    for q in questions {
        let correct = correctness.get(&q.id).copied().unwrap_or(false);
        let entry = per_skill.entry(q.skill.clone()).or_insert((0, 0));
        entry.1 += 1;
        if correct {
            entry.0 += 1;
            correct_count += 1;
        }
    }

    let final_score = (correct_count as f64 / questions.len() as f64) * 100.0;
    let skill_scores = per_skill
        .into_iter()
        .map(|(skill, (correct, total))| (skill, (correct as f64 / total as f64) * 100.0))
        .collect();
    (final_score, skill_scores)
}
