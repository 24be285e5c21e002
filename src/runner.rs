//! Drives a candidate through an assessment.
//!
//! The runner owns the `SessionStore`, the countdown ticker and the handles to
//! the scoring, code-execution and attempt-storage collaborators. Calls to the
//! collaborators are never cancelled once issued; instead every result is
//! checked against the session epoch it was requested for and dropped if the
//! session has since been reset or replaced.

use std::{
    collections::HashMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    ai::{AiError, CodeExecutionService, ScoringService},
    config::{DEFAULT_CODE_LANGUAGE, TICK_INTERVAL},
    models::{
        Assessment, AssessmentAttempt, BatchExecutionRequest, BatchExecutionResult,
        CodeSubmission, ExecutionResult, PublicQuestion, Response, ResponsePatch, ScoringRequest,
        ScoringResult,
    },
    repository::{AttemptRepository, RepositoryError},
    session::SessionStore,
    utils::clock::Clock,
};

const EXECUTION_UNAVAILABLE: &str =
    "AI evaluation service is currently unavailable. Please try again in a moment.";

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("no active assessment session")]
    NoActiveSession,

    #[error("another candidate has an assessment in progress")]
    SessionTaken,

    #[error("scoring failed: {0}")]
    Scoring(#[source] AiError),

    #[error("code execution failed: {0}")]
    Execution(#[source] AiError),

    #[error("failed to store attempt: {0}")]
    Persistence(#[from] RepositoryError),
}

impl RunnerError {
    /// Whether the session is still intact and the same call may be repeated.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RunnerError::NoActiveSession | RunnerError::SessionTaken
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(Box<AssessmentAttempt>),
    /// Another submission for this session is still running; this call did nothing.
    AlreadyInFlight,
    /// The session was reset or replaced while scoring; the result was dropped.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Applied { updated: usize },
    NoCodingQuestions,
    AlreadyRunning,
    Superseded,
}

/// What the candidate-facing client renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub assessment_id: String,
    pub role_id: String,
    pub role_name: String,
    pub total_time_limit: u64,
    pub questions: Vec<PublicQuestion>,
    pub responses: HashMap<String, Response>,
    pub current_question_index: usize,
    pub current_question: Option<PublicQuestion>,
    pub start_time: i64,
    pub remaining_seconds: u64,
    /// Set when the last submission of this session failed and needs a retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_error: Option<String>,
}

enum Deadline {
    Running,
    Expired,
    Stale,
}

/// Clears an in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AssessmentRunner {
    store: Mutex<SessionStore>,
    scoring: Arc<dyn ScoringService>,
    executor: Arc<dyn CodeExecutionService>,
    attempts: Arc<dyn AttemptRepository>,
    clock: Arc<dyn Clock>,
    submitting: AtomicBool,
    batch_running: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
    /// Last failed submission, tagged with the epoch it belongs to.
    submit_error: Mutex<Option<(u64, String)>>,
}

impl AssessmentRunner {
    pub fn new(
        store: SessionStore,
        scoring: Arc<dyn ScoringService>,
        executor: Arc<dyn CodeExecutionService>,
        attempts: Arc<dyn AttemptRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            scoring,
            executor,
            attempts,
            clock,
            submitting: AtomicBool::new(false),
            batch_running: AtomicBool::new(false),
            ticker: Mutex::new(None),
            tick_interval: TICK_INTERVAL,
            submit_error: Mutex::new(None),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Starts a session for `user_id` and its countdown. The caller's own
    /// unsubmitted session is replaced; another candidate's is not.
    pub fn start(
        self: &Arc<Self>,
        assessment: Assessment,
        user_id: &str,
    ) -> Result<SessionView, RunnerError> {
        {
            let mut store = self.store.lock();
            if store.user_id().is_some_and(|owner| owner != user_id) {
                return Err(RunnerError::SessionTaken);
            }
            store.start(assessment, user_id);
        }
        self.spawn_ticker();
        self.view().ok_or(RunnerError::NoActiveSession)
    }

    /// Resumes a persisted session after a restart. Returns false if there
    /// was nothing usable to resume.
    pub fn resume(self: &Arc<Self>) -> bool {
        self.stop_ticker();
        let resumed = self.store.lock().rehydrate();
        if resumed {
            self.spawn_ticker();
        }
        resumed
    }

    pub fn set_response(&self, question_id: &str, patch: ResponsePatch) -> bool {
        self.store.lock().set_response(question_id, patch)
    }

    pub fn next(&self) -> usize {
        self.store.lock().next()
    }

    pub fn previous(&self) -> usize {
        self.store.lock().previous()
    }

    pub fn go_to(&self, index: usize) -> usize {
        self.store.lock().go_to(index)
    }

    /// Drops the session without submitting it.
    pub fn abandon(&self) {
        self.stop_ticker();
        self.store.lock().reset();
    }

    /// Stops the countdown. The session itself is left as is.
    pub fn shutdown(&self) {
        self.stop_ticker();
    }

    pub fn owner(&self) -> Option<String> {
        self.store.lock().user_id().map(str::to_string)
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.store.lock().remaining_seconds()
    }

    pub fn view(&self) -> Option<SessionView> {
        let store = self.store.lock();
        let assessment = store.assessment()?;
        let submit_error = self
            .submit_error
            .lock()
            .as_ref()
            .filter(|(epoch, _)| *epoch == store.epoch())
            .map(|(_, message)| message.clone());
        Some(SessionView {
            assessment_id: assessment.id.clone(),
            role_id: assessment.role_id.clone(),
            role_name: assessment.role_name.clone(),
            total_time_limit: assessment.total_time_limit,
            questions: assessment.questions.iter().map(PublicQuestion::from).collect(),
            responses: store.responses().cloned().unwrap_or_default(),
            current_question_index: store.current_question_index(),
            current_question: store.current_question().map(PublicQuestion::from),
            start_time: store.start_time().unwrap_or_default(),
            remaining_seconds: store.remaining_seconds().unwrap_or_default(),
            submit_error,
        })
    }

    /// Scores the session and stores the attempt.
    ///
    /// Only one submission runs at a time; a concurrent call returns
    /// `AlreadyInFlight` without contacting the scorer. On error the session
    /// is left untouched so the candidate can retry.
    pub async fn submit(&self, trigger: SubmitTrigger) -> Result<SubmitOutcome, RunnerError> {
        let Some(_in_flight) = InFlight::acquire(&self.submitting) else {
            tracing::info!(?trigger, "Submission already in flight, ignoring");
            return Ok(SubmitOutcome::AlreadyInFlight);
        };

        let epoch = self.store.lock().epoch();
        let outcome = self.score_and_store(trigger).await;
        match &outcome {
            Err(RunnerError::NoActiveSession) => {}
            Err(e) => *self.submit_error.lock() = Some((epoch, e.to_string())),
            Ok(_) => *self.submit_error.lock() = None,
        }
        outcome
    }

    async fn score_and_store(&self, trigger: SubmitTrigger) -> Result<SubmitOutcome, RunnerError> {
        let (epoch, request, root_assessment_id) = {
            let store = self.store.lock();
            let assessment = store.assessment().ok_or(RunnerError::NoActiveSession)?;
            let user_id = store.user_id().ok_or(RunnerError::NoActiveSession)?;
            let started_at = store.start_time().ok_or(RunnerError::NoActiveSession)?;
            let responses = store.responses().ok_or(RunnerError::NoActiveSession)?;

            let submitted_at = self.clock.now_ms();
            // Dwell time per question is not tracked; elapsed time is split evenly.
            let elapsed_secs = (submitted_at - started_at).max(0) as f64 / 1000.0;
            let time_per_question = elapsed_secs / assessment.questions.len() as f64;

            let ordered = assessment
                .questions
                .iter()
                .map(|q| {
                    let mut response = responses
                        .get(&q.id)
                        .cloned()
                        .unwrap_or_else(|| Response::initial(q));
                    response.time_taken = time_per_question;
                    response
                })
                .collect();

            let request = ScoringRequest {
                user_id: user_id.to_string(),
                assessment_id: assessment.id.clone(),
                role_id: assessment.role_id.clone(),
                started_at,
                submitted_at,
                responses: ordered,
                questions: assessment.questions.clone(),
            };
            (store.epoch(), request, assessment.root_id().to_string())
        };

        tracing::info!(
            ?trigger,
            assessment_id = %request.assessment_id,
            responses = request.responses.len(),
            "Submitting assessment for scoring"
        );

        let result = self
            .scoring
            .score(&request)
            .await
            .map_err(RunnerError::Scoring)?;

        if !self.is_current(epoch) {
            tracing::info!(assessment_id = %request.assessment_id, "Dropping score for a session that is gone");
            return Ok(SubmitOutcome::Superseded);
        }

        let attempt = build_attempt(request, result, root_assessment_id)?;
        self.attempts.insert(&attempt).await?;
        tracing::info!(
            attempt_id = %attempt.id,
            final_score = attempt.final_score,
            "Assessment attempt stored"
        );

        // A session started while the attempt was being written keeps its
        // own state and ticker.
        let finished = {
            let mut store = self.store.lock();
            let current = store.epoch() == epoch;
            if current {
                store.reset();
            }
            current
        };
        if finished {
            self.stop_ticker();
        }

        Ok(SubmitOutcome::Submitted(Box::new(attempt)))
    }

    /// Sends every coding answer to the execution collaborator in one batch
    /// and records the per-test-case results on the responses.
    pub async fn run_all_code(&self) -> Result<BatchOutcome, RunnerError> {
        let Some(_in_flight) = InFlight::acquire(&self.batch_running) else {
            return Ok(BatchOutcome::AlreadyRunning);
        };

        let (epoch, submissions) = {
            let store = self.store.lock();
            let assessment = store.assessment().ok_or(RunnerError::NoActiveSession)?;
            let submissions: Vec<CodeSubmission> = assessment
                .coding_questions()
                .map(|q| {
                    let response = store.response(&q.id);
                    let code = response
                        .and_then(|r| r.code.clone())
                        .filter(|c| !c.is_empty())
                        .or_else(|| q.starter_code.clone())
                        .unwrap_or_default();
                    let language = response
                        .and_then(|r| r.language.as_deref())
                        .map(|l| l.trim().to_lowercase())
                        .filter(|l| !l.is_empty())
                        .unwrap_or_else(|| DEFAULT_CODE_LANGUAGE.to_string());
                    CodeSubmission {
                        question_id: q.id.clone(),
                        code,
                        language,
                        test_cases: q.test_cases().to_vec(),
                    }
                })
                .collect();
            (store.epoch(), submissions)
        };

        if submissions.is_empty() {
            return Ok(BatchOutcome::NoCodingQuestions);
        }

        let request = BatchExecutionRequest { submissions };
        tracing::info!(submissions = request.submissions.len(), "Running all code");
        let raw = self
            .executor
            .run_batch(&request)
            .await
            .map_err(RunnerError::Execution)?;

        let updates: HashMap<String, ResponsePatch> = finalize_batch(&request, raw)
            .into_iter()
            .map(|(question_id, results)| (question_id, ResponsePatch::execution(results)))
            .collect();

        let mut store = self.store.lock();
        if store.epoch() != epoch {
            tracing::info!("Dropping execution results for a session that is gone");
            return Ok(BatchOutcome::Superseded);
        }
        let updated = store.set_many_responses(updates);
        Ok(BatchOutcome::Applied { updated })
    }

    fn is_current(&self, epoch: u64) -> bool {
        let current = self.store.lock().epoch();
        current == epoch
    }

    fn check_deadline(&self, epoch: u64) -> Deadline {
        let store = self.store.lock();
        if store.epoch() != epoch {
            return Deadline::Stale;
        }
        match store.remaining_seconds() {
            None => Deadline::Stale,
            Some(0) => Deadline::Expired,
            Some(_) => Deadline::Running,
        }
    }

    fn spawn_ticker(self: &Arc<Self>) {
        let epoch = self.store.lock().epoch();
        let runner: Weak<Self> = Arc::downgrade(self);
        let period = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(runner) = runner.upgrade() else {
                    break;
                };
                match runner.check_deadline(epoch) {
                    Deadline::Running => continue,
                    Deadline::Stale => break,
                    Deadline::Expired => {
                        tracing::info!("Time's up, submitting assessment automatically");
                        // Submitting on a separate task keeps the submit's own
                        // ticker shutdown from aborting it.
                        tokio::spawn(async move {
                            if let Err(e) = runner.submit(SubmitTrigger::Timeout).await {
                                tracing::warn!("Automatic submission failed: {}", e);
                            }
                        });
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.ticker.lock().replace(handle) {
            previous.abort();
        }
    }

    fn stop_ticker(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for AssessmentRunner {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

fn build_attempt(
    request: ScoringRequest,
    result: ScoringResult,
    root_assessment_id: String,
) -> Result<AssessmentAttempt, RunnerError> {
    let final_score = clamp_score(result.final_score)?;
    let skill_scores = result
        .skill_scores
        .into_iter()
        .map(|(skill, score)| clamp_score(score).map(|s| (skill, s)))
        .collect::<Result<_, _>>()?;

    let verdicts: HashMap<&str, bool> = result
        .per_question_results
        .iter()
        .map(|r| (r.question_id.as_str(), r.is_correct))
        .collect();
    let responses = request
        .responses
        .into_iter()
        .map(|mut r| {
            r.is_correct = verdicts.get(r.question_id.as_str()).copied();
            r
        })
        .collect();

    Ok(AssessmentAttempt {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: request.user_id,
        assessment_id: request.assessment_id,
        role_id: request.role_id,
        root_assessment_id,
        started_at: request.started_at,
        submitted_at: request.submitted_at,
        responses,
        questions: request.questions,
        final_score,
        skill_scores,
        ai_feedback: result.ai_feedback,
    })
}

fn clamp_score(score: f64) -> Result<f64, RunnerError> {
    if !score.is_finite() {
        return Err(RunnerError::Scoring(AiError::Malformed(format!(
            "score {} is not a number",
            score
        ))));
    }
    Ok(score.clamp(0.0, 100.0))
}

/// Turns the collaborator's raw reply into what the candidate sees.
///
/// If any submission is missing or has the wrong number of results, nothing
/// in the reply is trusted and every test case is reported as an error.
/// `expectedOutput` always comes from the question, and Markdown answers
/// show the candidate's own text as output.
fn finalize_batch(
    request: &BatchExecutionRequest,
    mut raw: BatchExecutionResult,
) -> BatchExecutionResult {
    let complete = request.submissions.iter().all(|s| {
        raw.get(&s.question_id)
            .map_or(s.test_cases.is_empty(), |r| r.len() == s.test_cases.len())
    });
    if !complete {
        tracing::warn!("Execution results incomplete, marking every test case as an error");
    }

    request
        .submissions
        .iter()
        .map(|s| {
            let mut results: Vec<ExecutionResult> = if complete {
                raw.remove(&s.question_id).unwrap_or_default()
            } else {
                s.test_cases
                    .iter()
                    .map(|tc| ExecutionResult::unavailable(tc, EXECUTION_UNAVAILABLE))
                    .collect()
            };
            for (result, tc) in results.iter_mut().zip(&s.test_cases) {
                result.expected_output = Some(tc.expected_output.clone());
                if s.is_markdown() {
                    result.output = s.code.clone();
                }
            }
            (s.question_id.clone(), results)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionStatus, TestCase};

    fn submission(id: &str, language: &str, code: &str, cases: usize) -> CodeSubmission {
        CodeSubmission {
            question_id: id.into(),
            code: code.into(),
            language: language.into(),
            test_cases: (0..cases)
                .map(|i| TestCase {
                    input: i.to_string(),
                    expected_output: format!("expected {}", i),
                })
                .collect(),
        }
    }

    fn result(status: ExecutionStatus, output: &str) -> ExecutionResult {
        ExecutionResult {
            status,
            output: output.into(),
            expected_output: None,
            time: "5ms".into(),
            memory: "1MB".into(),
        }
    }

    #[test]
    fn test_finalize_fills_expected_output() {
        let request = BatchExecutionRequest {
            submissions: vec![submission("q1", "python", "print(0)", 1)],
        };
        let mut raw = BatchExecutionResult::new();
        raw.insert("q1".into(), vec![result(ExecutionStatus::Passed, "0")]);

        let out = finalize_batch(&request, raw);
        assert_eq!(out["q1"][0].status, ExecutionStatus::Passed);
        assert_eq!(out["q1"][0].output, "0");
        assert_eq!(out["q1"][0].expected_output.as_deref(), Some("expected 0"));
    }

    #[test]
    fn test_finalize_markdown_shows_submitted_text() {
        let request = BatchExecutionRequest {
            submissions: vec![submission("md", "markdown", "# Hello\n\n* a", 2)],
        };
        let mut raw = BatchExecutionResult::new();
        raw.insert(
            "md".into(),
            vec![
                result(ExecutionStatus::Passed, "<h1>Hello</h1>"),
                result(ExecutionStatus::Failed, ""),
            ],
        );

        let out = finalize_batch(&request, raw);
        assert!(out["md"].iter().all(|r| r.output == "# Hello\n\n* a"));
        assert_eq!(out["md"][1].status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_finalize_incomplete_reply_is_all_errors() {
        let request = BatchExecutionRequest {
            submissions: vec![
                submission("q1", "python", "print(0)", 1),
                submission("q2", "rust", "fn main() {}", 2),
            ],
        };
        let mut raw = BatchExecutionResult::new();
        raw.insert("q1".into(), vec![result(ExecutionStatus::Passed, "0")]);
        raw.insert("q2".into(), vec![result(ExecutionStatus::Passed, "")]);

        let out = finalize_batch(&request, raw);
        assert_eq!(out["q1"].len(), 1);
        assert_eq!(out["q2"].len(), 2);
        assert!(
            out.values()
                .flatten()
                .all(|r| r.status == ExecutionStatus::Error)
        );
        assert_eq!(out["q2"][1].expected_output.as_deref(), Some("expected 1"));
    }

    #[test]
    fn test_finalize_empty_reply_is_all_errors() {
        let request = BatchExecutionRequest {
            submissions: vec![submission("q1", "go", "package main", 3)],
        };
        let out = finalize_batch(&request, BatchExecutionResult::new());
        assert_eq!(out["q1"].len(), 3);
        assert!(out["q1"].iter().all(|r| r.status == ExecutionStatus::Error));
        assert!(out["q1"].iter().all(|r| r.output == EXECUTION_UNAVAILABLE));
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(120.0).unwrap(), 100.0);
        assert_eq!(clamp_score(-3.0).unwrap(), 0.0);
        assert_eq!(clamp_score(55.5).unwrap(), 55.5);
        assert!(clamp_score(f64::NAN).is_err());
    }

    #[test]
    fn test_in_flight_flag_released_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = InFlight::acquire(&flag);
        assert!(guard.is_some());
        assert!(InFlight::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlight::acquire(&flag).is_some());
    }
}
