// tests/common/mod.rs
#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use assessment_runner::{
    ai::{AiError, CodeExecutionService, ScoringService},
    models::{
        AiFeedback, Assessment, AssessmentAttempt, AttemptSummary, BatchExecutionRequest,
        BatchExecutionResult, Question, QuestionResult, QuestionType, ScoringRequest,
        ScoringResult, TestCase,
    },
    repository::{AttemptRepository, RepositoryError, SqliteAttemptRepository},
    runner::AssessmentRunner,
    session::{MemorySnapshotStore, SessionStore},
    utils::clock::ManualClock,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::sqlite::SqlitePoolOptions;

pub const T0: i64 = 1_750_000_000_000;

/// Scorer that marks every question correct unless told to fail.
#[derive(Default)]
pub struct FakeScorer {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Mutex<Duration>,
    pub requests: Mutex<Vec<ScoringRequest>>,
}

impl FakeScorer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringService for FakeScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoringResult, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AiError::RateLimited);
        }

        Ok(ScoringResult {
            final_score: 100.0,
            skill_scores: request
                .questions
                .iter()
                .map(|q| (q.skill.clone(), 100.0))
                .collect(),
            ai_feedback: AiFeedback {
                summary: "Great job overall.".to_string(),
                suggestions: vec!["Keep practising.".to_string()],
            },
            per_question_results: request
                .questions
                .iter()
                .map(|q| QuestionResult {
                    question_id: q.id.clone(),
                    is_correct: true,
                })
                .collect(),
        })
    }
}

/// Executor that replies with a canned result.
#[derive(Default)]
pub struct FakeExecutor {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Mutex<Duration>,
    pub reply: Mutex<BatchExecutionResult>,
    pub requests: Mutex<Vec<BatchExecutionRequest>>,
}

impl FakeExecutor {
    pub fn replying(reply: BatchExecutionResult) -> Self {
        Self {
            reply: Mutex::new(reply),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CodeExecutionService for FakeExecutor {
    async fn run_batch(
        &self,
        request: &BatchExecutionRequest,
    ) -> Result<BatchExecutionResult, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AiError::Upstream {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(self.reply.lock().clone())
    }
}

/// SQLite repository whose writes can be made to fail or stall.
pub struct FlakyRepository {
    inner: Arc<SqliteAttemptRepository>,
    pub fail_inserts: AtomicBool,
    pub insert_delay: Mutex<Duration>,
}

impl FlakyRepository {
    pub fn new(inner: Arc<SqliteAttemptRepository>) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
            insert_delay: Mutex::new(Duration::ZERO),
        }
    }
}

#[async_trait]
impl AttemptRepository for FlakyRepository {
    async fn insert(&self, attempt: &AssessmentAttempt) -> Result<(), RepositoryError> {
        let delay = *self.insert_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.insert(attempt).await
    }

    async fn get(
        &self,
        user_id: &str,
        attempt_id: &str,
    ) -> Result<Option<AssessmentAttempt>, RepositoryError> {
        self.inner.get(user_id, attempt_id).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<AttemptSummary>, RepositoryError> {
        self.inner.list_for_user(user_id).await
    }

    async fn list_for_root(
        &self,
        user_id: &str,
        root_assessment_id: &str,
    ) -> Result<Vec<AssessmentAttempt>, RepositoryError> {
        self.inner.list_for_root(user_id, root_assessment_id).await
    }
}

pub fn question(id: &str, question_type: QuestionType, skill: &str) -> Question {
    let coding = question_type == QuestionType::Coding;
    Question {
        id: id.to_string(),
        question_text: format!("Question {}", id),
        question_type,
        difficulty: 5,
        skill: skill.to_string(),
        tags: vec![],
        max_score: 10,
        time_limit: None,
        options: (question_type == QuestionType::MultipleChoice)
            .then(|| vec!["A".to_string(), "B".to_string(), "C".to_string()]),
        correct_answer: (question_type == QuestionType::MultipleChoice).then(|| "A".to_string()),
        starter_code: coding.then(|| "function solve(input) {}".to_string()),
        test_cases: coding.then(|| {
            vec![
                TestCase {
                    input: "1".to_string(),
                    expected_output: "2".to_string(),
                },
                TestCase {
                    input: "2".to_string(),
                    expected_output: "4".to_string(),
                },
            ]
        }),
    }
}

/// One multiple-choice, one short-answer and one coding question, 60 seconds.
pub fn assessment() -> Assessment {
    Assessment {
        id: "assessment-1".to_string(),
        role_id: "backend".to_string(),
        role_name: "Backend Engineer".to_string(),
        questions: vec![
            question("q-mcq", QuestionType::MultipleChoice, "databases"),
            question("q-short", QuestionType::ShortAnswer, "architecture"),
            question("q-code", QuestionType::Coding, "algorithms"),
        ],
        total_time_limit: 60,
        root_assessment_id: None,
    }
}

pub async fn memory_repo() -> Arc<SqliteAttemptRepository> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");
    Arc::new(SqliteAttemptRepository::new(pool))
}

pub struct Harness {
    pub runner: Arc<AssessmentRunner>,
    pub clock: Arc<ManualClock>,
    pub snapshots: Arc<MemorySnapshotStore>,
    pub scorer: Arc<FakeScorer>,
    pub executor: Arc<FakeExecutor>,
    pub repo: Arc<FlakyRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

pub async fn harness(scorer: FakeScorer, executor: FakeExecutor) -> Harness {
    let clock = Arc::new(ManualClock::new(T0));
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let scorer = Arc::new(scorer);
    let executor = Arc::new(executor);
    let repo = Arc::new(FlakyRepository::new(memory_repo().await));
    let attempts: Arc<dyn AttemptRepository> = repo.clone();

    let runner = Arc::new(
        AssessmentRunner::new(
            SessionStore::new(snapshots.clone(), clock.clone()),
            scorer.clone(),
            executor.clone(),
            attempts.clone(),
            clock.clone(),
        )
        .with_tick_interval(Duration::from_millis(10)),
    );

    Harness {
        runner,
        clock,
        snapshots,
        scorer,
        executor,
        repo,
        attempts,
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
