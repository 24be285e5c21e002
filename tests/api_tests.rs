// tests/api_tests.rs

mod common;

use std::{path::PathBuf, time::Duration};

use assessment_runner::{
    config::{AiConfig, Config},
    routes,
    state::AppState,
    utils::jwt::sign_jwt,
};
use common::{FakeExecutor, FakeScorer, harness};
use serde_json::{Value, json};
use url::Url;

const SECRET: &str = "test_secret_for_integration_tests";

/// Spawns the app on a random port and returns its base URL.
async fn spawn_app() -> String {
    let h = harness(FakeScorer::default(), FakeExecutor::default()).await;

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        session_file: PathBuf::from("unused-session.json"),
        ai: AiConfig {
            base_url: Url::parse("http://127.0.0.1:9/v1").unwrap(),
            api_key: "test".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(1),
        },
    };

    let state = AppState {
        runner: h.runner,
        attempts: h.attempts,
        config,
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn token(user_id: &str) -> String {
    sign_jwt(user_id, "candidate", SECRET, 600).unwrap()
}

fn assessment_body() -> Value {
    json!({
        "id": "assessment-1",
        "roleId": "backend",
        "roleName": "Backend Engineer",
        "totalTimeLimit": 900,
        "questions": [
            {
                "id": "q1",
                "questionText": "Which index suits range queries?",
                "type": "mcq",
                "difficulty": 3,
                "skill": "databases",
                "options": ["B-tree", "Hash"],
                "correctAnswer": "B-tree"
            },
            {
                "id": "q2",
                "questionText": "Explain backpressure.",
                "type": "short",
                "difficulty": 5,
                "skill": "architecture",
                "correctAnswer": "Slowing producers to match consumers."
            },
            {
                "id": "q3",
                "questionText": "Double the input.",
                "type": "coding",
                "difficulty": 2,
                "skill": "algorithms",
                "starterCode": "function solve(n) {}",
                "testCases": [{ "input": "2", "expectedOutput": "4" }]
            }
        ]
    })
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/session", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/api/attempts", address))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_full_assessment_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let bearer = token("candidate-1");

    // 1. Start
    let response = client
        .post(format!("{}/api/session", address))
        .bearer_auth(&bearer)
        .json(&assessment_body())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    let view: Value = response.json().await.unwrap();
    assert_eq!(view["assessmentId"], "assessment-1");
    assert_eq!(view["currentQuestionIndex"], 0);
    assert_eq!(view["remainingSeconds"], 900);
    let questions = view["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions.iter().all(|q| q.get("correctAnswer").is_none()));
    assert_eq!(view["responses"]["q3"]["code"], "function solve(n) {}");
    assert_eq!(view["responses"]["q3"]["language"], "javascript");

    // 2. Answer and move on
    let response = client
        .put(format!("{}/api/session/responses/q1", address))
        .bearer_auth(&bearer)
        .json(&json!({ "answer": "B-tree" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let view: Value = response.json().await.unwrap();
    assert_eq!(view["responses"]["q1"]["answer"], "B-tree");

    let response = client
        .post(format!("{}/api/session/next", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    let view: Value = response.json().await.unwrap();
    assert_eq!(view["currentQuestionIndex"], 1);
    assert_eq!(view["currentQuestion"]["id"], "q2");
    assert!(view["currentQuestion"].get("correctAnswer").is_none());

    let response = client
        .post(format!("{}/api/session/goto/99", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    let view: Value = response.json().await.unwrap();
    assert_eq!(view["currentQuestionIndex"], 2);

    // 3. Submit
    let response = client
        .post(format!("{}/api/session/submit", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let attempt: Value = response.json().await.unwrap();
    let attempt_id = attempt["id"].as_str().unwrap().to_string();
    assert_eq!(attempt["userId"], "candidate-1");
    assert_eq!(attempt["finalScore"], 100.0);
    assert_eq!(attempt["responses"].as_array().unwrap().len(), 3);

    // 4. Session is gone
    let response = client
        .get(format!("{}/api/session", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // 5. History
    let response = client
        .get(format!("{}/api/attempts", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let summaries: Value = response.json().await.unwrap();
    assert_eq!(summaries.as_array().unwrap().len(), 1);
    assert_eq!(summaries[0]["id"], attempt_id.as_str());

    let response = client
        .get(format!("{}/api/attempts/{}", address, attempt_id))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let stored: Value = response.json().await.unwrap();
    assert_eq!(stored["aiFeedback"]["summary"], "Great job overall.");

    let response = client
        .get(format!("{}/api/attempts/progress/assessment-1", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let progress: Value = response.json().await.unwrap();
    assert_eq!(progress["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(progress["bestScore"], 100.0);
}

#[tokio::test]
async fn test_other_candidates_cannot_touch_the_session() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/session", address))
        .bearer_auth(token("candidate-1"))
        .json(&assessment_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let intruder = token("candidate-2");
    let response = client
        .get(format!("{}/api/session", address))
        .bearer_auth(&intruder)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .post(format!("{}/api/session/submit", address))
        .bearer_auth(&intruder)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .post(format!("{}/api/session", address))
        .bearer_auth(&intruder)
        .json(&assessment_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn test_invalid_assessment_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let bearer = token("candidate-1");

    let mut body = assessment_body();
    body["questions"] = json!([]);
    let response = client
        .post(format!("{}/api/session", address))
        .bearer_auth(&bearer)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .get(format!("{}/api/session", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_unknown_attempt_and_progress_are_not_found() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let bearer = token("candidate-1");

    let response = client
        .get(format!("{}/api/attempts/missing", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(format!("{}/api/attempts/progress/missing", address))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_candidates_cannot_write_execution_results() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let bearer = token("candidate-1");

    let response = client
        .post(format!("{}/api/session", address))
        .bearer_auth(&bearer)
        .json(&assessment_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .put(format!("{}/api/session/responses/q3", address))
        .bearer_auth(&bearer)
        .json(&json!({
            "code": "function solve(n) { return n * 2 }",
            "executionResult": [
                { "status": "Passed", "output": "4", "time": "1ms", "memory": "1MB" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let view: Value = response.json().await.unwrap();
    assert_eq!(
        view["responses"]["q3"]["code"],
        "function solve(n) { return n * 2 }"
    );
    assert!(view["responses"]["q3"].get("executionResult").is_none());

    let response = client
        .put(format!("{}/api/session/responses/q3", address))
        .bearer_auth(&bearer)
        .json(&json!({ "language": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}
