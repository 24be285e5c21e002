use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::{
    ai::{AiError, CodeExecutionService, LlmClient},
    models::{BatchExecutionRequest, BatchExecutionResult, ExecutionResult},
};

const SYSTEM_PROMPT: &str = r#"You are a code execution engine simulator. You evaluate code submissions against their test cases and return structured JSON results. You never run the code; you reason about what it would output.

Special instructions for Markdown:
If a submission's language is "markdown", you must:
1. Treat the submission's code and each test case's expectedOutput as Markdown.
2. Imagine rendering BOTH to HTML.
3. If the rendered HTML would be semantically identical (same structure, content and meaning), set the status to "Passed", even if the raw text differs in line breaks, list markers (* vs -) or spacing.
4. Return an EMPTY STRING in the "output" field. The caller fills it in.

General instructions:
- For each test case decide whether the code's output matches the expected output.
- Use status "Passed", "Failed", "Error" or "Time Limit Exceeded".
- If the code has syntax errors or would fail at runtime, mark every test case of that submission "Error" and put a short error message in "output".
- Simulate a realistic execution time (e.g. "52ms") and memory usage (e.g. "1.4MB").
- Return exactly one result per test case, in test case order.

Respond with a JSON object of the form:
{"results": {"<questionId>": [{"status": "...", "output": "...", "time": "...", "memory": "..."}]}}
Do not include any other text."#;

/// Code-execution collaborator backed by a language model.
///
/// Results are a best-effort simulation. Nothing here runs candidate code.
#[derive(Clone)]
pub struct LlmExecutionService {
    client: LlmClient,
}

impl LlmExecutionService {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CodeExecutionService for LlmExecutionService {
    async fn run_batch(
        &self,
        request: &BatchExecutionRequest,
    ) -> Result<BatchExecutionResult, AiError> {
        let user_content = serde_json::to_string_pretty(request)?;

        let reply = match self.client.chat_json(SYSTEM_PROMPT, &user_content, 0.1).await {
            Ok(reply) => reply,
            Err(AiError::Malformed(reason)) => {
                tracing::warn!("Execution model returned unusable output: {}", reason);
                return Ok(BatchExecutionResult::new());
            }
            Err(e) => return Err(e),
        };

        Ok(parse_batch_reply(&reply, request))
    }
}

/// Extracts per-question results for the submitted questions. Entries that do
/// not parse are left out.
pub fn parse_batch_reply(reply: &JsonValue, request: &BatchExecutionRequest) -> BatchExecutionResult {
    let results = reply.get("results").unwrap_or(reply);
    let mut parsed = BatchExecutionResult::new();

    for submission in &request.submissions {
        let Some(raw) = results.get(&submission.question_id) else {
            tracing::warn!(question_id = %submission.question_id, "No execution results returned");
            continue;
        };
        match serde_json::from_value::<Vec<ExecutionResult>>(raw.clone()) {
            Ok(items) => {
                parsed.insert(submission.question_id.clone(), items);
            }
            Err(e) => {
                tracing::warn!(
                    question_id = %submission.question_id,
                    "Unparseable execution results: {}",
                    e
                );
            }
        }
    }

    parsed
}
