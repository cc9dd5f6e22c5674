/// LLM Client: the single point of entry for all generation-backend calls.
///
/// No other module talks to the OpenAI-compatible API directly: chat
/// completions, embeddings and the assistants/threads/runs endpoints all go
/// through `LlmClient`.
///
/// Models are hardcoded to keep every run on the same backend behaviour.
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Chat model used for retrieval-augmented letters and for created assistants.
pub const CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const TEMPERATURE: f32 = 1.0;
const MAX_RETRIES: u32 = 3;
const ASSISTANTS_BETA: &str = "assistants=v2";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

/// A generation run on an assistant thread.
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: String,
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Whether a failed request may be sent again.
///
/// Requests that create backend state (assistants, threads, messages, runs)
/// are sent once: a 5xx or timeout does not prove the backend dropped them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Retryable,
    Once,
}

/// Wraps an OpenAI-compatible API with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, LlmError> {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Single-turn chat completion. Returns the text of the first choice.
    pub async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let body = serde_json::to_value(ChatRequest {
            model: CHAT_MODEL,
            temperature: TEMPERATURE,
            messages,
        })?;

        let response: ChatResponse = self
            .request(Method::POST, "/chat/completions", Some(&body), false, Delivery::Retryable)
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Chat completion succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }

    /// Embeds every input, preserving input order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::to_value(EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: inputs,
        })?;
        let mut response: EmbeddingResponse = self
            .request(Method::POST, "/embeddings", Some(&body), false, Delivery::Retryable)
            .await?;

        if response.data.len() != inputs.len() {
            return Err(LlmError::Api {
                status: 200,
                message: format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    response.data.len()
                ),
            });
        }

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    pub async fn create_assistant(
        &self,
        name: &str,
        instructions: &str,
    ) -> Result<String, LlmError> {
        let body = json!({
            "name": name,
            "instructions": instructions,
            "model": CHAT_MODEL,
        });
        let created: ObjectId = self
            .request(Method::POST, "/assistants", Some(&body), true, Delivery::Once)
            .await?;
        Ok(created.id)
    }

    pub async fn create_thread(&self) -> Result<String, LlmError> {
        let created: ObjectId = self
            .request(Method::POST, "/threads", Some(&json!({})), true, Delivery::Once)
            .await?;
        Ok(created.id)
    }

    pub async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), LlmError> {
        let body = json!({ "role": "user", "content": content });
        let _: ObjectId = self
            .request(
                Method::POST,
                &format!("/threads/{thread_id}/messages"),
                Some(&body),
                true,
                Delivery::Once,
            )
            .await?;
        Ok(())
    }

    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, LlmError> {
        let body = json!({ "assistant_id": assistant_id });
        self.request(
            Method::POST,
            &format!("/threads/{thread_id}/runs"),
            Some(&body),
            true,
            Delivery::Once,
        )
        .await
    }

    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, LlmError> {
        self.request(
            Method::GET,
            &format!("/threads/{thread_id}/runs/{run_id}"),
            None,
            true,
            Delivery::Retryable,
        )
        .await
    }

    /// Text of the most recent assistant turn on the thread.
    pub async fn latest_assistant_message(&self, thread_id: &str) -> Result<String, LlmError> {
        let list: MessageList = self
            .request(
                Method::GET,
                &format!("/threads/{thread_id}/messages?order=desc&limit=20"),
                None,
                true,
                Delivery::Retryable,
            )
            .await?;

        list.data
            .into_iter()
            .find(|m| m.role == "assistant")
            .and_then(|m| {
                m.content
                    .into_iter()
                    .find(|c| c.content_type == "text")
                    .and_then(|c| c.text)
            })
            .map(|t| t.value)
            .ok_or(LlmError::EmptyContent)
    }

    /// Sends a request. `Delivery::Retryable` requests are retried on 429
    /// (rate limit), 5xx and transport errors with exponential backoff.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        assistants_api: bool,
        delivery: Delivery,
    ) -> Result<T, LlmError> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = match delivery {
            Delivery::Retryable => MAX_RETRIES,
            Delivery::Once => 1,
        };
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut builder = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key);
            if assistants_api {
                builder = builder.header("OpenAI-Beta", ASSISTANTS_BETA);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response.json::<T>().await?);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Minimal OpenAI-compatible mock backend for wire tests.

    use axum::Router;

    /// Serves `app` on an ephemeral local port and returns its base URL.
    pub async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client =
            LlmClient::new("sk-test".into(), Some("https://proxy.example.com/v1/".into())).unwrap();
        assert_eq!(client.base_url(), "https://proxy.example.com/v1");
    }

    #[test]
    fn test_default_base_url() {
        let client = LlmClient::new("sk-test".into(), None).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let app = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], CHAT_MODEL);
                assert_eq!(body["messages"][0]["role"], "user");
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Dear Hiring Manager" } }],
                    "usage": { "prompt_tokens": 10, "completion_tokens": 3 }
                }))
            }),
        );
        let base = test_server::spawn(app).await;
        let client = LlmClient::new("sk-test".into(), Some(base)).unwrap();

        let text = client.complete(None, "hello").await.unwrap();
        assert_eq!(text, "Dear Hiring Manager");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried_and_carries_message() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": { "message": "bad temperature" } })),
                )
            }),
        );
        let base = test_server::spawn(app).await;
        let client = LlmClient::new("sk-test".into(), Some(base)).unwrap();

        match client.complete(None, "hello").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad temperature");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_restores_input_order() {
        let app = Router::new().route(
            "/embeddings",
            post(|| async {
                Json(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }))
            }),
        );
        let base = test_server::spawn(app).await;
        let client = LlmClient::new("sk-test".into(), Some(base)).unwrap();

        let vectors = client
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    /// Replies 502 to the first request on `path` and succeeds afterwards.
    fn flaky_once(path: &str, reply: Value, hits: Arc<AtomicUsize>) -> Router {
        let handler = move || {
            let hits = hits.clone();
            let reply = reply.clone();
            async move {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::BAD_GATEWAY, Json(json!({ "error": { "message": "upstream" } })))
                } else {
                    (StatusCode::OK, Json(reply))
                }
            }
        };
        Router::new().route(path, post(handler.clone()).get(handler))
    }

    #[tokio::test]
    async fn test_user_turn_is_posted_once_even_on_server_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = flaky_once("/threads/:thread_id/messages", json!({ "id": "msg_1" }), hits.clone());
        let base = test_server::spawn(app).await;
        let client = LlmClient::new("sk-test".into(), Some(base)).unwrap();

        let err = client.add_user_message("thread_1", "job").await.unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 502, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_creation_is_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = flaky_once(
            "/threads/:thread_id/runs",
            json!({ "id": "run_1", "status": "queued" }),
            hits.clone(),
        );
        let base = test_server::spawn(app).await;
        let client = LlmClient::new("sk-test".into(), Some(base)).unwrap();

        assert!(client.create_run("thread_1", "asst_1").await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_status_poll_is_retried_after_server_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = flaky_once(
            "/threads/:thread_id/runs/:run_id",
            json!({ "id": "run_1", "status": "completed" }),
            hits.clone(),
        );
        let base = test_server::spawn(app).await;
        let client = LlmClient::new("sk-test".into(), Some(base)).unwrap();

        let run = client.retrieve_run("thread_1", "run_1").await.unwrap();

        assert_eq!(run.status, "completed");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_latest_assistant_message_skips_user_turns() {
        let app = Router::new().route(
            "/threads/:thread_id/messages",
            get(|| async {
                Json(json!({
                    "data": [
                        { "role": "user", "content": [{ "type": "text", "text": { "value": "job" } }] },
                        { "role": "assistant", "content": [{ "type": "text", "text": { "value": "reply" } }] }
                    ]
                }))
            }),
        );
        let base = test_server::spawn(app).await;
        let client = LlmClient::new("sk-test".into(), Some(base)).unwrap();

        let text = client.latest_assistant_message("thread_1").await.unwrap();
        assert_eq!(text, "reply");
    }
}
