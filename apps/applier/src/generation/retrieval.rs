//! Retrieval-augmented strategy.
//!
//! Flow: embed the fixed retrieval question → top-k resume chunks → fill the
//! letter prompt → chat completion → flatten newlines and enforce the budget.

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::errors::AppError;
use crate::generation::cleanup::CleanupPolicy;
use crate::generation::{GenerationStrategy, MessageGenerator};
use crate::llm_client::prompts::{build_letter_prompt, RETRIEVAL_QUESTION};
use crate::llm_client::LlmClient;
use crate::models::message::OutreachMessage;
use crate::resume::index::DEFAULT_TOP_K;
use crate::resume::ResumeIndex;

const NO_CONTEXT: &str = "No relevant resume content found.";

pub struct RetrievalGenerator {
    llm: LlmClient,
    index: ResumeIndex,
    character_limit: usize,
}

impl RetrievalGenerator {
    pub fn new(llm: LlmClient, index: ResumeIndex, character_limit: usize) -> Self {
        Self {
            llm,
            index,
            character_limit,
        }
    }
}

#[async_trait]
impl MessageGenerator for RetrievalGenerator {
    fn strategy(&self) -> GenerationStrategy {
        GenerationStrategy::RetrievalAugmented
    }

    async fn generate(&mut self, job_description: &str) -> Result<OutreachMessage, AppError> {
        generate_letter(&self.llm, &self.index, job_description, self.character_limit)
            .await
            .map_err(|e| {
                error!("Retrieval-augmented generation failed: {e}");
                match e {
                    AppError::GenerationFailed(_) => e,
                    other => AppError::GenerationFailed(other.to_string()),
                }
            })
    }
}

/// Writes one letter for `job_description` from the chunks in `index`.
pub async fn generate_letter(
    llm: &LlmClient,
    index: &ResumeIndex,
    job_description: &str,
    character_limit: usize,
) -> Result<OutreachMessage, AppError> {
    let context = retrieve_context(llm, index).await?;
    let prompt = build_letter_prompt(character_limit, job_description, &context);

    let raw = llm.complete(None, &prompt).await?;
    debug!("Raw letter ({} chars): {raw}", raw.chars().count());

    let text = CleanupPolicy::FlattenNewlines { character_limit }.apply(&raw);
    if text.is_empty() {
        return Err(AppError::GenerationFailed(
            "model returned an empty letter".to_string(),
        ));
    }

    info!("Generated letter of {} characters", text.chars().count());
    Ok(OutreachMessage {
        text,
        strategy: GenerationStrategy::RetrievalAugmented,
    })
}

/// Top-k chunks for the fixed retrieval question, separated by blank lines.
async fn retrieve_context(llm: &LlmClient, index: &ResumeIndex) -> Result<String, AppError> {
    if index.is_empty() {
        return Ok(NO_CONTEXT.to_string());
    }

    let query = llm
        .embed(&[RETRIEVAL_QUESTION.to_string()])
        .await?
        .into_iter()
        .next()
        .unwrap_or_default();

    let hits = index.search(&query, DEFAULT_TOP_K);
    debug!(
        "Retrieved chunks {:?}",
        hits.iter()
            .map(|(c, score)| (c.chunk_id, *score))
            .collect::<Vec<_>>()
    );

    Ok(hits
        .iter()
        .map(|(c, _)| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::test_server;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    fn two_chunk_index() -> ResumeIndex {
        let mut index = ResumeIndex::default();
        index
            .insert("Six years of Swift and UIKit".to_string(), vec![1.0, 0.0])
            .unwrap();
        index
            .insert("Hobby: competitive baking".to_string(), vec![0.0, 1.0])
            .unwrap();
        index
    }

    fn backend(letter: &'static str) -> Router {
        Router::new()
            .route(
                "/embeddings",
                post(|| async { Json(json!({ "data": [{ "index": 0, "embedding": [1.0, 0.0] }] })) }),
            )
            .route(
                "/chat/completions",
                post(move |Json(body): Json<Value>| async move {
                    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
                    assert!(prompt.contains("Six years of Swift and UIKit"));
                    assert!(prompt.contains("Senior iOS Engineer"));
                    Json(json!({ "choices": [{ "message": { "content": letter } }] }))
                }),
            )
    }

    #[tokio::test]
    async fn test_letter_is_single_line_and_within_budget() {
        let long_letter: &'static str = Box::leak(
            format!(
                "Dear Hiring Manager,\n\n{}\nContact: alex@example.com",
                "I have shipped many iOS apps with Swift. ".repeat(20)
            )
            .into_boxed_str(),
        );
        let base = test_server::spawn(backend(long_letter)).await;
        let llm = LlmClient::new("sk-test".into(), Some(base)).unwrap();
        let mut generator = RetrievalGenerator::new(llm, two_chunk_index(), 300);

        let message = generator.generate("Senior iOS Engineer").await.unwrap();
        assert!(message.char_count() <= 300);
        assert!(!message.text.contains('\n'));
        assert!(message.text.starts_with("Dear Hiring Manager,"));
        assert_eq!(message.strategy, GenerationStrategy::RetrievalAugmented);
    }

    #[tokio::test]
    async fn test_short_letter_is_kept_intact() {
        let base =
            test_server::spawn(backend("Dear Hiring Manager,\nI fit.\nalex@example.com")).await;
        let llm = LlmClient::new("sk-test".into(), Some(base)).unwrap();
        let mut generator = RetrievalGenerator::new(llm, two_chunk_index(), 300);

        let message = generator.generate("Senior iOS Engineer").await.unwrap();
        assert_eq!(message.text, "Dear Hiring Manager, I fit. alex@example.com");
    }

    #[tokio::test]
    async fn test_backend_error_becomes_generation_failed() {
        let app = Router::new().route(
            "/embeddings",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "invalid api key" } })),
                )
            }),
        );
        let base = test_server::spawn(app).await;
        let llm = LlmClient::new("sk-test".into(), Some(base)).unwrap();
        let mut generator = RetrievalGenerator::new(llm, two_chunk_index(), 300);

        let err = generator.generate("Senior iOS Engineer").await.unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(ref m) if m.contains("invalid api key")));
    }
}
