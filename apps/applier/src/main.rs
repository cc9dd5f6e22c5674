mod campaign;
mod config;
mod driver;
mod errors;
mod generation;
mod llm_client;
mod models;
mod resume;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::campaign::CampaignSettings;
use crate::config::Config;
use crate::driver::SiteDriver;
use crate::generation::{
    assistant::ensure_assistant, AssistantGenerator, ConversationThread, GenerationStrategy,
    MessageGenerator, RetrievalGenerator,
};
use crate::llm_client::LlmClient;
use crate::resume::build_resume_index;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting applier v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.openai_api_key.clone(), config.openai_base_url.clone())?;
    info!(
        "LLM client initialized (endpoint: {}, model: {})",
        llm.base_url(),
        llm_client::CHAT_MODEL
    );

    let mut generator = build_generator(&config, llm).await?;
    info!("Generation strategy: {}", generator.strategy());

    let driver = SiteDriver::new(&config.webdriver_url, config.detach)?;
    let settings = CampaignSettings::from_config(&config);

    let report = campaign::run(&driver, generator.as_mut(), &settings).await?;
    info!("Run report: {}", serde_json::to_string(&report)?);

    Ok(())
}

/// Prepares the configured strategy. Retrieval indexes the resume corpus up
/// front; direct resolves (or creates) the assistant.
async fn build_generator(config: &Config, llm: LlmClient) -> Result<Box<dyn MessageGenerator>> {
    match config.generation_strategy {
        GenerationStrategy::RetrievalAugmented => {
            let index = build_resume_index(&config.resume_dir, &llm)
                .await
                .with_context(|| {
                    format!("Failed to index resumes in {}", config.resume_dir.display())
                })?;
            info!("Resume index ready ({} chunks)", index.len());
            Ok(Box::new(RetrievalGenerator::new(
                llm,
                index,
                config.character_limit,
            )))
        }
        GenerationStrategy::Direct => {
            let assistant_id = ensure_assistant(&llm, config.assistant_id.clone()).await?;
            let thread = config
                .thread_id
                .clone()
                .map(ConversationThread::with_id)
                .unwrap_or_default();
            Ok(Box::new(
                AssistantGenerator::new(llm, assistant_id, config.signature_phrase.clone())
                    .with_thread(thread),
            ))
        }
    }
}
