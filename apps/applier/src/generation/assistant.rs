//! Direct conversational strategy over an assistant thread.
//!
//! Each call posts the job description as a user turn, starts a run and polls
//! it until it settles. The thread is created on first use and reused for the
//! rest of the run.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::generation::cleanup::CleanupPolicy;
use crate::generation::{GenerationStrategy, MessageGenerator};
use crate::llm_client::prompts::{ASSISTANT_INSTRUCTIONS, ASSISTANT_NAME};
use crate::llm_client::{LlmClient, LlmError, Run};
use crate::models::message::OutreachMessage;

pub const RUN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Backend conversation thread. Empty until the first generation call.
#[derive(Debug, Clone, Default)]
pub struct ConversationThread {
    id: Option<String>,
}

impl ConversationThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the thread id, creating the thread on the backend if needed.
    pub async fn ensure(&mut self, llm: &LlmClient) -> Result<String, LlmError> {
        if let Some(id) = &self.id {
            return Ok(id.clone());
        }
        let id = llm.create_thread().await?;
        info!("Created conversation thread {id}");
        self.id = Some(id.clone());
        Ok(id)
    }
}

/// Where a run stands after one status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// `queued`, `in_progress`, `cancelling` or a status we do not know yet.
    Pending,
    /// `requires_action`: the run waits for tool outputs we never submit.
    ActionRequired,
    Completed,
    /// `failed`, `cancelled`, `expired`, `incomplete`.
    Failed(String),
}

impl RunState {
    pub fn from_run(run: &Run) -> Self {
        match run.status.as_str() {
            "completed" => RunState::Completed,
            "requires_action" => RunState::ActionRequired,
            "queued" | "in_progress" | "cancelling" => RunState::Pending,
            "failed" | "cancelled" | "expired" | "incomplete" => {
                let detail = run
                    .last_error
                    .as_ref()
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .unwrap_or_else(|| "no error detail".to_string());
                RunState::Failed(format!("run {} {} ({detail})", run.id, run.status))
            }
            other => {
                warn!("Unknown run status '{other}', polling again");
                RunState::Pending
            }
        }
    }
}

pub struct AssistantGenerator {
    llm: LlmClient,
    assistant_id: String,
    thread: ConversationThread,
    cleanup: CleanupPolicy,
    poll_interval: Duration,
}

impl AssistantGenerator {
    pub fn new(llm: LlmClient, assistant_id: String, signature: Option<String>) -> Self {
        Self {
            llm,
            assistant_id,
            thread: ConversationThread::new(),
            cleanup: CleanupPolicy::StripAssistantMarkup { signature },
            poll_interval: RUN_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Continues an existing conversation instead of starting a new thread.
    pub fn with_thread(mut self, thread: ConversationThread) -> Self {
        if let Some(id) = thread.id() {
            info!("Continuing conversation thread {id}");
        }
        self.thread = thread;
        self
    }

    #[cfg(test)]
    pub fn thread(&self) -> &ConversationThread {
        &self.thread
    }
}

#[async_trait]
impl MessageGenerator for AssistantGenerator {
    fn strategy(&self) -> GenerationStrategy {
        GenerationStrategy::Direct
    }

    async fn generate(&mut self, job_description: &str) -> Result<OutreachMessage, AppError> {
        let raw = chat(
            &self.llm,
            &self.assistant_id,
            &mut self.thread,
            job_description,
            self.poll_interval,
        )
        .await
        .map_err(|e| {
            error!("Assistant generation failed: {e}");
            match e {
                AppError::GenerationFailed(_) => e,
                other => AppError::GenerationFailed(other.to_string()),
            }
        })?;

        let text = self.cleanup.apply(&raw);
        if text.is_empty() {
            warn!("Assistant reply was empty after cleanup");
            return Err(AppError::GenerationFailed(
                "assistant reply was empty after cleanup".to_string(),
            ));
        }

        Ok(OutreachMessage {
            text,
            strategy: GenerationStrategy::Direct,
        })
    }
}

/// Posts `user_input` on the thread, runs the assistant and returns its raw reply.
pub async fn chat(
    llm: &LlmClient,
    assistant_id: &str,
    thread: &mut ConversationThread,
    user_input: &str,
    poll_interval: Duration,
) -> Result<String, AppError> {
    let thread_id = thread.ensure(llm).await?;
    debug!(
        "Posting job description ({} chars) to thread {thread_id}",
        user_input.chars().count()
    );

    llm.add_user_message(&thread_id, user_input).await?;
    let run = llm.create_run(&thread_id, assistant_id).await?;

    let mut state = RunState::from_run(&run);
    loop {
        match state {
            RunState::Completed => break,
            RunState::Failed(reason) => return Err(AppError::GenerationFailed(reason)),
            RunState::ActionRequired => {
                // Required actions (tool calls) are not dispatched. The run is
                // polled again in case the backend resolves it on its own.
                warn!("Run {} requires action; no handler, polling again", run.id);
            }
            RunState::Pending => {}
        }
        tokio::time::sleep(poll_interval).await;
        let polled = llm.retrieve_run(&thread_id, &run.id).await?;
        state = RunState::from_run(&polled);
    }

    Ok(llm.latest_assistant_message(&thread_id).await?)
}

/// Uses the configured assistant, or creates one and logs its id for reuse.
pub async fn ensure_assistant(
    llm: &LlmClient,
    configured: Option<String>,
) -> Result<String, AppError> {
    if let Some(id) = configured {
        info!("Using assistant {id}");
        return Ok(id);
    }
    let id = llm
        .create_assistant(ASSISTANT_NAME, ASSISTANT_INSTRUCTIONS)
        .await?;
    info!("Created assistant {id}; set OPENAI_ASSISTANT_ID={id} to reuse it");
    Ok(id)
}
