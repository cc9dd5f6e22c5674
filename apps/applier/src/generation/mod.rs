// Outreach message generation.
// Two interchangeable strategies behind one trait, selected once at startup.
// All backend calls go through llm_client; no direct HTTP here.

pub mod assistant;
pub mod cleanup;
pub mod retrieval;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::message::OutreachMessage;

pub use assistant::{AssistantGenerator, ConversationThread};
pub use retrieval::RetrievalGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStrategy {
    /// Assistant thread: job description in, assistant reply out.
    Direct,
    /// Resume chunks retrieved from the local index are stuffed into the prompt.
    RetrievalAugmented,
}

impl FromStr for GenerationStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(GenerationStrategy::Direct),
            "retrieval-augmented" | "retrieval_augmented" | "retrieval" | "rag" => {
                Ok(GenerationStrategy::RetrievalAugmented)
            }
            other => anyhow::bail!(
                "Unknown generation strategy '{other}' (expected 'direct' or 'retrieval-augmented')"
            ),
        }
    }
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStrategy::Direct => write!(f, "direct"),
            GenerationStrategy::RetrievalAugmented => write!(f, "retrieval-augmented"),
        }
    }
}

/// Produces an outreach message for one job description.
///
/// Implementations never let a backend error escape as anything other than
/// `AppError::GenerationFailed`: the campaign treats that as "no message for
/// this posting" and moves on.
#[async_trait]
pub trait MessageGenerator: Send {
    fn strategy(&self) -> GenerationStrategy;

    async fn generate(&mut self, job_description: &str) -> Result<OutreachMessage, AppError>;
}
