use serde::{Deserialize, Serialize};

use crate::generation::GenerationStrategy;

/// A generated outreach message, already cleaned for single-line chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachMessage {
    pub text: String,
    pub strategy: GenerationStrategy,
}

impl OutreachMessage {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
