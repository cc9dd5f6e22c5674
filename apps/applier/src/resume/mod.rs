// Resume corpus preprocessing for the retrieval-augmented strategy:
// PDF text extraction → character splitting → embedding → in-memory index.
// Runs once per run, before the first posting is processed.

pub mod index;
pub mod loader;
pub mod splitter;

use std::path::Path;

use tracing::info;

pub use index::ResumeIndex;

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::resume::splitter::CharacterSplitter;

/// Loads, splits and indexes every resume in `dir`.
pub async fn build_resume_index(dir: &Path, llm: &LlmClient) -> Result<ResumeIndex, AppError> {
    let documents = loader::load_resumes(dir).await?;
    let text = loader::concatenate(&documents);

    let chunks = CharacterSplitter::default().split_text(&text);
    info!("Split resume corpus into {} chunk(s)", chunks.len());

    ResumeIndex::build(llm, chunks).await
}
