use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::AppError;

/// Text extracted from one resume document.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub source: PathBuf,
    pub text: String,
}

/// Lists every `*.pdf` (case-insensitive) directly inside `dir`, sorted by file name.
pub fn list_resume_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        AppError::Resume(format!(
            "Cannot read resume directory '{}': {e}",
            dir.display()
        ))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_pdf_extension(path))
        .collect();
    files.sort();
    Ok(files)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Extracts text from every PDF in `dir`. Extraction is CPU-bound and runs on
/// the blocking pool. A document that fails to parse is skipped with a warning;
/// a directory with no readable resume is an error.
pub async fn load_resumes(dir: &Path) -> Result<Vec<ResumeDocument>, AppError> {
    let files = list_resume_files(dir)?;
    if files.is_empty() {
        return Err(AppError::Resume(format!(
            "No PDF resumes found in '{}'",
            dir.display()
        )));
    }

    let documents = tokio::task::spawn_blocking(move || extract_all(files))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}")))?;

    if documents.is_empty() {
        return Err(AppError::Resume(format!(
            "None of the PDFs in '{}' yielded any text",
            dir.display()
        )));
    }

    for document in &documents {
        debug!(
            "Extracted {} characters from '{}'",
            document.text.chars().count(),
            document.source.display()
        );
    }
    info!(
        "Loaded {} resume document(s), {} characters total",
        documents.len(),
        documents.iter().map(|d| d.text.chars().count()).sum::<usize>()
    );
    Ok(documents)
}

fn extract_all(files: Vec<PathBuf>) -> Vec<ResumeDocument> {
    files
        .into_iter()
        .filter_map(|path| {
            // pdf-extract panics on some malformed files instead of returning an error.
            let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text(&path));
            match extracted {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    Some(ResumeDocument { source: path, text })
                }
                Ok(Ok(_)) => {
                    warn!("Resume '{}' contains no extractable text", path.display());
                    None
                }
                Ok(Err(e)) => {
                    warn!("Skipping resume '{}': {e}", path.display());
                    None
                }
                Err(_) => {
                    warn!("Skipping resume '{}': PDF parser panicked", path.display());
                    None
                }
            }
        })
        .collect()
}

/// Concatenates all documents in load order, the way the corpus is fed to the splitter.
pub fn concatenate(documents: &[ResumeDocument]) -> String {
    documents.iter().map(|d| d.text.as_str()).collect()
}
