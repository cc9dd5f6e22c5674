//! Post-processing applied to raw model output before it is typed into the chat box.
//!
//! The two strategies clean their output differently and the two rules are kept
//! apart on purpose: the retrieval strategy only flattens line breaks (and
//! enforces its character budget), the direct strategy removes every whitespace
//! character plus assistant markup.

const ANNOTATION_OPEN: char = '【';
const ANNOTATION_CLOSE: char = '】';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Retrieval-augmented: line breaks become spaces, then the text is cut to
    /// `character_limit` characters.
    FlattenNewlines { character_limit: usize },
    /// Direct conversational: all whitespace removed, the signature phrase
    /// removed, `【…】` annotations removed.
    StripAssistantMarkup { signature: Option<String> },
}

impl CleanupPolicy {
    pub fn apply(&self, raw: &str) -> String {
        match self {
            CleanupPolicy::FlattenNewlines { character_limit } => {
                truncate_chars(&flatten_newlines(raw), *character_limit)
            }
            CleanupPolicy::StripAssistantMarkup { signature } => {
                let mut text = remove_whitespace(raw);
                if let Some(signature) = signature {
                    let signature = remove_whitespace(signature);
                    if !signature.is_empty() {
                        text = text.replace(&signature, "");
                    }
                }
                strip_annotations(&text)
            }
        }
    }
}

/// Every line break (`\r\n`, `\n`, `\r`) becomes a single space.
pub fn flatten_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

pub fn remove_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Removes each `【…】` span, matching every opener with the nearest closer.
/// An opener without a closer is left in place.
pub fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(ANNOTATION_OPEN) {
        let after_open = &rest[open + ANNOTATION_OPEN.len_utf8()..];
        match after_open.find(ANNOTATION_CLOSE) {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &after_open[close + ANNOTATION_CLOSE.len_utf8()..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

/// Keeps at most `limit` characters, trimming trailing whitespace left by the cut.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    trimmed
        .chars()
        .take(limit)
        .collect::<String>()
        .trim_end()
        .to_string()
}
