use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
///
/// Driver and generator operations return `Result<T, AppError>`. The campaign
/// loop decides per state whether a variant is fatal or local to one posting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unsupported browser kind: {0}")]
    UnsupportedBrowserKind(String),

    #[error("Element not found after {waited_secs}s: {locator}")]
    ElementNotFound { locator: String, waited_secs: u64 },

    #[error("Filter option not found: {0}")]
    OptionNotFound(String),

    #[error("Browser session is not live")]
    NoSession,

    #[error("WebDriver error (status {status}) {error}: {message}")]
    WebDriver {
        status: u16,
        error: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Resume corpus error: {0}")]
    Resume(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// WebDriver reports a missing element with this error code.
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, AppError::WebDriver { error, .. } if error == "no such element")
    }

    /// Short machine-readable code, used in the run report.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UnsupportedBrowserKind(_) => "UNSUPPORTED_BROWSER_KIND",
            AppError::ElementNotFound { .. } => "ELEMENT_NOT_FOUND",
            AppError::OptionNotFound(_) => "OPTION_NOT_FOUND",
            AppError::NoSession => "NO_SESSION",
            AppError::WebDriver { .. } => "WEBDRIVER_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::GenerationFailed(_) => "GENERATION_FAILED",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Resume(_) => "RESUME_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_element_detection() {
        let err = AppError::WebDriver {
            status: 404,
            error: "no such element".to_string(),
            message: "Unable to locate element".to_string(),
        };
        assert!(err.is_no_such_element());
        assert_eq!(err.code(), "WEBDRIVER_ERROR");
    }

    #[test]
    fn test_other_webdriver_errors_are_not_missing_elements() {
        let err = AppError::WebDriver {
            status: 400,
            error: "element not interactable".to_string(),
            message: String::new(),
        };
        assert!(!err.is_no_such_element());
        assert!(!AppError::NoSession.is_no_such_element());
    }

    #[test]
    fn test_element_not_found_message_names_locator() {
        let err = AppError::ElementNotFound {
            locator: "//*[@id='chat-input']".to_string(),
            waited_secs: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("chat-input"));
        assert!(msg.contains("50s"));
    }
}
