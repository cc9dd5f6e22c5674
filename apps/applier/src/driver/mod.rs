// Browser automation.
// `AutomationDriver` is the capability the campaign loop talks to; `SiteDriver`
// implements it for the recruiting site on top of a plain W3C WebDriver client.
// Every site selector lives in `selectors.rs`.

pub mod selectors;
pub mod site;
pub mod webdriver;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::posting::JobPosting;

pub use site::SiteDriver;
pub use webdriver::ElementId;

/// Supported browsers. Configuration accepts the role or the browser name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    /// Chrome
    Primary,
    /// Edge
    Secondary,
    /// Safari
    Tertiary,
}

impl BrowserKind {
    /// W3C `browserName` capability.
    pub fn browser_name(&self) -> &'static str {
        match self {
            BrowserKind::Primary => "chrome",
            BrowserKind::Secondary => "MicrosoftEdge",
            BrowserKind::Tertiary => "safari",
        }
    }
}

impl FromStr for BrowserKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "chrome" => Ok(BrowserKind::Primary),
            "secondary" | "edge" => Ok(BrowserKind::Secondary),
            "tertiary" | "safari" => Ok(BrowserKind::Tertiary),
            _ => Err(AppError::UnsupportedBrowserKind(s.to_string())),
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.browser_name())
    }
}

/// An authenticated browser context. Owned by the run and passed by reference
/// to every driver call; consumed by `close_session`.
#[derive(Debug, PartialEq, Eq)]
pub struct Session {
    id: String,
    browser: BrowserKind,
}

impl Session {
    pub fn new(id: impl Into<String>, browser: BrowserKind) -> Self {
        Self {
            id: id.into(),
            browser,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn browser(&self) -> BrowserKind {
        self.browser
    }
}

/// The located chat input of an open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBoxHandle(pub ElementId);

/// Everything the campaign loop needs from a browser.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Starts a browser, opens `target_url` and waits for the landing page.
    async fn open_session(&self, target_url: &str, browser: BrowserKind)
        -> Result<Session, AppError>;

    /// External-identity login handshake. No retry.
    async fn log_in(&self, session: &Session) -> Result<(), AppError>;

    /// Applies `label` through a quick shortcut if one matches, otherwise
    /// through the dropdown.
    async fn select_filter(&self, session: &Session, label: &str) -> Result<(), AppError>;

    /// Opens the posting at 1-based `index`. `Ok(None)` when the list has no
    /// entry there.
    async fn get_posting_at(
        &self,
        session: &Session,
        index: usize,
    ) -> Result<Option<JobPosting>, AppError>;

    /// Visible text of the contact button for the open posting.
    async fn get_contact_label(&self, session: &Session) -> Result<String, AppError>;

    async fn click_contact(&self, session: &Session) -> Result<(), AppError>;

    async fn wait_for_chat_box(
        &self,
        session: &Session,
        wait: Duration,
    ) -> Result<ChatBoxHandle, AppError>;

    /// Clears the chat box, types `text`, then submits it.
    async fn send_message(
        &self,
        session: &Session,
        chat_box: &ChatBoxHandle,
        text: &str,
    ) -> Result<(), AppError>;

    async fn go_back(&self, session: &Session) -> Result<(), AppError>;

    /// Ends the browser session.
    async fn close_session(&self, session: Session) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_kind_accepts_roles_and_names() {
        assert_eq!("primary".parse::<BrowserKind>().unwrap(), BrowserKind::Primary);
        assert_eq!("Chrome".parse::<BrowserKind>().unwrap(), BrowserKind::Primary);
        assert_eq!("edge".parse::<BrowserKind>().unwrap(), BrowserKind::Secondary);
        assert_eq!("tertiary".parse::<BrowserKind>().unwrap(), BrowserKind::Tertiary);
    }

    #[test]
    fn test_unsupported_browser_kind() {
        let err = "firefox".parse::<BrowserKind>().unwrap_err();
        assert!(matches!(err, AppError::UnsupportedBrowserKind(ref k) if k == "firefox"));
    }

    #[test]
    fn test_browser_names_are_w3c_capabilities() {
        assert_eq!(BrowserKind::Secondary.browser_name(), "MicrosoftEdge");
        assert_eq!(BrowserKind::Tertiary.to_string(), "safari");
    }
}
