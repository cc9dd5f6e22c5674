use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::driver::selectors;
use crate::driver::webdriver::{Condition, WebDriverClient, ENTER_KEY};
use crate::driver::{AutomationDriver, BrowserKind, ChatBoxHandle, Session};
use crate::errors::AppError;
use crate::models::posting::JobPosting;

/// Upper bounds for the site's element waits.
#[derive(Debug, Clone, Copy)]
pub struct Waits {
    pub landing: Duration,
    pub login_step: Duration,
    /// Covers the user scanning the QR code on their phone.
    pub login_success: Duration,
    pub element: Duration,
}

impl Default for Waits {
    fn default() -> Self {
        Self {
            landing: Duration::from_secs(10),
            login_step: Duration::from_secs(10),
            login_success: Duration::from_secs(60),
            element: Duration::from_secs(10),
        }
    }
}

/// Pauses around typing a message, so the site registers the input before submit.
#[derive(Debug, Clone, Copy)]
pub struct TypingPacing {
    pub before_submit: Duration,
    pub after_submit: Duration,
}

impl Default for TypingPacing {
    fn default() -> Self {
        Self {
            before_submit: Duration::from_secs(3),
            after_submit: Duration::from_secs(1),
        }
    }
}

/// `AutomationDriver` for the recruiting site, driven over W3C WebDriver.
pub struct SiteDriver {
    webdriver: WebDriverClient,
    detach: bool,
    waits: Waits,
    typing: TypingPacing,
}

impl SiteDriver {
    pub fn new(webdriver_url: &str, detach: bool) -> Result<Self, AppError> {
        Ok(Self::from_client(WebDriverClient::new(webdriver_url)?, detach))
    }

    pub fn from_client(webdriver: WebDriverClient, detach: bool) -> Self {
        Self {
            webdriver,
            detach,
            waits: Waits::default(),
            typing: TypingPacing::default(),
        }
    }

    pub fn with_waits(mut self, waits: Waits) -> Self {
        self.waits = waits;
        self
    }

    pub fn with_typing_pacing(mut self, typing: TypingPacing) -> Self {
        self.typing = typing;
        self
    }

    /// Clicks the quick shortcut whose text contains `label`. Returns false if
    /// no shortcut matches.
    async fn try_shortcut(&self, session: &Session, label: &str) -> Result<bool, AppError> {
        let sid = session.id();
        let shortcuts = self
            .webdriver
            .find_elements(sid, &selectors::filter_shortcuts())
            .await?;

        for shortcut in shortcuts {
            let text = self.webdriver.text(sid, &shortcut).await?;
            if text.contains(label) {
                self.webdriver
                    .wait_until_clickable(sid, &shortcut, self.waits.element)
                    .await?;
                self.webdriver.click(sid, &shortcut).await?;
                info!("Filter '{}' applied via shortcut", label);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn select_from_dropdown(&self, session: &Session, label: &str) -> Result<(), AppError> {
        let sid = session.id();
        let trigger = self
            .webdriver
            .wait_for(
                sid,
                &selectors::filter_dropdown_trigger(),
                Condition::Clickable,
                self.waits.element,
            )
            .await?;
        self.webdriver.click(sid, &trigger).await?;

        self.webdriver
            .wait_for(
                sid,
                &selectors::filter_dropdown_panel(),
                Condition::Visible,
                self.waits.element,
            )
            .await?;

        let option = self
            .webdriver
            .wait_for(
                sid,
                &selectors::filter_option(label),
                Condition::Clickable,
                self.waits.element,
            )
            .await
            .map_err(|e| match e {
                AppError::ElementNotFound { .. } => AppError::OptionNotFound(label.to_string()),
                other => other,
            })?;
        self.webdriver.click(sid, &option).await?;

        info!("Filter '{}' applied via dropdown", label);
        Ok(())
    }
}

#[async_trait]
impl AutomationDriver for SiteDriver {
    async fn open_session(
        &self,
        target_url: &str,
        browser: BrowserKind,
    ) -> Result<Session, AppError> {
        let capabilities = WebDriverClient::capabilities(browser, self.detach);
        let session = Session::new(self.webdriver.new_session(&capabilities).await?, browser);
        info!("Started {} session {}", browser, session.id());

        if let Err(e) = self.webdriver.maximize_window(session.id()).await {
            warn!("Could not maximize window: {}", e);
        }

        self.webdriver.navigate(session.id(), target_url).await?;
        self.webdriver
            .wait_for(
                session.id(),
                &selectors::login_entry(),
                Condition::Present,
                self.waits.landing,
            )
            .await?;

        debug!("Landing page loaded: {}", target_url);
        Ok(session)
    }

    async fn log_in(&self, session: &Session) -> Result<(), AppError> {
        let sid = session.id();

        let entry = self
            .webdriver
            .wait_for(sid, &selectors::login_entry(), Condition::Present, self.waits.element)
            .await?;
        self.webdriver.click(sid, &entry).await?;

        let provider = self
            .webdriver
            .wait_for(
                sid,
                &selectors::identity_provider_button(),
                Condition::Present,
                self.waits.login_step,
            )
            .await?;
        self.webdriver.click(sid, &provider).await?;

        self.webdriver
            .wait_for(
                sid,
                &selectors::identity_provider_marker(),
                Condition::Present,
                self.waits.login_step,
            )
            .await?;
        info!(
            "Waiting up to {}s for login confirmation on the identity provider",
            self.waits.login_success.as_secs()
        );

        self.webdriver
            .wait_for(
                sid,
                &selectors::logged_in_marker(),
                Condition::Present,
                self.waits.login_success,
            )
            .await?;

        info!("Logged in");
        Ok(())
    }

    async fn select_filter(&self, session: &Session, label: &str) -> Result<(), AppError> {
        if self.try_shortcut(session, label).await? {
            return Ok(());
        }
        self.select_from_dropdown(session, label).await
    }

    async fn get_posting_at(
        &self,
        session: &Session,
        index: usize,
    ) -> Result<Option<JobPosting>, AppError> {
        let sid = session.id();
        let Some(entry) = self
            .webdriver
            .find_element(sid, &selectors::posting_at(index))
            .await?
        else {
            info!("No posting at index {}", index);
            return Ok(None);
        };
        self.webdriver.click(sid, &entry).await?;

        let description_el = self
            .webdriver
            .wait_for(
                sid,
                &selectors::job_description(),
                Condition::Present,
                self.waits.element,
            )
            .await?;
        let description = self.webdriver.text(sid, &description_el).await?;

        Ok(Some(JobPosting::new(index, description)))
    }

    async fn get_contact_label(&self, session: &Session) -> Result<String, AppError> {
        let sid = session.id();
        let label = self
            .webdriver
            .wait_for(sid, &selectors::contact_label(), Condition::Present, self.waits.element)
            .await?;
        self.webdriver.text(sid, &label).await
    }

    async fn click_contact(&self, session: &Session) -> Result<(), AppError> {
        let sid = session.id();
        let button = self
            .webdriver
            .wait_for(
                sid,
                &selectors::contact_button(),
                Condition::Clickable,
                self.waits.element,
            )
            .await?;
        self.webdriver.click(sid, &button).await
    }

    async fn wait_for_chat_box(
        &self,
        session: &Session,
        wait: Duration,
    ) -> Result<ChatBoxHandle, AppError> {
        let input = self
            .webdriver
            .wait_for(session.id(), &selectors::chat_input(), Condition::Present, wait)
            .await?;
        Ok(ChatBoxHandle(input))
    }

    async fn send_message(
        &self,
        session: &Session,
        chat_box: &ChatBoxHandle,
        text: &str,
    ) -> Result<(), AppError> {
        let sid = session.id();
        self.webdriver.clear(sid, &chat_box.0).await?;
        self.webdriver.send_keys(sid, &chat_box.0, text).await?;
        tokio::time::sleep(self.typing.before_submit).await;
        self.webdriver.send_keys(sid, &chat_box.0, ENTER_KEY).await?;
        tokio::time::sleep(self.typing.after_submit).await;
        Ok(())
    }

    async fn go_back(&self, session: &Session) -> Result<(), AppError> {
        self.webdriver.back(session.id()).await
    }

    async fn close_session(&self, session: Session) -> Result<(), AppError> {
        self.webdriver.delete_session(session.id()).await?;
        info!("Closed session {}", session.id());
        Ok(())
    }
}
