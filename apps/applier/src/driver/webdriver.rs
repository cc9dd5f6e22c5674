//! Minimal W3C WebDriver client.
//!
//! Speaks the JSON-over-HTTP protocol served by chromedriver, msedgedriver and
//! safaridriver. Only the commands the site driver needs are implemented.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::debug;

use crate::driver::BrowserKind;
use crate::errors::AppError;

/// Key under which W3C drivers return element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// WebDriver key code for Enter.
pub const ENTER_KEY: &str = "\u{E007}";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(pub String);

/// A location strategy plus its selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    using: &'static str,
    value: String,
}

impl Locator {
    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            using: "xpath",
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self {
            using: "css selector",
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.using, self.value)
    }
}

/// What a bounded wait waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Present,
    Visible,
    /// Displayed and enabled.
    Clickable,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct WebDriverClient {
    client: Client,
    base_url: String,
    poll_interval: Duration,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// New-session capabilities. Chrome keeps running after the driver exits
    /// when `detach` is set.
    pub fn capabilities(browser: BrowserKind, detach: bool) -> Value {
        let mut always_match = json!({ "browserName": browser.browser_name() });
        match browser {
            BrowserKind::Primary => {
                always_match["goog:chromeOptions"] = json!({ "detach": detach });
            }
            BrowserKind::Secondary => {
                always_match["ms:edgeOptions"] = json!({});
            }
            BrowserKind::Tertiary => {}
        }
        json!({ "capabilities": { "alwaysMatch": always_match } })
    }

    pub async fn new_session(&self, capabilities: &Value) -> Result<String, AppError> {
        let value = self
            .command(Method::POST, "/session", Some(capabilities))
            .await?;
        value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| AppError::WebDriver {
                status: 200,
                error: "session not created".to_string(),
                message: format!("new session response without sessionId: {value}"),
            })
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        self.command(Method::DELETE, &format!("/session/{session_id}"), None)
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, session_id: &str, url: &str) -> Result<(), AppError> {
        self.command(
            Method::POST,
            &format!("/session/{session_id}/url"),
            Some(&json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    pub async fn maximize_window(&self, session_id: &str) -> Result<(), AppError> {
        self.command(
            Method::POST,
            &format!("/session/{session_id}/window/maximize"),
            Some(&json!({})),
        )
        .await?;
        Ok(())
    }

    pub async fn back(&self, session_id: &str) -> Result<(), AppError> {
        self.command(
            Method::POST,
            &format!("/session/{session_id}/back"),
            Some(&json!({})),
        )
        .await?;
        Ok(())
    }

    /// First match for `locator`, or `None` if nothing matches right now.
    pub async fn find_element(
        &self,
        session_id: &str,
        locator: &Locator,
    ) -> Result<Option<ElementId>, AppError> {
        let body = json!({ "using": locator.using, "value": locator.value });
        match self
            .command(
                Method::POST,
                &format!("/session/{session_id}/element"),
                Some(&body),
            )
            .await
        {
            Ok(value) => Ok(Some(parse_element(&value)?)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn find_elements(
        &self,
        session_id: &str,
        locator: &Locator,
    ) -> Result<Vec<ElementId>, AppError> {
        let body = json!({ "using": locator.using, "value": locator.value });
        let value = self
            .command(
                Method::POST,
                &format!("/session/{session_id}/elements"),
                Some(&body),
            )
            .await?;
        value
            .as_array()
            .map(|items| items.iter().map(parse_element).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    pub async fn click(&self, session_id: &str, element: &ElementId) -> Result<(), AppError> {
        self.element_command(Method::POST, session_id, element, "click", Some(&json!({})))
            .await?;
        Ok(())
    }

    pub async fn text(&self, session_id: &str, element: &ElementId) -> Result<String, AppError> {
        let value = self
            .element_command(Method::GET, session_id, element, "text", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn is_displayed(
        &self,
        session_id: &str,
        element: &ElementId,
    ) -> Result<bool, AppError> {
        let value = self
            .element_command(Method::GET, session_id, element, "displayed", None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn is_enabled(&self, session_id: &str, element: &ElementId) -> Result<bool, AppError> {
        let value = self
            .element_command(Method::GET, session_id, element, "enabled", None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn clear(&self, session_id: &str, element: &ElementId) -> Result<(), AppError> {
        self.element_command(Method::POST, session_id, element, "clear", Some(&json!({})))
            .await?;
        Ok(())
    }

    pub async fn send_keys(
        &self,
        session_id: &str,
        element: &ElementId,
        text: &str,
    ) -> Result<(), AppError> {
        self.element_command(
            Method::POST,
            session_id,
            element,
            "value",
            Some(&json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    /// Polls until an element matching `locator` satisfies `condition`, or
    /// fails with `ElementNotFound` once `timeout` has passed.
    pub async fn wait_for(
        &self,
        session_id: &str,
        locator: &Locator,
        condition: Condition,
        timeout: Duration,
    ) -> Result<ElementId, AppError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find_element(session_id, locator).await? {
                if self.satisfies(session_id, &element, condition).await? {
                    return Ok(element);
                }
            }
            if Instant::now() >= deadline {
                return Err(AppError::ElementNotFound {
                    locator: locator.to_string(),
                    waited_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Polls until an already located element becomes clickable.
    pub async fn wait_until_clickable(
        &self,
        session_id: &str,
        element: &ElementId,
        timeout: Duration,
    ) -> Result<(), AppError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.satisfies(session_id, element, Condition::Clickable).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::ElementNotFound {
                    locator: format!("element {}", element.0),
                    waited_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// A stale or otherwise unreadable element counts as "not yet"; a lost
    /// session does not.
    async fn satisfies(
        &self,
        session_id: &str,
        element: &ElementId,
        condition: Condition,
    ) -> Result<bool, AppError> {
        let check = async {
            match condition {
                Condition::Present => Ok::<bool, AppError>(true),
                Condition::Visible => self.is_displayed(session_id, element).await,
                Condition::Clickable => Ok(self.is_displayed(session_id, element).await?
                    && self.is_enabled(session_id, element).await?),
            }
        };
        match check.await {
            Ok(ok) => Ok(ok),
            Err(AppError::NoSession) => Err(AppError::NoSession),
            Err(AppError::WebDriver { error, .. }) => {
                debug!("Condition {condition:?} not met yet on {}: {error}", element.0);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn element_command(
        &self,
        method: Method,
        session_id: &str,
        element: &ElementId,
        action: &str,
        body: Option<&Value>,
    ) -> Result<Value, AppError> {
        self.command(
            method,
            &format!("/session/{session_id}/element/{}/{action}", element.0),
            body,
        )
        .await
    }

    /// Sends one command and unwraps the `value` envelope. Driver-reported
    /// failures become `AppError::WebDriver`, or `NoSession` for a dead session.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let value = serde_json::from_str::<WireResponse>(&text)
            .map(|r| r.value)
            .unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(value);
        }

        let wire = serde_json::from_value::<WireError>(value).unwrap_or(WireError {
            error: "unknown error".to_string(),
            message: text,
        });
        if wire.error == "invalid session id" {
            return Err(AppError::NoSession);
        }
        Err(AppError::WebDriver {
            status: status.as_u16(),
            error: wire.error,
            message: wire.message,
        })
    }
}

fn parse_element(value: &Value) -> Result<ElementId, AppError> {
    value
        .get(ELEMENT_KEY)
        .and_then(|v| v.as_str())
        .map(|id| ElementId(id.to_string()))
        .ok_or_else(|| AppError::WebDriver {
            status: 200,
            error: "invalid element reference".to_string(),
            message: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::test_server;
    use axum::{
        extract::Path,
        http::StatusCode,
        routing::{delete, get, post},
        Json, Router,
    };

    fn no_such_element() -> (StatusCode, Json<Value>) {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "value": { "error": "no such element", "message": "Unable to locate element" } })),
        )
    }

    #[test]
    fn test_chrome_capabilities_carry_detach() {
        let caps = WebDriverClient::capabilities(BrowserKind::Primary, true);
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["browserName"], "chrome");
        assert_eq!(always["goog:chromeOptions"]["detach"], true);
    }

    #[test]
    fn test_safari_capabilities_have_no_vendor_options() {
        let caps = WebDriverClient::capabilities(BrowserKind::Tertiary, true);
        let always = caps["capabilities"]["alwaysMatch"].as_object().unwrap();
        assert_eq!(always.len(), 1);
        assert_eq!(always["browserName"], "safari");
    }

    #[test]
    fn test_parse_element_reference() {
        let value = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(parse_element(&value).unwrap(), ElementId("abc-123".into()));
        assert!(parse_element(&json!({ "id": "abc" })).is_err());
    }

    #[tokio::test]
    async fn test_session_lifecycle_and_missing_element() {
        let app = Router::new()
            .route(
                "/session",
                post(|| async { Json(json!({ "value": { "sessionId": "s-1", "capabilities": {} } })) }),
            )
            .route("/session/:sid", delete(|| async { Json(json!({ "value": null })) }))
            .route("/session/:sid/element", post(|| async { no_such_element() }));
        let base = test_server::spawn(app).await;
        let client = WebDriverClient::new(&base).unwrap();

        let caps = WebDriverClient::capabilities(BrowserKind::Primary, false);
        let sid = client.new_session(&caps).await.unwrap();
        assert_eq!(sid, "s-1");

        let found = client
            .find_element(&sid, &Locator::xpath("//li[99]"))
            .await
            .unwrap();
        assert!(found.is_none());

        client.delete_session(&sid).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_session_maps_to_no_session() {
        let app = Router::new().route(
            "/session/:sid/url",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "value": { "error": "invalid session id", "message": "" } })),
                )
            }),
        );
        let base = test_server::spawn(app).await;
        let client = WebDriverClient::new(&base).unwrap();

        let err = client.navigate("gone", "https://example.com").await.unwrap_err();
        assert!(matches!(err, AppError::NoSession));
    }

    #[tokio::test]
    async fn test_wait_for_times_out_with_element_not_found() {
        let app = Router::new().route("/session/:sid/element", post(|| async { no_such_element() }));
        let base = test_server::spawn(app).await;
        let client = WebDriverClient::new(&base)
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));

        let err = client
            .wait_for(
                "s-1",
                &Locator::xpath("//*[@id='chat-input']"),
                Condition::Present,
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ElementNotFound { ref locator, .. } if locator.contains("chat-input")));
    }

    #[tokio::test]
    async fn test_wait_for_visible_polls_until_displayed() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let checks = Arc::new(AtomicUsize::new(0));
        let counter = checks.clone();
        let app = Router::new()
            .route(
                "/session/:sid/element",
                post(|| async { Json(json!({ "value": { ELEMENT_KEY: "panel" } })) }),
            )
            .route(
                "/session/:sid/element/:eid/displayed",
                get(move |Path((_sid, eid)): Path<(String, String)>| {
                    let counter = counter.clone();
                    async move {
                        assert_eq!(eid, "panel");
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        Json(json!({ "value": n >= 2 }))
                    }
                }),
            );
        let base = test_server::spawn(app).await;
        let client = WebDriverClient::new(&base)
            .unwrap()
            .with_poll_interval(Duration::from_millis(5));

        let element = client
            .wait_for(
                "s-1",
                &Locator::css("ul.dropdown-expect-list"),
                Condition::Visible,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(element, ElementId("panel".into()));
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }
}
