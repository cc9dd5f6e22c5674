// Job iteration loop.
// One run: open a session, log in, apply the filter once, then walk the
// posting list one entry at a time until it runs out or something breaks.

pub mod runner;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::driver::BrowserKind;
use crate::errors::AppError;

pub use runner::run;

/// How long to wait for the chat input after clicking contact.
pub const CHAT_BOX_WAIT: Duration = Duration::from_secs(50);

/// Which index to scan after a posting has been handled.
///
/// `Stay` re-reads the same index, relying on the site to drop or reorder the
/// handled posting. `Advance` moves to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    Stay,
    Advance,
}

impl ScanPolicy {
    pub fn next_index(&self, current: usize) -> usize {
        match self {
            ScanPolicy::Stay => current,
            ScanPolicy::Advance => current + 1,
        }
    }
}

impl FromStr for ScanPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stay" => Ok(ScanPolicy::Stay),
            "advance" => Ok(ScanPolicy::Advance),
            other => Err(anyhow!("Unknown scan policy '{other}' (expected stay or advance)")),
        }
    }
}

impl fmt::Display for ScanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPolicy::Stay => f.write_str("stay"),
            ScanPolicy::Advance => f.write_str("advance"),
        }
    }
}

/// Fixed delays of the loop.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Applied after every posting, whatever the outcome.
    pub between_postings: Duration,
    pub before_contact: Duration,
    pub after_send: Duration,
    pub after_back: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_postings: Duration::from_secs(3),
            before_contact: Duration::from_secs(1),
            after_send: Duration::from_secs(10),
            after_back: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CampaignSettings {
    pub target_url: String,
    pub browser_kind: BrowserKind,
    pub filter_label: String,
    pub scan_policy: ScanPolicy,
    pub max_iterations: Option<usize>,
    pub detach: bool,
    pub chat_box_wait: Duration,
    pub pacing: Pacing,
}

impl CampaignSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_url: config.target_url.clone(),
            browser_kind: config.browser_kind,
            filter_label: config.filter_label.clone(),
            scan_policy: config.scan_policy,
            max_iterations: config.max_iterations,
            detach: config.detach,
            chat_box_wait: CHAT_BOX_WAIT,
            pacing: Pacing::default(),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    EndOfList,
    IterationLimit,
    Aborted { code: String, error: String },
}

impl Termination {
    pub fn aborted(err: &AppError) -> Self {
        Termination::Aborted {
            code: err.code().to_string(),
            error: err.to_string(),
        }
    }
}

/// Summary of one run, logged as JSON when the loop ends.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub postings_seen: usize,
    pub messages_sent: usize,
    pub skipped: usize,
    pub generation_failures: usize,
    pub last_index: Option<usize>,
    pub termination: Option<Termination>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            postings_seen: 0,
            messages_sent: 0,
            skipped: 0,
            generation_failures: 0,
            last_index: None,
            termination: None,
        }
    }

    pub fn finish(&mut self, termination: Termination) {
        self.finished_at = Some(Utc::now());
        self.termination = Some(termination);
    }
}
