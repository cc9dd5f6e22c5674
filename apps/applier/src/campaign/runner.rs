use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::campaign::{CampaignSettings, Pacing, RunReport, Termination};
use crate::driver::{AutomationDriver, Session};
use crate::errors::AppError;
use crate::generation::MessageGenerator;
use crate::models::message::OutreachMessage;
use crate::models::posting::JobPosting;

/// Loop states after the filter has been applied.
#[derive(Debug)]
enum LoopState {
    Scanning(usize),
    Evaluating(JobPosting),
    Generating(JobPosting),
    Sending(JobPosting, OutreachMessage),
    /// Fixed pause before scanning `next`.
    Cooldown { next: usize },
    Terminated(Termination),
}

/// Runs one campaign.
///
/// Failures while opening the session, logging in or filtering are returned as
/// errors. Once scanning starts, every failure ends the loop and is recorded in
/// the report instead; generation failures only skip the posting.
pub async fn run(
    driver: &dyn AutomationDriver,
    generator: &mut dyn MessageGenerator,
    settings: &CampaignSettings,
) -> Result<RunReport, AppError> {
    let mut report = RunReport::start();
    info!(
        "Run {} starting: filter '{}', strategy {}, scan policy {}",
        report.run_id,
        settings.filter_label,
        generator.strategy(),
        settings.scan_policy
    );

    let session = driver
        .open_session(&settings.target_url, settings.browser_kind)
        .await?;
    info!("Session {} open in {}", session.id(), session.browser());

    if let Err(e) = prepare(driver, &session, settings).await {
        error!("Setup failed: {}", e);
        release(driver, session, settings.detach).await;
        return Err(e);
    }

    let termination = scan(driver, generator, &session, settings, &mut report).await;
    match &termination {
        Termination::Aborted { error, .. } => error!("Run aborted: {}", error),
        other => info!("Run finished: {:?}", other),
    }
    report.finish(termination);

    release(driver, session, settings.detach).await;
    Ok(report)
}

async fn prepare(
    driver: &dyn AutomationDriver,
    session: &Session,
    settings: &CampaignSettings,
) -> Result<(), AppError> {
    driver.log_in(session).await?;
    driver.select_filter(session, &settings.filter_label).await
}

async fn release(driver: &dyn AutomationDriver, session: Session, detach: bool) {
    if detach {
        info!("Leaving browser session {} open", session.id());
        return;
    }
    if let Err(e) = driver.close_session(session).await {
        warn!("Failed to close browser session: {}", e);
    }
}

async fn scan(
    driver: &dyn AutomationDriver,
    generator: &mut dyn MessageGenerator,
    session: &Session,
    settings: &CampaignSettings,
    report: &mut RunReport,
) -> Termination {
    let policy = settings.scan_policy;
    let mut iterations = 0usize;
    let mut state = LoopState::Scanning(1);

    loop {
        state = match state {
            LoopState::Scanning(index) => {
                if settings.max_iterations.is_some_and(|max| iterations >= max) {
                    LoopState::Terminated(Termination::IterationLimit)
                } else {
                    iterations += 1;
                    report.last_index = Some(index);
                    match driver.get_posting_at(session, index).await {
                        Ok(Some(posting)) => {
                            report.postings_seen += 1;
                            LoopState::Evaluating(posting)
                        }
                        Ok(None) => LoopState::Terminated(Termination::EndOfList),
                        Err(e) => LoopState::Terminated(Termination::aborted(&e)),
                    }
                }
            }

            LoopState::Evaluating(posting) => match driver.get_contact_label(session).await {
                Ok(label) => {
                    let posting = posting.with_contact_label(label);
                    if posting.contact_eligible {
                        LoopState::Generating(posting)
                    } else {
                        info!(
                            "Skipping posting {}: contact label is {:?}",
                            posting.index,
                            posting.contact_label.as_deref().unwrap_or_default()
                        );
                        report.skipped += 1;
                        LoopState::Cooldown {
                            next: policy.next_index(posting.index),
                        }
                    }
                }
                Err(e) => LoopState::Terminated(Termination::aborted(&e)),
            },

            LoopState::Generating(posting) => match generator.generate(&posting.description).await {
                Ok(message) => {
                    info!(
                        "Generated {} char message for posting {}",
                        message.char_count(),
                        posting.index
                    );
                    LoopState::Sending(posting, message)
                }
                Err(e) => {
                    warn!("No message for posting {}: {}", posting.index, e);
                    report.generation_failures += 1;
                    LoopState::Cooldown {
                        next: policy.next_index(posting.index),
                    }
                }
            },

            LoopState::Sending(posting, message) => {
                match deliver(driver, session, &message, settings).await {
                    Ok(()) => {
                        info!("Message sent for posting {}", posting.index);
                        report.messages_sent += 1;
                        LoopState::Cooldown {
                            next: policy.next_index(posting.index),
                        }
                    }
                    Err(e) => LoopState::Terminated(Termination::aborted(&e)),
                }
            }

            LoopState::Cooldown { next } => {
                sleep(settings.pacing.between_postings).await;
                LoopState::Scanning(next)
            }

            LoopState::Terminated(termination) => return termination,
        };
    }
}

/// Opens the chat for the current posting, sends `message` and returns to the list.
async fn deliver(
    driver: &dyn AutomationDriver,
    session: &Session,
    message: &OutreachMessage,
    settings: &CampaignSettings,
) -> Result<(), AppError> {
    let Pacing {
        before_contact,
        after_send,
        after_back,
        ..
    } = settings.pacing;

    sleep(before_contact).await;
    driver.click_contact(session).await?;
    let chat_box = driver
        .wait_for_chat_box(session, settings.chat_box_wait)
        .await?;
    driver.send_message(session, &chat_box, &message.text).await?;
    sleep(after_send).await;
    driver.go_back(session).await?;
    sleep(after_back).await;
    Ok(())
}
