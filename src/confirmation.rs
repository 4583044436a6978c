/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: confirmation.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-05 13:11:58
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-06 16:25:30
 */

use crate::config::MailboxConfig;
use crate::extractor::{extract_confirmation_link, is_confirmation_message};
use crate::models::{ConfirmationOutcome, ConfirmationReport, InboxMessage};
use crate::traits::MailboxProvider;
use log::{info, warn};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationSettings {
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub attempt_timeout: Option<Duration>,
    pub cleanup: bool,
}

impl From<&MailboxConfig> for ConfirmationSettings {
    fn from(config: &MailboxConfig) -> Self {
        Self {
            poll_attempts: config.poll_attempts,
            poll_interval: config.poll_interval(),
            attempt_timeout: config.attempt_timeout(),
            cleanup: config.cleanup,
        }
    }
}

async fn inspect_inbox(
    provider: &dyn MailboxProvider,
    settings: &ConfirmationSettings,
    cancel: &CancellationToken,
) -> anyhow::Result<(ConfirmationOutcome, Option<String>)> {
    let messages = provider
        .poll_inbox(
            settings.poll_attempts,
            settings.poll_interval,
            settings.attempt_timeout,
            cancel,
        )
        .await?;
    if messages.is_empty() {
        return Ok((ConfirmationOutcome::NoMessage, None));
    }

    let Some(summary) = messages.iter().find(|m| is_confirmation_message(m)) else {
        warn!("None of {} message(s) looks like a confirmation", messages.len());
        return Ok((
            ConfirmationOutcome::NoConfirmationMessage {
                messages_seen: messages.len(),
            },
            None,
        ));
    };

    let id = summary.id();
    let message: InboxMessage = match &id {
        Some(id) => match provider.fetch_message(id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Using message summary, detail fetch failed: {:#}", e);
                summary.clone()
            }
        },
        None => summary.clone(),
    };

    let subject = message
        .subject()
        .or_else(|| summary.subject())
        .unwrap_or_default()
        .to_string();

    let outcome = match extract_confirmation_link(&message) {
        Some(url) => ConfirmationOutcome::Link { subject, url },
        None => ConfirmationOutcome::LinkNotFound { subject },
    };
    Ok((outcome, id))
}

/// Create a mailbox, wait for the confirmation email and pull its link out.
///
/// Only mailbox creation failures (and cancellation) are errors; the other
/// dead ends are reported through [`ConfirmationOutcome`].
pub async fn await_confirmation(
    provider: &mut dyn MailboxProvider,
    settings: &ConfirmationSettings,
    cancel: &CancellationToken,
) -> anyhow::Result<ConfirmationReport> {
    let mailbox = provider.create_mailbox().await?;

    let inspected = inspect_inbox(provider, settings, cancel).await;

    if settings.cleanup {
        if let Ok((_, Some(id))) = &inspected {
            if !matches!(provider.delete_message(id).await, Ok(true)) {
                warn!("Message {} was left in the mailbox", id);
            }
        }
        if !provider.delete_mailbox().await {
            warn!("Mailbox {} was left behind", mailbox.address);
        }
    }

    let (outcome, _) = inspected?;
    info!("Confirmation flow for {} finished: {:?}", mailbox.address, outcome);

    Ok(ConfirmationReport {
        address: mailbox.address,
        outcome,
    })
}

#[cfg(test)]
#[path = "./confirmation_tests.rs"]
mod confirmation_tests;
