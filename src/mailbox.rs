/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: mailbox.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-02 16:48:10
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-06 10:02:44
 */

use crate::config::{MailboxConfig, trim_base_url};
use crate::error::ProvisionError;
use crate::models::{InboxMessage, Mailbox};
use crate::retry::poll_until_nonempty;
use crate::traits::MailboxProvider;
use anyhow::Context;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use rand::{Rng, distributions::Alphanumeric};
use reqwest::{Client, Response};
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Random `user<n><last 4 digits of epoch millis>` / `pass<8 chars>` pair.
///
/// Nothing checks the username against existing mailboxes; a clash surfaces
/// as a registration failure like any other.
pub fn generate_credentials() -> (String, String) {
    let mut rng = rand::thread_rng();
    let suffix = chrono::Utc::now().timestamp_millis().rem_euclid(10_000);
    let username = format!("user{}{:04}", rng.gen_range(0..100_000), suffix);
    let password: String = (0..8).map(|_| rng.sample(Alphanumeric) as char).collect();
    (username, format!("pass{}", password.to_lowercase()))
}

async fn ensure_success(response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProvisionError::Status { status, body }.into());
    }
    Ok(response)
}

// The provider wraps every payload in `{"data": ...}`.
async fn read_data(response: Response) -> anyhow::Result<Value> {
    let mut payload: Value = ensure_success(response).await?.json().await?;
    match payload.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(ProvisionError::Payload("response without data field".to_string()).into()),
    }
}

fn required_str(data: &Value, key: &str) -> anyhow::Result<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProvisionError::Payload(format!("missing `{}`", key)).into())
}

// Providers send `active` as bool, 0/1 or a string; anything truthy counts.
fn is_active(domain: &Value) -> bool {
    match domain.get("active") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(active)) => *active,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Client for the temporary mailbox provider. Holds at most one mailbox.
pub struct TempMailClient {
    base_url: String,
    client: Client,
    mailbox: Option<Mailbox>,
}

impl TempMailClient {
    pub fn new(config: &MailboxConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            base_url: trim_base_url(&config.base_url),
            client: builder.build()?,
            mailbox: None,
        })
    }

    #[cfg(test)]
    pub fn with_mailbox(mut self, mailbox: Mailbox) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn access_token(&self, operation: &'static str) -> Result<&str, ProvisionError> {
        self.mailbox
            .as_ref()
            .map(|m| m.access_token.as_str())
            .filter(|token| !token.is_empty())
            .ok_or(ProvisionError::MissingAccessToken(operation))
    }

    async fn create_direct(&self) -> anyhow::Result<Mailbox> {
        info!("Requesting random email generation...");
        let response = self.client.get(self.url("/api/email")).send().await?;
        let data = read_data(response).await?;

        Ok(Mailbox {
            address: required_str(&data, "email")?,
            secret: data
                .get("password")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            access_token: required_str(&data, "token")?,
        })
    }

    async fn create_registered(&self) -> anyhow::Result<Mailbox> {
        info!("Obtaining available domains...");
        let response = self.client.get(self.url("/api/domain")).send().await?;
        let data = read_data(response).await?;

        let domains = data
            .as_array()
            .filter(|domains| !domains.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No domains returned by API"))?;

        let domain = domains
            .iter()
            .filter(|d| is_active(d))
            .find_map(|d| d.get("domain").and_then(Value::as_str))
            .ok_or_else(|| anyhow::anyhow!("No active domains found"))?;

        let (username, secret) = generate_credentials();
        let address = format!("{}@{}", username, domain);
        info!("Creating account with email: {}", address);

        let response = self
            .client
            .post(self.url("/api/register"))
            .json(&json!({
                "username": username,
                "domain": domain,
                "password": secret,
            }))
            .send()
            .await?;
        ensure_success(response)
            .await
            .context("Mailbox registration failed")?;

        info!("Getting access token...");
        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": address, "password": secret }))
            .send()
            .await?;
        let data = read_data(response).await?;
        let access_token = data
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Access token not returned by API"))?
            .to_string();

        Ok(Mailbox {
            address,
            secret,
            access_token,
        })
    }

    async fn list_messages(&self, token: &str) -> anyhow::Result<Vec<InboxMessage>> {
        let response = self
            .client
            .get(self.url("/api/mail"))
            .bearer_auth(token)
            .send()
            .await?;

        match read_data(response).await? {
            Value::Array(items) => Ok(items.into_iter().map(InboxMessage::new).collect()),
            _ => Err(ProvisionError::Payload(
                "API response without expected data structure".to_string(),
            )
            .into()),
        }
    }
}

#[async_trait]
impl MailboxProvider for TempMailClient {
    async fn create_mailbox(&mut self) -> anyhow::Result<Mailbox> {
        let created = match self.create_direct().await {
            Ok(mailbox) => {
                info!("Temporary email created: {}", mailbox.address);
                Ok(mailbox)
            }
            Err(e) => {
                warn!(
                    "Direct email generation failed: {:#}. Trying alternative method...",
                    e
                );
                self.create_registered().await.inspect(|mailbox| {
                    info!(
                        "Temporary email created (alternative method): {}",
                        mailbox.address
                    )
                })
            }
        };

        match created {
            Ok(mailbox) => {
                self.mailbox = Some(mailbox.clone());
                Ok(mailbox)
            }
            Err(e) => {
                error!("Error creating temporary email: {:#}", e);
                Err(e.context("Failed to create temporary email"))
            }
        }
    }

    async fn poll_inbox(
        &self,
        max_attempts: u32,
        interval: Duration,
        attempt_timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<InboxMessage>> {
        let token = self.access_token("poll_inbox")?;
        if let Some(mailbox) = &self.mailbox {
            info!("Checking emails for {}...", mailbox.address);
        }

        poll_until_nonempty(max_attempts, interval, attempt_timeout, cancel, || {
            self.list_messages(token)
        })
        .await
    }

    async fn fetch_message(&self, id: &str) -> anyhow::Result<InboxMessage> {
        let token = self.access_token("fetch_message")?;
        info!("Getting message details {}...", id);

        let fetched = async {
            let response = self
                .client
                .get(self.url(&format!("/api/mail/{}", id)))
                .bearer_auth(token)
                .send()
                .await?;
            read_data(response)
                .await
                .context("Message data not found in response")
        }
        .await;

        match fetched {
            Ok(data) => {
                debug!(
                    "Email response structure: html={} body={} htmlEmbedded={}",
                    data.get("html").is_some(),
                    data.get("body").is_some(),
                    data.get("htmlEmbedded").is_some()
                );
                Ok(InboxMessage::new(data))
            }
            Err(e) => {
                error!("Error getting message details {}: {:#}", id, e);
                Err(e)
            }
        }
    }

    async fn delete_message(&self, id: &str) -> anyhow::Result<bool> {
        let token = self.access_token("delete_message")?;
        info!("Deleting message {}...", id);

        let outcome = self
            .client
            .delete(self.url(&format!("/api/mail/{}", id)))
            .bearer_auth(token)
            .send()
            .await;

        let deleted = match outcome {
            Ok(response) => ensure_success(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };

        match deleted {
            Ok(()) => {
                info!("Message {} deleted successfully", id);
                Ok(true)
            }
            Err(e) => {
                error!("Error deleting message {}: {:#}", id, e);
                Ok(false)
            }
        }
    }

    async fn delete_mailbox(&mut self) -> bool {
        let Ok(token) = self.access_token("delete_mailbox") else {
            warn!("No mailbox to delete");
            return false;
        };
        let address = self
            .mailbox
            .as_ref()
            .map(|m| m.address.clone())
            .unwrap_or_default();
        info!("Deleting mailbox {}...", address);

        let outcome = self
            .client
            .delete(self.url("/api/email"))
            .bearer_auth(token)
            .send()
            .await;

        let deleted = match outcome {
            Ok(response) => ensure_success(response).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };

        match deleted {
            Ok(()) => {
                info!("Mailbox {} deleted successfully", address);
                self.mailbox = None;
                true
            }
            Err(e) => {
                warn!("Error deleting mailbox {}: {:#}", address, e);
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "./mailbox_tests.rs"]
mod mailbox_tests;
