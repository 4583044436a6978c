/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: orchestrator.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-04 09:30:26
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-06 15:48:09
 */

use crate::config::{BackendConfig, trim_base_url};
use crate::error::ProvisionError;
use crate::models::{AccountCreationResult, AccountInfo, CreateAccountOptions};
use crate::retry::{RetryPolicy, is_cancellation, retry_with_backoff};
use log::{error, info, warn};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backend liveness endpoints, each with the payload it answers when online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessProbe {
    Status,
    Healthcheck,
    Ping,
}

impl LivenessProbe {
    /// Order in which probes are tried.
    pub const PRIORITY: [LivenessProbe; 3] = [
        LivenessProbe::Status,
        LivenessProbe::Healthcheck,
        LivenessProbe::Ping,
    ];

    pub fn path(self) -> &'static str {
        match self {
            LivenessProbe::Status => "/api/status",
            LivenessProbe::Healthcheck => "/api/healthcheck",
            LivenessProbe::Ping => "/ping",
        }
    }

    pub fn is_online(self, payload: &Value) -> bool {
        let field = |key: &str| payload.get(key).and_then(Value::as_str);
        match self {
            LivenessProbe::Status => field("status") == Some("online"),
            LivenessProbe::Healthcheck => field("status") == Some("ok"),
            LivenessProbe::Ping => field("status") == Some("ok") || field("ping") == Some("pong"),
        }
    }
}

/// Drives the backend side of a provisioning run.
pub struct Orchestrator {
    base_url: String,
    client: Client,
    policy: RetryPolicy,
}

impl Orchestrator {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let base_url = trim_base_url(&config.base_url);
        info!("API Base URL: {}", base_url);

        Ok(Self {
            base_url,
            client: builder.build()?,
            policy: config.retry_policy(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> anyhow::Result<Response> {
        let response = request.header(ACCEPT, "application/json").send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Status { status, body }.into());
        }
        Ok(response)
    }

    async fn get_json(&self, path: &str) -> anyhow::Result<Value> {
        let response = self.send(self.client.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    async fn probe(&self, probe: LivenessProbe) -> anyhow::Result<()> {
        let payload = self.get_json(probe.path()).await?;
        if probe.is_online(&payload) {
            Ok(())
        } else {
            Err(ProvisionError::Payload(format!(
                "{} answered {}",
                probe.path(),
                payload
            ))
            .into())
        }
    }

    /// `true` as soon as one probe, tried in priority order, reports online.
    pub async fn check_backend_status(&self, cancel: &CancellationToken) -> bool {
        info!("Checking server status...");

        for probe in LivenessProbe::PRIORITY {
            match retry_with_backoff(&self.policy, cancel, || self.probe(probe)).await {
                Ok(()) => {
                    info!("Server is online ({})", probe.path());
                    return true;
                }
                Err(e) if is_cancellation(&e) => {
                    warn!("Server status check cancelled");
                    return false;
                }
                Err(e) => warn!("Status check via {} failed: {:#}", probe.path(), e),
            }
        }

        error!("All status checks failed");
        false
    }

    /// Diagnostic call; `true` only for a `{"success": true}` answer.
    pub async fn test_cors(&self, cancel: &CancellationToken) -> bool {
        info!("Testing CORS configuration...");

        let passed = match retry_with_backoff(&self.policy, cancel, || {
            self.get_json("/api/cors-test")
        })
        .await
        {
            Ok(payload) => payload.get("success") == Some(&Value::Bool(true)),
            Err(e) => {
                warn!("CORS request failed: {:#}", e);
                false
            }
        };

        if passed {
            info!("CORS test passed");
        } else {
            error!("CORS test failed");
        }
        passed
    }

    async fn request_account(
        &self,
        options: &CreateAccountOptions,
        cancel: &CancellationToken,
    ) -> anyhow::Result<AccountInfo> {
        let response = retry_with_backoff(&self.policy, cancel, || {
            self.send(
                self.client
                    .post(self.url("/api/create-account"))
                    .json(options),
            )
        })
        .await?;
        let payload: Value = response.json().await?;

        let account = (payload.get("success") == Some(&Value::Bool(true)))
            .then(|| payload.get("accountInfo"))
            .flatten()
            .and_then(AccountInfo::from_payload);

        match account {
            Some(account) => Ok(account),
            None => {
                let reason = payload
                    .get("error")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or("Failed to create account");
                Err(anyhow::anyhow!(reason.to_string()))
            }
        }
    }

    /// Ask the backend for a new account. Every failure ends up in the result's `error`.
    pub async fn create_and_confirm_account(
        &self,
        options: &CreateAccountOptions,
        cancel: &CancellationToken,
    ) -> AccountCreationResult {
        info!("Creating new account...");

        match self.request_account(options, cancel).await {
            Ok(account) => {
                info!("Account created successfully: {}", account.email);
                AccountCreationResult::created(account)
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!("Account creation failed: {}", reason);
                AccountCreationResult::failed(reason)
            }
        }
    }
}

#[cfg(test)]
#[path = "./orchestrator_tests.rs"]
mod orchestrator_tests;
