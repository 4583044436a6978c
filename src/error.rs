/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: error.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-02 10:12:41
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-04 18:20:07
 */

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failures the pipeline distinguishes. Everything else travels as `anyhow::Error`.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A mailbox-scoped call was made before a mailbox (and its token) existed.
    #[error("mailbox must be created before calling {0}")]
    MissingAccessToken(&'static str),
    /// The shared cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
    /// A single attempt exceeded its configured time limit.
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
    /// Remote returned a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// Response decoded but lacked the expected fields.
    #[error("unexpected payload: {0}")]
    Payload(String),
}
