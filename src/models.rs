//! Data carried through the provisioning pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A disposable mailbox owned by one provider client for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub address: String,
    pub secret: String,
    pub access_token: String,
}

/// An inbox message exactly as the provider returned it.
///
/// Providers disagree on field names, so the raw JSON is kept and the few
/// fields the pipeline needs are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InboxMessage {
    raw: Value,
}

impl InboxMessage {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Provider message id; numeric ids are rendered as strings.
    pub fn id(&self) -> Option<String> {
        match self.raw.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.raw.get("subject").and_then(Value::as_str)
    }

    /// Sender from `from` (plain or `{address}`), falling back to `sender`.
    pub fn sender(&self) -> Option<&str> {
        let from = match self.raw.get("from") {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Object(map)) => map.get("address").and_then(Value::as_str),
            _ => None,
        };
        from.or_else(|| self.raw.get("sender").and_then(Value::as_str))
    }

    /// Label used in log lines.
    pub fn identifier(&self) -> &str {
        self.subject()
            .filter(|s| !s.is_empty())
            .or_else(|| self.raw.get("h_mail").and_then(Value::as_str))
            .unwrap_or("No identifier")
    }
}

/// Credentials the backend reports for a created account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirmed: bool,
}

impl AccountInfo {
    /// Read whatever the backend put in `accountInfo`.
    ///
    /// Any object is accepted: missing or mistyped fields become empty strings
    /// and `confirmed` is only true for a literal `true`.
    pub fn from_payload(info: &Value) -> Option<Self> {
        let map = info.as_object()?;
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Some(Self {
            email: text("email"),
            username: text("username"),
            password: text("password"),
            confirmed: map
                .get("confirmed")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

/// Outcome of one account creation run, handed to whoever persists accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountCreationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccountCreationResult {
    pub fn created(account: AccountInfo) -> Self {
        Self {
            success: true,
            account: Some(account),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            account: None,
            error: Some(error.into()),
        }
    }
}

/// Optional desired credentials for account creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateAccountOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Terminal state of the mailbox confirmation flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    NoMessage,
    NoConfirmationMessage { messages_seen: usize },
    LinkNotFound { subject: String },
    Link { subject: String, url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationReport {
    pub address: String,
    #[serde(flatten)]
    pub outcome: ConfirmationOutcome,
}
