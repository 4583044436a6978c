/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: extractor.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-03 14:22:05
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-06 11:17:33
 */

use crate::models::InboxMessage;
use log::{debug, error, info, warn};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Subject fragments that mark a confirmation email. The last entry is the product name.
pub const SUBJECT_KEYWORDS: &[&str] = &[
    "confirm",
    "verify",
    "activate",
    "welcome",
    "registration",
    "instruction",
    "account",
    "complete",
    "setup",
    "bolt",
];

/// Sender fragments that mark a confirmation email.
pub const SENDER_KEYWORDS: &[&str] = &["bolt", "stackblitz", "noreply", "welcome", "auth"];

/// URL fragments in priority order; earlier entries win regardless of position in the body.
pub const LINK_KEYWORDS: &[&str] = &["confirm", "verify", "activate", "validation", "account"];

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("static url pattern"));

/// Where a message body was found, in the order the extractor tries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// The whole message payload was a string.
    Plain(String),
    Html(String),
    Body(String),
    HtmlEmbedded(String),
    Text(String),
    Content(String),
    Intro(String),
    /// First other field whose value looks like it carries links.
    LinkBearing { key: String, value: String },
    /// Last resort: the whole object serialized.
    Serialized(String),
}

impl MessageBody {
    pub fn text(&self) -> &str {
        match self {
            MessageBody::Plain(s)
            | MessageBody::Html(s)
            | MessageBody::Body(s)
            | MessageBody::HtmlEmbedded(s)
            | MessageBody::Text(s)
            | MessageBody::Content(s)
            | MessageBody::Intro(s)
            | MessageBody::Serialized(s) => s,
            MessageBody::LinkBearing { value, .. } => value,
        }
    }

    /// Resolve the body of a raw provider payload.
    ///
    /// Returns `None` for payloads that are neither an object nor a string, or
    /// when the resolved text is empty.
    pub fn resolve(raw: &Value) -> Option<Self> {
        let body = match raw {
            Value::String(s) => MessageBody::Plain(s.clone()),
            Value::Object(map) => {
                let field = |key: &str| map.get(key).and_then(field_text);

                if let Some(s) = field("html") {
                    MessageBody::Html(s)
                } else if let Some(s) = field("body") {
                    MessageBody::Body(s)
                } else if let Some(s) = field("htmlEmbedded") {
                    MessageBody::HtmlEmbedded(s)
                } else if let Some(s) = field("text") {
                    MessageBody::Text(s)
                } else if let Some(s) = field("content") {
                    MessageBody::Content(s)
                } else if let Some(s) = field("intro") {
                    MessageBody::Intro(s)
                } else if let Some((key, value)) = map.iter().find_map(|(k, v)| {
                    v.as_str()
                        .filter(|s| looks_like_links(s))
                        .map(|s| (k.clone(), s.to_string()))
                }) {
                    MessageBody::LinkBearing { key, value }
                } else {
                    MessageBody::Serialized(raw.to_string())
                }
            }
            other => {
                error!("Email body in unrecognized format: {}", json_kind(other));
                return None;
            }
        };

        if body.text().is_empty() {
            return None;
        }
        Some(body)
    }

    fn describe(&self) -> String {
        match self {
            MessageBody::Plain(_) => "message received as string".to_string(),
            MessageBody::Html(_) => "html".to_string(),
            MessageBody::Body(_) => "body".to_string(),
            MessageBody::HtmlEmbedded(_) => "htmlEmbedded".to_string(),
            MessageBody::Text(_) => "text".to_string(),
            MessageBody::Content(_) => "content".to_string(),
            MessageBody::Intro(_) => "intro".to_string(),
            MessageBody::LinkBearing { key, .. } => format!("{} (appears to contain links)", key),
            MessageBody::Serialized(_) => "whole message serialized".to_string(),
        }
    }
}

// Non-empty strings count; arrays of strings are joined the way providers split html parts.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            let joined = parts.join(",");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn looks_like_links(s: &str) -> bool {
    s.contains("http") || s.contains("href") || s.contains("<a")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// All absolute URLs in `text`, in document order.
pub fn find_urls(text: &str) -> Vec<&str> {
    URL_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
}

/// Pick the most likely confirmation URL: keyword priority first, then document order.
pub fn select_confirmation_url<'a>(urls: &[&'a str]) -> Option<&'a str> {
    for keyword in LINK_KEYWORDS {
        if let Some(url) = urls
            .iter()
            .find(|url| url.to_lowercase().contains(keyword))
        {
            info!("Confirmation URL found with keyword \"{}\": {}", keyword, url);
            return Some(*url);
        }
    }

    let first = urls.first().copied();
    if let Some(url) = first {
        info!("No specific confirmation URL found. Using first URL: {}", url);
    }
    first
}

/// Extract the confirmation link from a message, or `None` when nothing usable is found.
pub fn extract_confirmation_link(message: &InboxMessage) -> Option<String> {
    let Some(body) = MessageBody::resolve(message.raw()) else {
        error!("Could not extract text from email body");
        return None;
    };
    debug!("Using email body from {}", body.describe());

    let urls = find_urls(body.text());
    info!("Found {} URLs in email body", urls.len());

    let link = select_confirmation_url(&urls).map(str::to_string);
    if link.is_none() {
        warn!("No URLs found in email body");
    }
    link
}

/// Whether subject or sender looks like an account confirmation email.
pub fn is_confirmation_message(message: &InboxMessage) -> bool {
    let subject = message.subject().unwrap_or_default().to_lowercase();
    let sender = message.sender().unwrap_or_default().to_lowercase();

    let by_subject = SUBJECT_KEYWORDS.iter().any(|k| subject.contains(k));
    let by_sender = SENDER_KEYWORDS.iter().any(|k| sender.contains(k));
    let is_confirmation = by_subject || by_sender;

    info!(
        "Checking email \"{}\": {}",
        message.identifier(),
        if is_confirmation {
            "Appears to be confirmation"
        } else {
            "Does not appear to be confirmation"
        }
    );
    is_confirmation
}

#[cfg(test)]
#[path = "./extractor_tests.rs"]
mod extractor_tests;
