use crate::extractor::{
    MessageBody, extract_confirmation_link, find_urls, is_confirmation_message,
    select_confirmation_url,
};
use crate::models::InboxMessage;
use serde_json::json;

fn message(raw: serde_json::Value) -> InboxMessage {
    InboxMessage::new(raw)
}

#[test]
fn test_anchor_in_body_field() {
    let msg = message(json!({
        "body": "Please <a href='http://x.test/confirm?t=1'>confirm</a> your account"
    }));

    assert_eq!(
        extract_confirmation_link(&msg).as_deref(),
        Some("http://x.test/confirm?t=1")
    );
}

#[test]
fn test_keyword_priority_beats_document_order() {
    let msg = message(json!({
        "html": "<p>https://x.test/account/settings</p><p>https://x.test/verify/abc</p>"
    }));

    assert_eq!(
        extract_confirmation_link(&msg).as_deref(),
        Some("https://x.test/verify/abc")
    );
}

#[test]
fn test_keyword_match_is_case_insensitive() {
    let urls = ["https://x.test/home", "https://x.test/CONFIRM?id=9"];
    assert_eq!(
        select_confirmation_url(&urls),
        Some("https://x.test/CONFIRM?id=9")
    );
}

#[test]
fn test_first_url_when_no_keyword_matches() {
    let msg = message(json!({
        "text": "Visit https://x.test/home or https://x.test/help"
    }));

    assert_eq!(
        extract_confirmation_link(&msg).as_deref(),
        Some("https://x.test/home")
    );
}

#[test]
fn test_no_url_returns_none() {
    let msg = message(json!({ "text": "Your code is 123456, no links here." }));
    assert_eq!(extract_confirmation_link(&msg), None);
}

#[test]
fn test_unrecognized_payload_returns_none() {
    assert_eq!(extract_confirmation_link(&message(json!(42))), None);
    assert_eq!(extract_confirmation_link(&message(json!(null))), None);
    assert_eq!(extract_confirmation_link(&message(json!(""))), None);
}

#[test]
fn test_plain_string_payload() {
    let msg = message(json!("Activate: https://x.test/activate/1"));
    assert_eq!(
        MessageBody::resolve(msg.raw()),
        Some(MessageBody::Plain(
            "Activate: https://x.test/activate/1".to_string()
        ))
    );
    assert_eq!(
        extract_confirmation_link(&msg).as_deref(),
        Some("https://x.test/activate/1")
    );
}

#[test]
fn test_html_takes_priority_over_every_other_field() {
    let raw = json!({
        "intro": "https://x.test/intro",
        "text": "https://x.test/text",
        "body": "https://x.test/body",
        "html": "https://x.test/html"
    });
    assert_eq!(
        MessageBody::resolve(&raw),
        Some(MessageBody::Html("https://x.test/html".to_string()))
    );
}

#[test]
fn test_body_before_html_embedded() {
    let raw = json!({
        "htmlEmbedded": "https://x.test/embedded",
        "body": "https://x.test/body"
    });
    assert_eq!(
        MessageBody::resolve(&raw),
        Some(MessageBody::Body("https://x.test/body".to_string()))
    );
}

#[test]
fn test_html_embedded_branch() {
    let raw = json!({
        "htmlEmbedded": "<a href=\"https://x.test/validation/7\">go</a>",
        "text": "https://x.test/text"
    });
    assert_eq!(
        MessageBody::resolve(&raw),
        Some(MessageBody::HtmlEmbedded(
            "<a href=\"https://x.test/validation/7\">go</a>".to_string()
        ))
    );
    assert_eq!(
        extract_confirmation_link(&message(raw)).as_deref(),
        Some("https://x.test/validation/7")
    );
}

#[test]
fn test_text_branch() {
    let raw = json!({ "text": "t https://x.test/t", "content": "https://x.test/c" });
    assert_eq!(
        MessageBody::resolve(&raw),
        Some(MessageBody::Text("t https://x.test/t".to_string()))
    );
}

#[test]
fn test_content_branch() {
    let raw = json!({ "content": "https://x.test/c", "intro": "https://x.test/i" });
    assert_eq!(
        MessageBody::resolve(&raw),
        Some(MessageBody::Content("https://x.test/c".to_string()))
    );
}

#[test]
fn test_intro_branch() {
    let raw = json!({ "subject": "hi", "intro": "https://x.test/i" });
    assert_eq!(
        MessageBody::resolve(&raw),
        Some(MessageBody::Intro("https://x.test/i".to_string()))
    );
}

#[test]
fn test_empty_and_non_string_fields_are_skipped() {
    let raw = json!({
        "html": "",
        "body": false,
        "htmlEmbedded": null,
        "text": { "nested": true },
        "content": "https://x.test/c"
    });
    assert_eq!(
        MessageBody::resolve(&raw),
        Some(MessageBody::Content("https://x.test/c".to_string()))
    );
}

#[test]
fn test_html_parts_array_is_joined() {
    let raw = json!({ "html": ["<p>hello</p>", "<a href=\"https://x.test/confirm\">x</a>"] });
    let body = MessageBody::resolve(&raw).unwrap();
    assert!(matches!(body, MessageBody::Html(_)));
    assert_eq!(
        extract_confirmation_link(&message(raw)).as_deref(),
        Some("https://x.test/confirm")
    );
}

#[test]
fn test_link_bearing_field_in_key_order() {
    let raw = json!({
        "subject": "Hello",
        "notes": "nothing to see",
        "raw_source": "<a href=\"https://x.test/verify?k=1\">verify</a>",
        "footer": "https://x.test/unsubscribe"
    });
    assert_eq!(
        MessageBody::resolve(&raw),
        Some(MessageBody::LinkBearing {
            key: "raw_source".to_string(),
            value: "<a href=\"https://x.test/verify?k=1\">verify</a>".to_string(),
        })
    );
}

#[test]
fn test_serialized_fallback_finds_nested_links() {
    let raw = json!({
        "id": 7,
        "payload": { "parts": ["see https://x.test/activate/77 now"] }
    });

    let body = MessageBody::resolve(&raw).unwrap();
    assert!(matches!(body, MessageBody::Serialized(_)));
    assert_eq!(
        extract_confirmation_link(&message(raw)).as_deref(),
        Some("https://x.test/activate/77")
    );
}

#[test]
fn test_find_urls_stops_at_delimiters() {
    let text = r#"<a href="https://a.test/x?y=1">a</a> 'http://b.test/z' <https://c.test>"#;
    assert_eq!(
        find_urls(text),
        vec!["https://a.test/x?y=1", "http://b.test/z", "https://c.test"]
    );
}

#[test]
fn test_confirmation_by_subject_only() {
    let msg = message(json!({ "subject": "Welcome to Bolt", "from": "someone@else.test" }));
    assert!(is_confirmation_message(&msg));
}

#[test]
fn test_confirmation_by_sender_only() {
    let msg = message(json!({ "subject": "Hello there", "from": "noreply@anything" }));
    assert!(is_confirmation_message(&msg));
}

#[test]
fn test_confirmation_sender_object() {
    let msg = message(json!({
        "subject": "Newsletter",
        "from": { "address": "Auth@Service.test", "name": "Service" }
    }));
    assert!(is_confirmation_message(&msg));
}

#[test]
fn test_not_confirmation() {
    let msg = message(json!({ "subject": "Weekly digest", "from": "news@shop.test" }));
    assert!(!is_confirmation_message(&msg));
    assert!(!is_confirmation_message(&message(json!({}))));
}
