use super::*;
use crate::model::types::{BlockThreshold, HarmCategory};

fn make_response(parts: serde_json::Value) -> String {
    serde_json::json!({
        "candidates": [
            { "content": { "role": "model", "parts": parts }, "finishReason": "STOP" }
        ],
        "modelVersion": "gemini-2.0-flash-exp"
    })
    .to_string()
}

#[test]
fn body_preserves_part_order_and_modalities() {
    let parts = vec![
        Part::Media { mime: "image/png".into(), data: "AAAA".into() },
        Part::Media { mime: "image/jpeg".into(), data: "BBBB".into() },
        Part::text("do it"),
    ];
    let body = serde_json::to_value(build_body(&parts, &[])).unwrap();

    let sent = &body["contents"][0]["parts"];
    assert_eq!(sent[0]["inline_data"]["mime_type"], "image/png");
    assert_eq!(sent[0]["inline_data"]["data"], "AAAA");
    assert_eq!(sent[1]["inline_data"]["mime_type"], "image/jpeg");
    assert_eq!(sent[2]["text"], "do it");
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(body["generationConfig"]["responseModalities"], serde_json::json!(["TEXT", "IMAGE"]));
    assert!(body.get("safetySettings").is_none());
}

#[test]
fn body_includes_safety_settings_when_present() {
    let safety = [SafetySetting { category: HarmCategory::DangerousContent, threshold: BlockThreshold::None }];
    let body = serde_json::to_value(build_body(&[Part::text("x")], &safety)).unwrap();
    assert_eq!(body["safetySettings"][0]["category"], "HARM_CATEGORY_DANGEROUS_CONTENT");
    assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_NONE");
}

#[test]
fn parse_image_and_text_response() {
    let json = make_response(serde_json::json!([
        { "text": "Here is your edit." },
        { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
    ]));
    let resp = parse_response(&json, "fallback").unwrap();
    let image = resp.image.unwrap();
    assert_eq!(image.mime(), "image/png");
    assert_eq!(image.decoded_len(), 8);
    assert_eq!(resp.text.as_deref(), Some("Here is your edit."));
    assert_eq!(resp.model, "gemini-2.0-flash-exp");
}

#[test]
fn parse_accepts_snake_case_inline_data() {
    let json = make_response(serde_json::json!([
        { "inline_data": { "mime_type": "image/jpeg", "data": "iVBORw0KGgo=" } }
    ]));
    let resp = parse_response(&json, "m").unwrap();
    assert_eq!(resp.image.unwrap().mime(), "image/jpeg");
}

#[test]
fn parse_takes_first_image_only() {
    let json = make_response(serde_json::json!([
        { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } },
        { "inlineData": { "mimeType": "image/webp", "data": "iVBORw0KGgo=" } }
    ]));
    let resp = parse_response(&json, "m").unwrap();
    assert_eq!(resp.image.unwrap().mime(), "image/png");
}

#[test]
fn parse_text_only_response_has_no_image() {
    let json = make_response(serde_json::json!([{ "text": "I can't do that." }]));
    let resp = parse_response(&json, "m").unwrap();
    assert!(resp.image.is_none());
    assert_eq!(resp.text.as_deref(), Some("I can't do that."));
}

#[test]
fn parse_blocked_response_without_candidates() {
    let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } }).to_string();
    let resp = parse_response(&json, "requested").unwrap();
    assert!(resp.image.is_none());
    assert!(resp.text.is_none());
    assert_eq!(resp.model, "requested");
}

#[test]
fn parse_invalid_json() {
    let err = parse_response("not json", "m").unwrap_err();
    assert!(matches!(err, ModelError::ApiParse(_)));
}

#[test]
fn parse_invalid_inline_payload() {
    let json = make_response(serde_json::json!([
        { "inlineData": { "mimeType": "image/png", "data": "@@@" } }
    ]));
    let err = parse_response(&json, "m").unwrap_err();
    assert!(matches!(err, ModelError::ApiParse(ref msg) if msg.contains("inline image")));
}
