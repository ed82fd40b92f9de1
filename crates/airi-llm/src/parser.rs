//! Repair parser for model output.
//!
//! Small models often wrap their JSON in markdown fences, stop mid-string at
//! the token limit, or add prose around the object. [`parse`] runs an
//! ordered list of strategies and falls back to speaking the raw text, so it
//! always produces a response.

use std::sync::LazyLock;

use airi_core::{Intent, RoutedBy, StructuredResponse};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// Longest raw text spoken back when no JSON object can be recovered.
pub const FALLBACK_TEXT_MAX_CHARS: usize = 300;

/// Reply used when the model omits `text_response`.
pub const DEFAULT_TEXT_RESPONSE: &str = "Done.";

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*\s*").expect("Invalid fence regex"));

static FLAT_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("Invalid object regex"));

type JsonObject = Map<String, Value>;

// =============================================================================
// Strategies
// =============================================================================

/// One way of recovering a JSON object from cleaned model text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The text is already a JSON object.
    Direct,
    /// Close a string and any braces cut off by the token limit.
    RepairTruncation,
    /// The first `{...}` span without nested braces.
    FirstFlatObject,
}

impl Strategy {
    /// Evaluation order.
    pub const ORDER: [Strategy; 3] = [
        Strategy::Direct,
        Strategy::RepairTruncation,
        Strategy::FirstFlatObject,
    ];

    pub fn attempt(&self, cleaned: &str) -> Option<JsonObject> {
        match self {
            Strategy::Direct => parse_object(cleaned),
            Strategy::RepairTruncation => parse_object(&repair_truncation(cleaned)),
            Strategy::FirstFlatObject => FLAT_OBJECT
                .find(cleaned)
                .and_then(|m| parse_object(m.as_str())),
        }
    }
}

/// Turn raw model text into a response. Never fails.
pub fn parse(raw: &str) -> StructuredResponse {
    let cleaned = strip_fences(raw);

    for strategy in Strategy::ORDER {
        if let Some(object) = strategy.attempt(&cleaned) {
            debug!(?strategy, "Recovered JSON object from model output");
            return from_model_object(&object);
        }
    }

    debug!("No JSON object in model output, speaking raw text");
    spoken_fallback(&cleaned)
}

/// Remove markdown code fences (with any language tag) and trim.
pub fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.contains("```") {
        return trimmed.to_string();
    }
    FENCE.replace_all(trimmed, "").trim().to_string()
}

/// Close a value cut off mid-string, then close unmatched braces.
pub fn repair_truncation(text: &str) -> String {
    let mut fixed = text.to_string();
    if !fixed.ends_with('"') && !fixed.ends_with('}') {
        fixed.push('"');
    }
    let open = fixed.matches('{').count();
    let close = fixed.matches('}').count();
    for _ in close..open {
        fixed.push('}');
    }
    fixed
}

fn parse_object(text: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

// =============================================================================
// Building the response
// =============================================================================

/// Copy the non-null fields the model produced onto a fresh response.
///
/// Unknown or missing intents become `llm_response`. Fields of the wrong
/// type are skipped. `routed_by`, `latency_ms` and `error` are never taken
/// from the model.
pub fn from_model_object(object: &JsonObject) -> StructuredResponse {
    let intent = object
        .get("intent")
        .and_then(Value::as_str)
        .and_then(Intent::from_name)
        .unwrap_or(Intent::LlmResponse);

    let mut resp = StructuredResponse::new(intent, RoutedBy::Llm);
    if let Some(confidence) = object.get("confidence").and_then(Value::as_f64) {
        resp.confidence = confidence;
    }

    resp.app_name = text_field(object, "app_name");
    resp.app_package = text_field(object, "app_package");
    resp.phone_number = text_field(object, "phone_number");
    resp.contact_name = text_field(object, "contact_name");
    resp.message_body = text_field(object, "message_body");
    resp.email_to = text_field(object, "email_to");
    resp.email_subject = text_field(object, "email_subject");
    resp.alarm_time = text_field(object, "alarm_time");
    resp.timer_seconds = seconds_field(object, "timer_seconds");
    resp.reminder_text = text_field(object, "reminder_text");
    resp.reminder_time = text_field(object, "reminder_time");
    resp.query = text_field(object, "query");
    resp.location = text_field(object, "location");
    resp.setting_name = text_field(object, "setting_name");
    resp.setting_value = bool_field(object, "setting_value");
    resp.extra = object.get("extra").and_then(Value::as_object).cloned();

    resp.text_response = Some(
        text_field(object, "text_response")
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TEXT_RESPONSE.to_string()),
    );
    resp
}

fn spoken_fallback(cleaned: &str) -> StructuredResponse {
    let text: String = cleaned.chars().take(FALLBACK_TEXT_MAX_CHARS).collect();
    let text = if text.trim().is_empty() {
        DEFAULT_TEXT_RESPONSE.to_string()
    } else {
        text
    };
    StructuredResponse::new(Intent::LlmResponse, RoutedBy::Llm).with_text(text)
}

fn text_field(object: &JsonObject, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn seconds_field(object: &JsonObject, key: &str) -> Option<u64> {
    match object.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bool_field(object: &JsonObject, key: &str) -> Option<bool> {
    match object.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" => Some(true),
            "false" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert!(FENCE.is_match("```json\n{}"));
        assert!(FLAT_OBJECT.is_match(r#"say {"a":1} ok"#));
    }

    #[test]
    fn test_direct_object() {
        let resp = parse(r#"{"intent":"open_app","app_name":"whatsapp","app_package":"com.whatsapp","text_response":"Opening WhatsApp"}"#);
        assert_eq!(resp.intent, Intent::OpenApp);
        assert_eq!(resp.routed_by, RoutedBy::Llm);
        assert_eq!(resp.app_package.as_deref(), Some("com.whatsapp"));
        assert_eq!(resp.text_response.as_deref(), Some("Opening WhatsApp"));
    }

    #[test]
    fn test_round_trip_through_fenced_block() {
        let mut original = StructuredResponse::new(Intent::SetTimer, RoutedBy::Llm)
            .with_text("Timer set for five minutes");
        original.timer_seconds = Some(300);
        original.confidence = 0.9;
        original.extra = Some(
            serde_json::json!({"label": "pasta"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let json = serde_json::to_string_pretty(&original).unwrap();

        assert_eq!(parse(&json), original);
        assert_eq!(parse(&format!("```json\n{}\n```", json)), original);
        assert_eq!(parse(&format!("```\n{}\n```", json)), original);
    }

    #[test]
    fn test_truncated_string_is_repaired() {
        let resp = parse(r#"{"intent":"llm_response","text_response":"Hello how can I"#);
        assert_eq!(resp.intent, Intent::LlmResponse);
        assert_eq!(resp.text_response.as_deref(), Some("Hello how can I"));
        assert!(resp.text_response.unwrap().ends_with('I'));
    }

    #[test]
    fn test_repair_truncation_closes_braces() {
        assert_eq!(
            repair_truncation(r#"{"intent":"llm_response","text_response":"Hi"#),
            r#"{"intent":"llm_response","text_response":"Hi"}"#
        );
        assert_eq!(
            repair_truncation(r#"{"a":{"b":"c""#),
            r#"{"a":{"b":"c"}}"#
        );
        // Already balanced text only gains nothing.
        assert_eq!(repair_truncation(r#"{"a":"b"}"#), r#"{"a":"b"}"#);
    }

    #[test]
    fn test_object_inside_prose() {
        let raw = r#"Sure! Here is the JSON you asked for: {"intent":"web_search","query":"rust async","text_response":"Searching"} Let me know."#;
        let resp = parse(raw);
        assert_eq!(resp.intent, Intent::WebSearch);
        assert_eq!(resp.query.as_deref(), Some("rust async"));
    }

    #[test]
    fn test_plain_text_fallback() {
        let resp = parse("The capital of France is Paris.");
        assert_eq!(resp.intent, Intent::LlmResponse);
        assert_eq!(resp.routed_by, RoutedBy::Llm);
        assert_eq!(
            resp.text_response.as_deref(),
            Some("The capital of France is Paris.")
        );
        assert!(resp.app_name.is_none());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_plain_text_fallback_is_truncated_by_chars() {
        let long = "é".repeat(500);
        let resp = parse(&long);
        assert_eq!(
            resp.text_response.unwrap().chars().count(),
            FALLBACK_TEXT_MAX_CHARS
        );
    }

    #[test]
    fn test_empty_after_cleaning_uses_default() {
        let resp = parse("```\n```");
        assert_eq!(resp.text_response.as_deref(), Some(DEFAULT_TEXT_RESPONSE));
    }

    #[test]
    fn test_missing_text_response_defaults() {
        let resp = parse(r#"{"intent":"take_photo"}"#);
        assert_eq!(resp.intent, Intent::TakePhoto);
        assert_eq!(resp.text_response.as_deref(), Some("Done."));

        let resp = parse(r#"{"intent":"take_photo","text_response":"  "}"#);
        assert_eq!(resp.text_response.as_deref(), Some("Done."));
    }

    #[test]
    fn test_null_fields_are_not_copied() {
        let resp = parse(r#"{"intent":"make_call","contact_name":null,"text_response":"Calling"}"#);
        assert!(resp.contact_name.is_none());
    }

    #[test]
    fn test_unknown_intent_becomes_llm_response() {
        let resp = parse(r#"{"intent":"order_pizza","text_response":"I can't do that yet"}"#);
        assert_eq!(resp.intent, Intent::LlmResponse);
    }

    #[test]
    fn test_model_cannot_set_routing_metadata() {
        let resp = parse(
            r#"{"intent":"llm_response","text_response":"Hi","routed_by":"rule","latency_ms":5,"error":"x"}"#,
        );
        assert_eq!(resp.routed_by, RoutedBy::Llm);
        assert!(resp.latency_ms.is_none());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_lenient_field_types() {
        let resp = parse(
            r#"{"intent":"set_timer","timer_seconds":"120","phone_number":5551234,"setting_value":"on","text_response":"ok"}"#,
        );
        assert_eq!(resp.timer_seconds, Some(120));
        assert_eq!(resp.phone_number.as_deref(), Some("5551234"));
        assert_eq!(resp.setting_value, Some(true));

        let resp = parse(r#"{"intent":"set_timer","timer_seconds":[1],"text_response":"ok"}"#);
        assert!(resp.timer_seconds.is_none());
    }

    #[test]
    fn test_non_object_json_falls_through() {
        let resp = parse("42");
        assert_eq!(resp.intent, Intent::LlmResponse);
        assert_eq!(resp.text_response.as_deref(), Some("42"));
    }

    #[test]
    fn test_strategy_order() {
        assert_eq!(Strategy::Direct.attempt(r#"{"a":1"#), None);
        assert!(Strategy::RepairTruncation.attempt(r#"{"a":"1"#).is_some());
        assert!(Strategy::FirstFlatObject
            .attempt(r#"noise {"a":1} more {"b":2}"#)
            .is_some_and(|o| o.contains_key("a")));
    }
}
