//! Entity extraction from a matched command.
//!
//! Each function pulls one kind of value out of the utterance. They are
//! pure and never fail; a missing entity is `None`.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::Catalog;

static APP_AFTER_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:open|launch|start|run)\s+(\w[\w\s]*?)(?:\s+app)?$")
        .expect("Invalid app regex")
});

static CONTACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:call|message|text|whatsapp|ring|dial|ping)\s+(?:to\s+)?([A-Za-z][A-Za-z\s]{1,30}?)(?:\s+(?:and|please|now|on|via)|\.|$)",
    )
    .expect("Invalid contact regex")
});

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\b").expect("Invalid time regex")
});

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(hour|hr|minute|min|second|sec)").expect("Invalid duration regex")
});

/// Words that mark a toggle command as switching something on.
const ON_CUES: &[&str] = &["on", "enable", "switch on"];

/// App name and package.
///
/// Prefers the longest catalog name found in `lower`; otherwise takes the
/// words after an open/launch/start/run verb, with a trailing "app" dropped.
pub fn app(lower: &str, catalog: &Catalog) -> (Option<String>, Option<String>) {
    if let Some((name, package)) = catalog.find_app(lower) {
        return (Some(name.to_string()), Some(package.to_string()));
    }

    let name = APP_AFTER_VERB
        .captures(lower)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty());
    let package = name
        .as_deref()
        .and_then(|n| catalog.package_for(n))
        .map(str::to_string);
    (name, package)
}

/// Contact name between a call/message verb and the first terminator
/// ("and", "please", "now", "on", "via", a period or end of text).
pub fn contact(text: &str) -> Option<String> {
    CONTACT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// First clock time such as "7", "6:30" or "9 PM".
pub fn clock_time(text: &str) -> Option<String> {
    CLOCK_TIME
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Total seconds across every "<n> <unit>" in the text. `None` when no
/// duration is mentioned or the total is zero.
pub fn timer_seconds(text: &str) -> Option<u64> {
    let total = DURATION_PART
        .captures_iter(text)
        .filter_map(|caps| {
            let amount: u64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str().to_ascii_lowercase();
            let scale = if unit.starts_with('h') {
                3600
            } else if unit.starts_with('m') {
                60
            } else {
                1
            };
            Some(amount.saturating_mul(scale))
        })
        .fold(0u64, |acc, secs| acc.saturating_add(secs));

    (total > 0).then_some(total)
}

/// Text following the first trigger (in list order) found in the
/// utterance, trimmed of surrounding whitespace and `?.,`.
pub fn query_after(text: &str, triggers: &[&str]) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let (idx, trigger) = triggers
        .iter()
        .find_map(|trigger| lower.find(trigger).map(|idx| (idx, trigger)))?;
    let rest = text.get(idx + trigger.len()..)?;
    let trimmed = rest.trim_matches(|c: char| c.is_whitespace() || matches!(c, '?' | '.' | ','));
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Setting name and requested state. The state is `true` whenever an
/// on/enable cue appears anywhere in the text.
pub fn toggle(lower: &str, catalog: &Catalog) -> (Option<String>, bool) {
    let name = catalog.find_toggle(lower).map(str::to_string);
    let value = ON_CUES.iter().any(|cue| lower.contains(cue));
    (name, value)
}
