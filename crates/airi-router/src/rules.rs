//! The rule table.
//!
//! Rules are plain data: trigger phrases, disqualifying phrases, a priority,
//! which extractor fills the payload, and a reply template. The table is
//! built once, adjusted from configuration, then stably sorted by
//! descending priority so ties keep their definition order.

use airi_core::config::RuleOverride;
use airi_core::{Intent, RoutedBy, StructuredResponse};
use tracing::warn;

use crate::catalog::Catalog;
use crate::extract;

const LOCATION_TRIGGERS: &[&str] = &[
    "navigate to",
    "directions to",
    "take me to",
    "route to",
    "how to reach",
];
const WEATHER_TRIGGERS: &[&str] = &["weather in", "weather for", "weather at"];
const SEARCH_TRIGGERS: &[&str] = &["search for", "google", "search", "look up", "find me", "browse"];
const MUSIC_TRIGGERS: &[&str] = &["play "];

/// Location reported for weather requests that do not name a place.
pub const CURRENT_LOCATION: &str = "current location";

/// Which entity extractor fills a rule's payload fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    None,
    App,
    Contact,
    AlarmTime,
    TimerDuration,
    Reminder,
    Location,
    WeatherQuery,
    SearchQuery,
    MusicQuery,
    Toggle,
}

impl Extractor {
    /// Populate `resp` from the original-case `text` and its lowercase form.
    pub fn apply(&self, text: &str, lower: &str, catalog: &Catalog, resp: &mut StructuredResponse) {
        match self {
            Extractor::None => {}
            Extractor::App => {
                let (name, package) = extract::app(lower, catalog);
                resp.app_name = name;
                resp.app_package = package;
            }
            Extractor::Contact => resp.contact_name = extract::contact(text),
            Extractor::AlarmTime => resp.alarm_time = extract::clock_time(text),
            Extractor::TimerDuration => resp.timer_seconds = extract::timer_seconds(text),
            Extractor::Reminder => {
                resp.reminder_text = Some(text.to_string());
                resp.reminder_time = extract::clock_time(text);
            }
            Extractor::Location => resp.location = extract::query_after(text, LOCATION_TRIGGERS),
            Extractor::WeatherQuery => {
                resp.query = Some(
                    extract::query_after(text, WEATHER_TRIGGERS)
                        .unwrap_or_else(|| CURRENT_LOCATION.to_string()),
                );
            }
            Extractor::SearchQuery => resp.query = extract::query_after(text, SEARCH_TRIGGERS),
            Extractor::MusicQuery => resp.query = extract::query_after(text, MUSIC_TRIGGERS),
            Extractor::Toggle => {
                let (name, value) = extract::toggle(lower, catalog);
                resp.setting_name = name;
                resp.setting_value = Some(value);
            }
        }
    }
}

/// One routing rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub intent: Intent,
    /// Any-of trigger phrases, lowercase.
    pub keywords: Vec<String>,
    /// None-of phrases; any hit disqualifies the rule.
    pub negative_keywords: Vec<String>,
    pub extractor: Extractor,
    pub priority: i32,
    /// Reply text. `{field|fallback}` is replaced by the extracted field,
    /// or by `fallback` when the field is empty.
    pub reply: String,
}

impl Rule {
    fn new(
        name: &str,
        intent: Intent,
        keywords: &[&str],
        negative_keywords: &[&str],
        extractor: Extractor,
        priority: i32,
        reply: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            intent,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            negative_keywords: negative_keywords.iter().map(|k| k.to_string()).collect(),
            extractor,
            priority,
            reply: reply.to_string(),
        }
    }

    /// Whether this rule claims the lowercased utterance.
    pub fn matches(&self, lower: &str) -> bool {
        if self
            .negative_keywords
            .iter()
            .any(|neg| lower.contains(neg.as_str()))
        {
            return false;
        }
        self.keywords.iter().any(|kw| lower.contains(kw.as_str()))
    }

    /// Build the response for an utterance this rule matched.
    pub fn respond(&self, text: &str, lower: &str, catalog: &Catalog) -> StructuredResponse {
        let mut resp = StructuredResponse::new(self.intent, RoutedBy::Rule);
        self.extractor.apply(text, lower, catalog, &mut resp);
        resp.text_response = Some(render_reply(&self.reply, &resp));
        resp
    }

    fn apply_override(&mut self, ov: &RuleOverride) {
        if let Some(keywords) = &ov.keywords {
            self.keywords = normalize(keywords);
        }
        if let Some(negative) = &ov.negative_keywords {
            self.negative_keywords = normalize(negative);
        }
        if let Some(priority) = ov.priority {
            self.priority = priority;
        }
    }
}

fn normalize(phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.trim().is_empty())
        .collect()
}

/// The built-in rules in definition order.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "open_app",
            Intent::OpenApp,
            &["open ", "launch ", "start ", "run "],
            &["search", "look up", "find", "timer", "camera"],
            Extractor::App,
            10,
            "Opening {app_name|app}",
        ),
        Rule::new(
            "make_call",
            Intent::MakeCall,
            &["call ", "ring ", "dial ", "phone "],
            &["reminder", "schedule", "whatsapp call"],
            Extractor::Contact,
            9,
            "Calling {contact_name|contact}",
        ),
        Rule::new(
            "send_whatsapp",
            Intent::SendWhatsapp,
            &["whatsapp ", "send whatsapp", "message on whatsapp"],
            &[],
            Extractor::Contact,
            11,
            "Opening WhatsApp",
        ),
        Rule::new(
            "send_message",
            Intent::SendMessage,
            &["send message", "text message", "sms ", "send sms"],
            &[],
            Extractor::Contact,
            8,
            "Sending message to {contact_name|contact}",
        ),
        Rule::new(
            "send_email",
            Intent::SendEmail,
            &["send email", "compose email", "email to", "send mail"],
            &[],
            Extractor::Contact,
            8,
            "Opening email composer",
        ),
        Rule::new(
            "set_alarm",
            Intent::SetAlarm,
            &["set alarm", "wake me", "alarm at", "alarm for"],
            &[],
            Extractor::AlarmTime,
            9,
            "Setting alarm for {alarm_time|specified time}",
        ),
        Rule::new(
            "set_timer",
            Intent::SetTimer,
            &["set timer", "start timer", "timer for", "countdown"],
            &[],
            Extractor::TimerDuration,
            9,
            "Timer started",
        ),
        Rule::new(
            "set_reminder",
            Intent::SetReminder,
            &["remind me", "set reminder", "reminder to", "don't let me forget"],
            &[],
            Extractor::Reminder,
            8,
            "Reminder set",
        ),
        Rule::new(
            "navigate",
            Intent::Navigate,
            &["navigate to", "directions to", "take me to", "how to reach", "route to"],
            &[],
            Extractor::Location,
            9,
            "Opening navigation",
        ),
        Rule::new(
            "get_weather",
            Intent::GetWeather,
            &["weather", "temperature", "forecast", "rain today", "will it rain"],
            &[],
            Extractor::WeatherQuery,
            7,
            "Fetching weather",
        ),
        Rule::new(
            "web_search",
            Intent::WebSearch,
            &["search for", "google ", "search ", "look up", "find me", "browse"],
            &[],
            Extractor::SearchQuery,
            6,
            "Searching the web",
        ),
        Rule::new(
            "play_music",
            Intent::PlayMusic,
            &[
                "play music",
                "play song",
                "play ",
                "pause music",
                "next song",
                "previous song",
                "stop music",
            ],
            &[],
            Extractor::MusicQuery,
            7,
            "Playing music",
        ),
        Rule::new(
            "toggle_setting",
            Intent::ToggleSetting,
            &[
                "turn on",
                "turn off",
                "enable ",
                "disable ",
                "toggle ",
                "switch on",
                "switch off",
            ],
            &[],
            Extractor::Toggle,
            8,
            "Toggling {setting_name|setting}",
        ),
        Rule::new(
            "take_photo",
            Intent::TakePhoto,
            &[
                "take photo",
                "take a photo",
                "take picture",
                "take a picture",
                "take selfie",
                "take a selfie",
                "open camera",
                "click photo",
            ],
            &[],
            Extractor::None,
            9,
            "Opening camera",
        ),
        Rule::new(
            "read_notifications",
            Intent::ReadNotifications,
            &[
                "read notifications",
                "read my notifications",
                "show notifications",
                "check my notifications",
                "what are my notifications",
                "any messages",
            ],
            &[],
            Extractor::None,
            7,
            "Reading your notifications",
        ),
    ]
}

/// Apply overrides by rule name, then stable-sort by descending priority.
pub fn build_table(mut rules: Vec<Rule>, overrides: &[RuleOverride]) -> Vec<Rule> {
    for ov in overrides {
        match rules.iter_mut().find(|r| r.name == ov.name) {
            Some(rule) => rule.apply_override(ov),
            None => warn!(rule = %ov.name, "Ignoring override for unknown rule"),
        }
    }
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    rules
}

/// Fill `{field|fallback}` placeholders from the response payload.
pub fn render_reply(template: &str, resp: &StructuredResponse) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let placeholder = &rest[start + 1..start + len];
        let (field, fallback) = placeholder.split_once('|').unwrap_or((placeholder, ""));
        match payload_text(resp, field.trim()) {
            Some(value) if !value.is_empty() => out.push_str(&value),
            _ => out.push_str(fallback),
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

fn payload_text(resp: &StructuredResponse, field: &str) -> Option<String> {
    match field {
        "app_name" => resp.app_name.clone(),
        "contact_name" => resp.contact_name.clone(),
        "alarm_time" => resp.alarm_time.clone(),
        "reminder_time" => resp.reminder_time.clone(),
        "query" => resp.query.clone(),
        "location" => resp.location.clone(),
        "setting_name" => resp.setting_name.clone(),
        "timer_seconds" => resp.timer_seconds.map(|s| s.to_string()),
        _ => None,
    }
}
