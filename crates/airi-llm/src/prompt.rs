//! Prompt construction.

use airi_core::ConversationTurn;
use serde::Serialize;

/// Fixed system instruction. It is never trimmed; only history is bounded.
pub const SYSTEM_PROMPT: &str = r#"You are AIRI Alex, a voice assistant running on the user's phone.
Answer with exactly one JSON object and nothing else.

Always include:
- "intent": one of open_app, make_call, send_message, send_whatsapp, send_email, set_alarm, set_timer, set_reminder, web_search, play_music, get_weather, get_news, navigate, take_photo, toggle_setting, read_notifications, llm_response
- "text_response": what to say out loud, at most 15 words

Add only the fields the intent needs: app_name, app_package, phone_number, contact_name, message_body, email_to, email_subject, alarm_time, timer_seconds (integer), reminder_text, reminder_time, query, location, setting_name, setting_value (true or false).
Use llm_response for questions, chit-chat and anything that is not a phone action.

Examples:
User: what is two plus two
{"intent":"llm_response","text_response":"Two plus two is four."}
User: open whatsapp
{"intent":"open_app","app_name":"whatsapp","app_package":"com.whatsapp","text_response":"Opening WhatsApp"}
User: call mom
{"intent":"make_call","contact_name":"Mom","text_response":"Calling Mom"}
User: set a timer for five minutes
{"intent":"set_timer","timer_seconds":300,"text_response":"Timer set for five minutes"}
User: look up the latest cricket score
{"intent":"web_search","query":"latest cricket score","text_response":"Searching for the latest cricket score"}

Reply with the JSON object only. Begin with { and end with }."#;

/// One chat message in the upstream wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: turn.content.clone(),
        }
    }
}

/// System instruction, then at most `max_history` of the most recent turns
/// in chronological order, then the new user message.
pub fn build_messages(
    system: &str,
    history: &[ConversationTurn],
    text: &str,
    max_history: usize,
) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(max_history);
    let recent = &history[start..];

    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(recent.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(text));
    messages
}
