use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AiriError, Result};

/// Inclusive character bounds for inbound request text.
pub const MIN_TEXT_CHARS: usize = 1;
pub const MAX_TEXT_CHARS: usize = 1000;

// =============================================================================
// Enums
// =============================================================================

/// The action category the assistant believes the user wants performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OpenApp,
    MakeCall,
    SendMessage,
    SendWhatsapp,
    SendEmail,
    SetAlarm,
    SetTimer,
    SetReminder,
    WebSearch,
    PlayMusic,
    GetWeather,
    GetNews,
    Navigate,
    TakePhoto,
    ToggleSetting,
    ReadNotifications,
    /// Free-form spoken reply with no device action.
    LlmResponse,
    /// Nothing actionable (e.g. an interim transcript).
    Unknown,
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 18] = [
        Intent::OpenApp,
        Intent::MakeCall,
        Intent::SendMessage,
        Intent::SendWhatsapp,
        Intent::SendEmail,
        Intent::SetAlarm,
        Intent::SetTimer,
        Intent::SetReminder,
        Intent::WebSearch,
        Intent::PlayMusic,
        Intent::GetWeather,
        Intent::GetNews,
        Intent::Navigate,
        Intent::TakePhoto,
        Intent::ToggleSetting,
        Intent::ReadNotifications,
        Intent::LlmResponse,
        Intent::Unknown,
    ];

    /// The wire name of this intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::OpenApp => "open_app",
            Intent::MakeCall => "make_call",
            Intent::SendMessage => "send_message",
            Intent::SendWhatsapp => "send_whatsapp",
            Intent::SendEmail => "send_email",
            Intent::SetAlarm => "set_alarm",
            Intent::SetTimer => "set_timer",
            Intent::SetReminder => "set_reminder",
            Intent::WebSearch => "web_search",
            Intent::PlayMusic => "play_music",
            Intent::GetWeather => "get_weather",
            Intent::GetNews => "get_news",
            Intent::Navigate => "navigate",
            Intent::TakePhoto => "take_photo",
            Intent::ToggleSetting => "toggle_setting",
            Intent::ReadNotifications => "read_notifications",
            Intent::LlmResponse => "llm_response",
            Intent::Unknown => "unknown",
        }
    }

    /// Look up an intent by its wire name (case-insensitive, surrounding
    /// whitespace ignored).
    pub fn from_name(name: &str) -> Option<Intent> {
        let name = name.trim();
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which component produced a response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutedBy {
    #[default]
    Rule,
    Llm,
}

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// One message in a session's history. Order within a session is
/// chronological and is replayed verbatim as prompt context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Structured response
// =============================================================================

fn default_confidence() -> f64 {
    1.0
}

/// The canonical result returned by every code path: rule router, LLM and
/// failure cases alike.
///
/// Payload fields are only meaningful for particular intents. All of them
/// serialize as `null` when absent so clients see a stable shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub intent: Intent,
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    // Apps
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub app_package: Option<String>,

    // Calls and messages
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub message_body: Option<String>,
    #[serde(default)]
    pub email_to: Option<String>,
    #[serde(default)]
    pub email_subject: Option<String>,

    // Time
    #[serde(default)]
    pub alarm_time: Option<String>,
    #[serde(default)]
    pub timer_seconds: Option<u64>,
    #[serde(default)]
    pub reminder_text: Option<String>,
    #[serde(default)]
    pub reminder_time: Option<String>,

    // Search, navigation, settings
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub setting_name: Option<String>,
    #[serde(default)]
    pub setting_value: Option<bool>,

    /// Spoken or displayed reply.
    #[serde(default)]
    pub text_response: Option<String>,
    #[serde(default)]
    pub routed_by: RoutedBy,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    /// Diagnostic code, set only on failure paths.
    #[serde(default)]
    pub error: Option<String>,
    /// Free-form payload for fields newer clients understand.
    #[serde(default)]
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

impl StructuredResponse {
    /// A response with the given intent and every optional field empty.
    pub fn new(intent: Intent, routed_by: RoutedBy) -> Self {
        Self {
            intent,
            confidence: 1.0,
            app_name: None,
            app_package: None,
            phone_number: None,
            contact_name: None,
            message_body: None,
            email_to: None,
            email_subject: None,
            alarm_time: None,
            timer_seconds: None,
            reminder_text: None,
            reminder_time: None,
            query: None,
            location: None,
            setting_name: None,
            setting_value: None,
            text_response: None,
            routed_by,
            latency_ms: None,
            error: None,
            extra: None,
        }
    }

    /// The response for an interim transcript: nothing to act on yet.
    pub fn partial() -> Self {
        Self::new(Intent::Unknown, RoutedBy::Rule)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_response = Some(text.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// The spoken reply, or an empty string when there is none.
    pub fn spoken_text(&self) -> &str {
        self.text_response.as_deref().unwrap_or("")
    }

    /// Serialize to the JSON form stored as assistant turn content.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// =============================================================================
// Inbound request
// =============================================================================

fn default_lang() -> String {
    "en".to_string()
}

/// Inbound request shared by the one-shot and streamed protocols.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Interim transcript flag; partial requests are not acted on.
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
}

impl AssistantRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            lang: default_lang(),
            partial: false,
            context: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Check the text length bounds (counted in characters).
    pub fn validate(&self) -> Result<()> {
        let chars = self.text.chars().count();
        if chars < MIN_TEXT_CHARS {
            return Err(AiriError::Validation("text must not be empty".to_string()));
        }
        if chars > MAX_TEXT_CHARS {
            return Err(AiriError::Validation(format!(
                "text is {} characters, maximum is {}",
                chars, MAX_TEXT_CHARS
            )));
        }
        Ok(())
    }

    /// The session id when one was supplied and is non-empty.
    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }
}
