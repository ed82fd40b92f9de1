//! Streamed protocol events.

use airi_core::StructuredResponse;
use serde::{Deserialize, Serialize};

/// One event of a streamed response, serialized with a `type` tag.
///
/// A stream is either a single `Done`, or `Thinking` followed by zero or
/// more `Token`s and exactly one `Done`. `Done` is always last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Thinking,
    Token { value: String },
    /// Every response field, flattened beside the tag.
    Done(StructuredResponse),
}

impl StreamEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done(_))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Split spoken text on single spaces, keeping the separator on every
/// word but the last. Concatenating the tokens restores `text` exactly.
pub fn word_tokens(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let words: Vec<&str> = text.split(' ').collect();
    let last = words.len() - 1;
    words
        .into_iter()
        .enumerate()
        .map(|(i, word)| {
            if i == last {
                word.to_string()
            } else {
                format!("{} ", word)
            }
        })
        .collect()
}
