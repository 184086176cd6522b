//! Chat transcript for an editor session.
//!
//! The log is bounded: it keeps the newest [`MAX_CHAT_MESSAGES`] messages, and
//! only the newest [`MAX_CHAT_IMAGES`] image-bearing messages keep their image.
//! Older entries keep their text. The canvas history holds the images that matter.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dispatch::Tool;
use crate::image::ImageSource;

pub const WELCOME_MESSAGE: &str = "Welcome to ImagiGenius! Select a tool and describe your edits. \
     The \"Add/Remove Object\" tool can use an optional reference image to guide the AI.";

pub const MAX_CHAT_MESSAGES: usize = 100;
pub const MAX_CHAT_IMAGES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<Tool>,
    pub timestamp_ms: i64,
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    /// A fresh log seeded with the system welcome message.
    #[must_use]
    pub fn new() -> Self {
        let mut log = Self { messages: Vec::new() };
        log.push_system(WELCOME_MESSAGE);
        log
    }

    pub fn push_user(&mut self, text: impl Into<String>, tool: Tool) -> &ChatMessage {
        self.push(Sender::User, Some(text.into()), None, Some(tool))
    }

    pub fn push_ai(&mut self, text: impl Into<String>, image: Option<ImageSource>) -> &ChatMessage {
        self.push(Sender::Ai, Some(text.into()), image, None)
    }

    pub fn push_system(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.push(Sender::System, Some(text.into()), None, None)
    }

    fn push(
        &mut self,
        sender: Sender,
        text: Option<String>,
        image: Option<ImageSource>,
        tool: Option<Tool>,
    ) -> &ChatMessage {
        self.messages.push(ChatMessage { id: Uuid::new_v4(), sender, text, image, tool, timestamp_ms: now_ms() });
        self.trim();
        let index = self.messages.len() - 1;
        &self.messages[index]
    }

    fn trim(&mut self) {
        if self.messages.len() > MAX_CHAT_MESSAGES {
            let excess = self.messages.len() - MAX_CHAT_MESSAGES;
            self.messages.drain(..excess);
        }
        self.messages
            .iter_mut()
            .rev()
            .filter(|m| m.image.is_some())
            .skip(MAX_CHAT_IMAGES)
            .for_each(|m| m.image = None);
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages appended after `id`. An unknown id yields the whole log so a
    /// client with a stale cursor resynchronizes.
    #[must_use]
    pub fn since(&self, id: Uuid) -> &[ChatMessage] {
        match self.messages.iter().position(|m| m.id == id) {
            Some(pos) => &self.messages[pos + 1..],
            None => &self.messages,
        }
    }

    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_log_starts_with_welcome() {
        let log = ChatLog::new();
        assert_eq!(log.len(), 1);
        let first = &log.messages()[0];
        assert_eq!(first.sender, Sender::System);
        assert_eq!(first.text.as_deref(), Some(WELCOME_MESSAGE));
    }

    #[test]
    fn push_preserves_order_and_fields() {
        let mut log = ChatLog::new();
        log.push_user("make it sunset", Tool::Background);
        log.push_ai("Background applied successfully!", Some(ImageSource::placeholder()));
        log.push_system("Error: boom");

        let senders: Vec<Sender> = log.messages().iter().map(|m| m.sender).collect();
        assert_eq!(senders, vec![Sender::System, Sender::User, Sender::Ai, Sender::System]);
        assert_eq!(log.messages()[1].tool, Some(Tool::Background));
        assert!(log.messages()[2].image.is_some());
        assert_eq!(log.last().and_then(|m| m.text.as_deref()), Some("Error: boom"));
    }

    #[test]
    fn since_returns_messages_after_cursor() {
        let mut log = ChatLog::new();
        let cursor = log.push_user("one", Tool::General).id;
        log.push_ai("two", None);
        log.push_system("three");

        let tail = log.since(cursor);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text.as_deref(), Some("two"));
    }

    #[test]
    fn since_unknown_cursor_returns_everything() {
        let mut log = ChatLog::new();
        log.push_user("one", Tool::General);
        assert_eq!(log.since(Uuid::new_v4()).len(), 2);
    }

    #[test]
    fn transcript_keeps_newest_messages() {
        let mut log = ChatLog::new();
        for i in 0..MAX_CHAT_MESSAGES + 5 {
            log.push_user(format!("msg {i}"), Tool::General);
        }
        assert_eq!(log.len(), MAX_CHAT_MESSAGES);
        assert_eq!(log.messages()[0].text.as_deref(), Some("msg 5"));
        assert_eq!(log.last().and_then(|m| m.text.as_deref()), Some("msg 104"));
    }

    #[test]
    fn only_newest_messages_keep_images() {
        let mut log = ChatLog::new();
        for i in 0..MAX_CHAT_IMAGES + 2 {
            log.push_ai(format!("edit {i}"), Some(ImageSource::placeholder()));
            log.push_system("note");
        }
        let with_images: Vec<&str> = log
            .messages()
            .iter()
            .filter(|m| m.image.is_some())
            .filter_map(|m| m.text.as_deref())
            .collect();
        assert_eq!(with_images, vec!["edit 2", "edit 3", "edit 4"]);
        assert_eq!(log.len(), 1 + 2 * (MAX_CHAT_IMAGES + 2));
        assert_eq!(log.messages()[1].text.as_deref(), Some("edit 0"));
    }

    #[test]
    fn message_serializes_lowercase_sender_and_skips_empty_fields() {
        let mut log = ChatLog::new();
        let msg = log.push_user("hello", Tool::Object).clone();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "user");
        assert_eq!(json["tool"], "object");
        assert!(json.get("image").is_none());
    }
}
