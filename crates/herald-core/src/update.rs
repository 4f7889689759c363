//! Telegram Bot API update model.
//!
//! Only the fields the dispatcher routes on are typed. Everything else is
//! kept as raw JSON so newer platform fields survive a round trip.
//! Docs: <https://core.telegram.org/bots/api#update>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// One event delivered by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
    /// Payload kinds this crate does not route on (edited_message, poll, ...).
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Update {
    /// Decode one update from a batch or a webhook body.
    ///
    /// A payload that does not fit the typed model keeps its id and comes
    /// back with no routable content, so it is acknowledged and dropped
    /// instead of blocking the stream. `None` when there is no integer
    /// `update_id` to acknowledge.
    pub fn from_value(value: Value) -> Option<Self> {
        let update_id = value.get("update_id").and_then(Value::as_i64)?;
        match serde_json::from_value::<Update>(value.clone()) {
            Ok(update) => Some(update),
            Err(e) => {
                warn!("update {update_id} does not fit the update model, dropping its payload: {e}");
                let other = match value {
                    Value::Object(mut fields) => {
                        fields.remove("update_id");
                        fields
                    }
                    _ => Map::new(),
                };
                Some(Self {
                    update_id,
                    message: None,
                    callback_query: None,
                    other,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption_entities: Vec<MessageEntity>,
    /// Content payloads (`photo`, `voice`, `forward_origin`, ...) by key.
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl Message {
    /// The primary content type: the first [`MessageType`] present on the payload.
    pub fn content_type(&self) -> Option<MessageType> {
        MessageType::ALL.into_iter().find(|ty| self.has_content(*ty))
    }

    /// Whether the payload carries a non-empty value under `ty`'s key.
    pub fn has_content(&self, ty: MessageType) -> bool {
        match ty {
            MessageType::Text => self.text.as_deref().is_some_and(|t| !t.is_empty()),
            other => self
                .content
                .get(other.key())
                .is_some_and(|value| match value {
                    Value::Null => false,
                    Value::String(s) => !s.is_empty(),
                    Value::Array(items) => !items.is_empty(),
                    _ => true,
                }),
        }
    }

    /// The first `bot_command` entity and the text it indexes into.
    ///
    /// Commands sent with media sit in `caption`/`caption_entities`.
    pub fn command_entity(&self) -> Option<(&str, &MessageEntity)> {
        let in_text = self
            .text
            .as_deref()
            .zip(self.entities.iter().find(|e| e.is_bot_command()));
        let in_caption = || {
            self.caption
                .as_deref()
                .zip(self.caption_entities.iter().find(|e| e.is_bot_command()))
        };
        in_text.or_else(in_caption)
    }

    /// Raw content payload for `key`, e.g. `"photo"`.
    pub fn content(&self, key: &str) -> Option<&Value> {
        self.content.get(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Entity kind: "bot_command", "mention", "url", ...
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in UTF-16 code units.
    pub offset: usize,
    /// Length in UTF-16 code units.
    pub length: usize,
}

impl MessageEntity {
    pub fn is_bot_command(&self) -> bool {
        self.kind == "bot_command"
    }

    /// Slice `text` by this entity's UTF-16 range.
    ///
    /// Returns `None` when the range falls outside the text.
    pub fn extract(&self, text: &str) -> Option<String> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let end = self.offset.checked_add(self.length)?;
        let slice = units.get(self.offset..end)?;
        Some(String::from_utf16_lossy(slice))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// The message carrying the button that was pressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<Message>>,
    /// Opaque payload chosen when the markup was built.
    #[serde(default)]
    pub data: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl User {
    /// `@username` when set, otherwise the full name.
    pub fn display_name(&self) -> String {
        if let Some(ref un) = self.username {
            format!("@{un}")
        } else if let Some(ref ln) = self.last_name {
            format!("{} {ln}", self.first_name)
        } else {
            self.first_name.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// Chat type: "private", "group", "supergroup", or "channel".
    #[serde(default, rename = "type")]
    pub chat_type: String,
}

/// Primary content category of a message, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Photo,
    Document,
    Audio,
    Sticker,
    Video,
    VideoNote,
    Voice,
    Forwarded,
}

impl MessageType {
    /// Every type, in the order content detection scans them.
    pub const ALL: [MessageType; 9] = [
        Self::Text,
        Self::Photo,
        Self::Document,
        Self::Audio,
        Self::Sticker,
        Self::Video,
        Self::VideoNote,
        Self::Voice,
        Self::Forwarded,
    ];

    /// Payload key on the platform message object.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Sticker => "sticker",
            Self::Video => "video",
            Self::VideoNote => "video_note",
            Self::Voice => "voice",
            Self::Forwarded => "forward_origin",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
