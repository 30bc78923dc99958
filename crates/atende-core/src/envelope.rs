//! Inbound webhook envelope — the Evolution API message payload.
//!
//! Evolution v1.x may send `data` as an array and uses `messages_upsert`;
//! v2.x sends an object and `messages.upsert`. Both shapes are accepted.

use serde::{Deserialize, Serialize};

/// Top-level webhook payload: `{ event, instance, data }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub data: Option<DataField>,
}

/// `data` is an object in v2.x and an array of objects in v1.x.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataField {
    One(MessageData),
    Many(Vec<MessageData>),
}

/// A single inbound message record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(default)]
    pub key: MessageKey,
    #[serde(default)]
    pub message: Option<MessageContent>,
    #[serde(default, rename = "pushName")]
    pub push_name: Option<String>,
}

/// Gateway-assigned message identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageKey {
    #[serde(default, rename = "remoteJid")]
    pub remote_jid: String,
    #[serde(default, rename = "fromMe")]
    pub from_me: bool,
    #[serde(default)]
    pub id: String,
}

/// Message body variants we care about: plain text, extended text, audio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default, rename = "extendedTextMessage")]
    pub extended_text: Option<ExtendedText>,
    #[serde(default, rename = "audioMessage")]
    pub audio: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedText {
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookPayload {
    /// Whether this is an inbound-message event (either spelling).
    pub fn is_message_event(&self) -> bool {
        let event = self.event.to_lowercase();
        event == "messages.upsert" || event == "messages_upsert"
    }

    /// First message record, whichever shape `data` arrived in.
    pub fn message_data(&self) -> Option<&MessageData> {
        match self.data.as_ref()? {
            DataField::One(d) => Some(d),
            DataField::Many(ds) => ds.first(),
        }
    }
}

impl MessageData {
    /// Text content, from `conversation` or `extendedTextMessage.text`.
    pub fn text(&self) -> Option<&str> {
        let message = self.message.as_ref()?;
        message
            .conversation
            .as_deref()
            .or_else(|| message.extended_text.as_ref().and_then(|e| e.text.as_deref()))
            .filter(|t| !t.is_empty())
    }

    /// Whether the message carries an audio payload.
    pub fn has_audio(&self) -> bool {
        self.message
            .as_ref()
            .map(|m| m.audio.is_some())
            .unwrap_or(false)
    }

    /// Group chats and the status broadcast channel are never answered.
    pub fn is_group_or_status(&self) -> bool {
        self.key.remote_jid.ends_with("@g.us") || self.key.remote_jid == "status@broadcast"
    }
}

/// Extract the bare phone number from a remoteJid
/// (e.g. "5511999999999@s.whatsapp.net" → "5511999999999").
pub fn extract_phone(remote_jid: &str) -> &str {
    remote_jid.split('@').next().unwrap_or(remote_jid)
}
