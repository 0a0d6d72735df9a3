//! Wire types for the chat transport bridge.

use serde::{Deserialize, Serialize};

/// One inbound event from the messaging front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl InboundEvent {
    pub const fn new(user_id: i64, kind: EventKind) -> Self {
        Self {
            user_id,
            username: None,
            kind,
        }
    }

    /// Short label for logs.
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::Start => "start",
            EventKind::Text { .. } => "text",
            EventKind::Callback { .. } => "callback",
            EventKind::Document(_) => "document",
            EventKind::Command { .. } => "command",
        }
    }
}

/// Inbound event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The start command.
    Start,
    /// Free text, including reply-keyboard button taps.
    Text { text: String },
    /// Inline button callback payload (e.g. `tariff_1 час`).
    Callback { data: String },
    /// An uploaded document.
    Document(Document),
    /// A named command without the leading slash (`checkpayment`, `myid`, `admin`).
    Command { name: String },
}

/// An uploaded document with its declared metadata.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub file_name: String,
    pub mime_type: String,
    /// Declared size in bytes, as reported by the front end.
    pub size: u64,
    #[serde(rename = "data_base64", with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// An outbound reply to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub user_id: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
    /// Whether `text` carries HTML markup.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub html: bool,
}

impl Reply {
    pub fn text(user_id: i64, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
            keyboard: None,
            html: false,
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    #[must_use]
    pub const fn as_html(mut self) -> Self {
        self.html = true;
        self
    }
}

/// Keyboard attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Keyboard {
    /// Persistent reply keyboard; each inner vector is one row.
    Reply { rows: Vec<Vec<String>> },
    /// Buttons attached to the message, one per row.
    Inline { buttons: Vec<InlineButton> },
    /// Remove the persistent keyboard.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub data: String,
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}
