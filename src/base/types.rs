//! Common types, result aliases, and domain enums used across the crate.

use serde::{Deserialize, Serialize};

/// The crate's boxed error type.
pub type Err = anyhow::Error;
/// A `Result` specialized to the crate's error type.
pub type Res<T> = Result<T, Err>;
/// A `Result` carrying no success value.
pub type Void = Res<()>;

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Authored by the end user.
    User,
    /// Authored by the bot.
    Assistant,
}

/// A single persisted turn of a per-user conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who authored this turn.
    pub role: Role,
    /// The text content of the turn.
    pub content: String,
    /// When the turn was recorded.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A normalized inbound messaging event, produced by the transport layer
/// from a webhook payload. Immutable once constructed.
#[derive(Debug, Clone, Default)]
pub struct InboundEvent {
    /// Id of the account that sent the message.
    pub sender_id: String,
    /// Id of the account that received the message.
    pub recipient_id: String,
    /// Empty when the event carried no message id.
    pub message_id: String,
    /// Resolved text: message text, quick-reply payload, or postback payload.
    pub text: Option<String>,
    /// Attachment type names ("image", "video", ...).
    pub attachments: Vec<String>,
    /// Whether the event is an echo of a message this bot sent.
    pub is_echo: bool,
    /// Whether the event is a read receipt.
    pub is_read_receipt: bool,
}

impl InboundEvent {
    /// Whether the event carries anything a reply could be generated from.
    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty()) || !self.attachments.is_empty()
    }
}

/// Outcome of filtering an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Hand the event to the dispatcher.
    Process,
    /// Flagged echo of a message this bot sent.
    IgnoreEcho,
    /// Message id already delivered.
    IgnoreDuplicate,
    /// Sent by one of the bot's own accounts, or an unflagged echo.
    IgnoreSelf,
    /// Read receipt; carries no content.
    IgnoreReadReceipt,
    /// No text and no attachments to respond to.
    IgnoreEmpty,
}
