//! Message model: one node of a conversation tree.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::{ConversationId, MessageId};

/// Author role of a message.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Model output.
    System,
    /// User input.
    #[default]
    User,
}

impl Role {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            _ => Err(value.to_string()),
        }
    }
}

/// User feedback attached to a message.
///
/// Encoded on the wire and in storage as `0`, `1`, `2`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Feedback {
    /// No feedback given.
    #[default]
    None,
    /// Positive feedback.
    ThumbsUp,
    /// Negative feedback.
    ThumbsDown,
}

impl Feedback {
    /// Numeric code used on the wire and in storage.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThumbsUp => 1,
            Self::ThumbsDown => 2,
        }
    }
}

impl TryFrom<u8> for Feedback {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::ThumbsUp),
            2 => Ok(Self::ThumbsDown),
            other => Err(format!("unknown feedback code {other}")),
        }
    }
}

impl From<Feedback> for u8 {
    fn from(value: Feedback) -> Self {
        value.code()
    }
}

/// Caller-supplied message payload.
///
/// Row id and timestamps are assigned by the store on insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Identity of this node.
    pub message_id: MessageId,
    /// Parent node in the same conversation, `None` for the root.
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    /// Model that produced or received the message.
    #[serde(rename = "model", default)]
    pub model_name: String,
    /// Text payload.
    #[serde(default)]
    pub content: String,
    /// Author role. Required on the wire.
    pub role: Role,
    /// Generation latency in seconds.
    #[serde(default)]
    pub response_time: f64,
    /// User feedback.
    #[serde(default)]
    pub feedback: Feedback,
    /// Free-form feedback comment.
    #[serde(default)]
    pub comment: String,
}

impl NewMessage {
    /// Start a payload with fresh message id and empty fields.
    #[must_use]
    pub fn new(conversation_id: ConversationId, parent_id: Option<MessageId>) -> Self {
        Self {
            conversation_id,
            message_id: MessageId::new(),
            parent_id,
            model_name: String::new(),
            content: String::new(),
            role: Role::User,
            response_time: 0.0,
            feedback: Feedback::None,
            comment: String::new(),
        }
    }

    /// Set the content and role.
    #[must_use]
    pub fn with_content(mut self, role: Role, content: impl Into<String>) -> Self {
        self.role = role;
        self.content = content.into();
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set feedback and comment.
    #[must_use]
    pub fn with_feedback(mut self, feedback: Feedback, comment: impl Into<String>) -> Self {
        self.feedback = feedback;
        self.comment = comment.into();
        self
    }

    /// Decode an inbound JSON payload and validate it.
    ///
    /// # Errors
    /// Returns a validation error for malformed JSON, a missing required
    /// field, or a payload rejected by [`Self::validate`].
    pub fn from_json(raw: &str) -> HistoryResult<Self> {
        let message: Self = serde_json::from_str(raw)
            .map_err(|err| HistoryError::Validation(format!("malformed message: {err}")))?;
        message.validate()?;
        Ok(message)
    }

    /// Check identifiers and numeric fields.
    ///
    /// # Errors
    /// Returns a validation error describing the first broken rule.
    pub fn validate(&self) -> HistoryResult<()> {
        if self.conversation_id.is_nil() {
            return Err(HistoryError::Validation(
                "conversation_id must not be nil".to_string(),
            ));
        }
        if self.message_id.is_nil() {
            return Err(HistoryError::Validation(
                "message_id must not be nil".to_string(),
            ));
        }
        match self.parent_id {
            Some(parent) if parent.is_nil() => Err(HistoryError::Validation(
                "parent_id must not be nil; omit it for a root message".to_string(),
            )),
            Some(parent) if parent == self.message_id => Err(HistoryError::Validation(format!(
                "message {} cannot be its own parent",
                self.message_id
            ))),
            _ if !self.response_time.is_finite() || self.response_time < 0.0 => {
                Err(HistoryError::Validation(format!(
                    "response_time must be a finite non-negative number, got {}",
                    self.response_time
                )))
            }
            _ => Ok(()),
        }
    }
}

/// A stored message node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned row id; global insertion order.
    #[serde(rename = "id")]
    pub row_id: i64,
    /// Insert time.
    #[serde(rename = "create_ts")]
    pub created_at: DateTime<Utc>,
    /// Last amendment time.
    #[serde(rename = "update_ts")]
    pub updated_at: DateTime<Utc>,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Identity of this node.
    pub message_id: MessageId,
    /// Parent node, `None` for the root.
    pub parent_id: Option<MessageId>,
    /// Model name.
    #[serde(rename = "model")]
    pub model_name: String,
    /// Text payload.
    pub content: String,
    /// Author role.
    pub role: Role,
    /// Generation latency in seconds.
    pub response_time: f64,
    /// User feedback.
    pub feedback: Feedback,
    /// Free-form feedback comment.
    pub comment: String,
}

impl Message {
    /// Whether this node starts a branch.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self
            .parent_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        write!(
            f,
            "#{} [{}] conversation={} message={} parent={}",
            self.row_id,
            self.updated_at.to_rfc3339(),
            self.conversation_id,
            self.message_id,
            parent
        )
    }
}
