//! Conversation model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::core::ids::{ConversationId, OwnerId};

/// An owned, named container for a message tree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Store-assigned row id. Not a business identity.
    #[serde(rename = "id")]
    pub row_id: i64,
    /// Insert time.
    #[serde(rename = "create_ts")]
    pub created_at: DateTime<Utc>,
    /// Last rename time.
    #[serde(rename = "update_ts")]
    pub updated_at: DateTime<Utc>,
    /// Owning user.
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    /// Business identity.
    pub conversation_id: ConversationId,
    /// Display name, possibly empty.
    pub name: String,
}
