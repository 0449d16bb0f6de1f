//! Core chat history types and identifiers.

pub mod config;
pub mod conversation;
pub mod errors;
pub mod ids;
pub mod message;

pub use config::{DevConfig, HistoryConfig, LoggingConfig, StorageConfig};
pub use conversation::Conversation;
pub use errors::{HistoryError, HistoryResult};
pub use ids::{ConversationId, MessageId, OwnerId};
pub use message::{Feedback, Message, NewMessage, Role};
