//! Branching chat history.
//!
//! Each conversation is a tree of messages: a user turn may have several
//! replies (regenerated answers). This module is organized into:
//! - `core`: Configuration, errors, IDs, and the conversation/message model
//! - `storage`: `SQLite` store with the store-wide read/write lock, plus a dev fixture
//! - `branch`: Pure reduction of a message tree to its latest branch
//! - `engine`: The conversation service used by request handlers

pub mod branch;
pub mod core;
pub mod engine;
pub mod storage;

// Re-export commonly used types for convenience
pub use branch::{resolve_latest_branch, select_leaf};
pub use self::core::{
    Conversation, ConversationId, DevConfig, Feedback, HistoryConfig, HistoryError,
    HistoryResult, LoggingConfig, Message, MessageId, NewMessage, OwnerId, Role, StorageConfig,
};
pub use engine::ConversationService;
pub use storage::{ConversationStore, SqliteConversationStore, seed_demo_data};
