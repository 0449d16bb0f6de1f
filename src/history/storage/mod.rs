//! Persistent storage for conversations and messages.

pub mod conversation_store;
pub mod demo_seed;
pub mod sql_types;
pub mod sqlite;

pub use conversation_store::{ConversationStore, SqliteConversationStore};
pub use demo_seed::{DEMO_CONVERSATION_1, DEMO_CONVERSATION_2, seed_demo_data};
pub use sqlite::SqliteConnections;
