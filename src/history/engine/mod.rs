//! Service layer composing the store and the branch resolver.

pub mod service;

pub use service::ConversationService;
