//! Branch resolution over a conversation's message tree.

pub mod resolver;

pub use resolver::{resolve_latest_branch, select_leaf};
