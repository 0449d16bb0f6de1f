//! Reduce a message tree to the single branch ending at the latest message.
//!
//! The leaf is the message with the greatest `updated_at` (millisecond
//! precision). On ties the first message in input order wins. From the leaf we
//! follow `parent_id` links back to a root, then order the path by row id.
//!
//! A parent that is missing from the input ends the walk quietly; a parent
//! chain that revisits a message is reported as [`HistoryError::CorruptHistory`].

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::MessageId;
use crate::history::core::message::Message;

/// Pick the most recently updated message; the earliest one wins a tie.
#[must_use]
pub fn select_leaf(messages: &[Message]) -> Option<&Message> {
    let mut latest: Option<&Message> = None;
    for message in messages {
        let newer = latest.is_none_or(|best| {
            best.updated_at.timestamp_millis() < message.updated_at.timestamp_millis()
        });
        if newer {
            latest = Some(message);
        }
    }
    latest
}

/// Resolve the branch that ends at the latest message.
///
/// Pure: performs no I/O and may run without any store lock.
///
/// # Errors
/// Returns `CorruptHistory` if the parent chain from the leaf contains a cycle.
pub fn resolve_latest_branch(messages: &[Message]) -> HistoryResult<Vec<Message>> {
    let Some(leaf) = select_leaf(messages) else {
        return Ok(Vec::new());
    };

    let lookup: HashMap<MessageId, &Message> = messages
        .iter()
        .map(|message| (message.message_id, message))
        .collect();

    let mut visited = HashSet::new();
    let mut path = Vec::new();
    let mut current = leaf;
    loop {
        if !visited.insert(current.message_id) {
            return Err(HistoryError::CorruptHistory {
                conversation_id: current.conversation_id.to_string(),
                message_id: current.message_id.to_string(),
            });
        }
        path.push(current.clone());

        let Some(parent_id) = current.parent_id else {
            break;
        };
        let Some(&parent) = lookup.get(&parent_id) else {
            debug!(
                "Branch walk stopped at {}: parent {parent_id} not in history",
                current.message_id
            );
            break;
        };
        current = parent;
    }

    path.sort_by_key(|message| message.row_id);
    debug!(
        "Resolved branch of {} messages out of {} (leaf {leaf})",
        path.len(),
        messages.len()
    );
    Ok(path)
}
