//! Development fixture: a couple of owners with small conversations.

use tracing::info;
use uuid::Uuid;

use crate::history::core::errors::HistoryResult;
use crate::history::core::ids::{ConversationId, MessageId, OwnerId};
use crate::history::core::message::{NewMessage, Role};
use crate::history::storage::conversation_store::ConversationStore;

/// First demo conversation, owned by `sam_pull`.
pub const DEMO_CONVERSATION_1: Uuid = Uuid::from_u128(0x6015_29eb_4927_4e24_b285_bd6b_9519_a951);
/// Second demo conversation, owned by `Miss_Take`.
pub const DEMO_CONVERSATION_2: Uuid = Uuid::from_u128(0x6015_29eb_4927_4e24_b285_bd6b_9519_a952);

const DEMO_MESSAGE_1: Uuid = Uuid::from_u128(0x6015_29eb_4927_4e24_b285_bd6b_9519_b001);
const DEMO_MESSAGE_2: Uuid = Uuid::from_u128(0x6015_29eb_4927_4e24_b285_bd6b_9519_b002);
const DEMO_MESSAGE_3: Uuid = Uuid::from_u128(0x6015_29eb_4927_4e24_b285_bd6b_9519_b003);

const DEMO_MODEL: &str = "GPT-4o";

/// Insert the demo data. Messages that already exist are left alone, so an
/// interrupted seed is completed by the next run.
///
/// Returns how many messages were written.
///
/// # Errors
/// Returns an error if a demo id is taken by another owner or storage fails.
pub fn seed_demo_data(store: &dyn ConversationStore) -> HistoryResult<usize> {
    let sam = OwnerId::new("sam_pull")?;
    let miss = OwnerId::new("Miss_Take")?;
    let conv1 = ConversationId::from_uuid(DEMO_CONVERSATION_1);
    let conv2 = ConversationId::from_uuid(DEMO_CONVERSATION_2);

    let first = demo_message(
        conv1,
        DEMO_MESSAGE_1,
        None,
        Role::User,
        "This is the first message, there is no parent",
    );
    let reply = demo_message(
        conv1,
        DEMO_MESSAGE_2,
        Some(first.message_id),
        Role::System,
        "Hello, how may I help you?",
    );
    let other = demo_message(conv2, DEMO_MESSAGE_3, None, Role::User, "How many transactions?");

    let mut written = 0;
    if store.get_conversation(&sam, conv1)?.is_none() {
        store.create_conversation(&sam, "conv1", first)?;
        written += 1;
    }
    let stored = store.list_messages_for_conversation(&sam, conv1)?;
    if !stored.iter().any(|m| m.message_id == reply.message_id) {
        store.append_or_amend_message(reply)?;
        written += 1;
    }
    if store.get_conversation(&miss, conv2)?.is_none() {
        store.create_conversation(&miss, "conv2", other)?;
        written += 1;
    }

    info!("Seeded {written} demo messages");
    Ok(written)
}

fn demo_message(
    conversation_id: ConversationId,
    message_id: Uuid,
    parent_id: Option<MessageId>,
    role: Role,
    content: &str,
) -> NewMessage {
    let mut message = NewMessage::new(conversation_id, parent_id)
        .with_content(role, content)
        .with_model(DEMO_MODEL);
    message.message_id = MessageId::from_uuid(message_id);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::storage::conversation_store::SqliteConversationStore;

    #[test]
    fn test_seed_populates_two_owners() {
        let store = SqliteConversationStore::in_memory().unwrap();
        assert_eq!(seed_demo_data(&store).unwrap(), 3);

        let sam = OwnerId::new("sam_pull").unwrap();
        let conversations = store.list_conversations_for_owner(&sam).unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].name, "conv1");

        let messages = store
            .list_messages_for_conversation(&sam, ConversationId::from_uuid(DEMO_CONVERSATION_1))
            .unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_seed_completes_interrupted_conversation() {
        let store = SqliteConversationStore::in_memory().unwrap();
        let sam = OwnerId::new("sam_pull").unwrap();
        let conv1 = ConversationId::from_uuid(DEMO_CONVERSATION_1);
        let root = demo_message(conv1, DEMO_MESSAGE_1, None, Role::User, "partial");
        store.create_conversation(&sam, "conv1", root).unwrap();

        assert_eq!(seed_demo_data(&store).unwrap(), 2);
        let messages = store.list_messages_for_conversation(&sam, conv1).unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.message_id).collect();
        assert_eq!(
            ids,
            vec![
                MessageId::from_uuid(DEMO_MESSAGE_1),
                MessageId::from_uuid(DEMO_MESSAGE_2)
            ]
        );
    }

    #[test]
    fn test_seed_twice_writes_nothing_new() {
        let store = SqliteConversationStore::in_memory().unwrap();
        seed_demo_data(&store).unwrap();
        assert_eq!(seed_demo_data(&store).unwrap(), 0);
        assert_eq!(store.list_all_messages().unwrap().len(), 3);
    }
}
