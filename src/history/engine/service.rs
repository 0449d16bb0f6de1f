//! Conversation service orchestration.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::history::branch::resolver::resolve_latest_branch;
use crate::history::core::config::HistoryConfig;
use crate::history::core::conversation::Conversation;
use crate::history::core::errors::HistoryResult;
use crate::history::core::ids::{ConversationId, OwnerId};
use crate::history::core::message::{Message, NewMessage};
use crate::history::storage::conversation_store::{ConversationStore, SqliteConversationStore};
use crate::history::storage::demo_seed::seed_demo_data;

/// Serves full-tree and merged reads, and conversation writes, over one store.
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
}

impl ConversationService {
    /// Wrap an already opened store.
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Open the `SQLite` store described by `config`, seeding demo data in dev mode.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the store cannot be opened.
    pub fn from_config(config: &HistoryConfig) -> HistoryResult<Self> {
        config.validate()?;
        let store = Arc::new(SqliteConversationStore::open(&config.storage)?);
        if config.dev.seed_demo_data {
            seed_demo_data(store.as_ref())?;
        }
        info!("Conversation service ready");
        Ok(Self::new(store))
    }

    /// Create a conversation with `root` as its first message.
    ///
    /// # Errors
    /// See [`ConversationStore::create_conversation`].
    pub fn new_conversation(
        &self,
        owner_id: &OwnerId,
        name: &str,
        root: NewMessage,
    ) -> HistoryResult<Conversation> {
        self.store
            .create_conversation(owner_id, name, root)
            .inspect_err(|err| warn!("Rejected new conversation for {owner_id}: {err}"))
    }

    /// Append a new node (fresh `message_id`) or amend feedback on an existing one.
    ///
    /// # Errors
    /// See [`ConversationStore::append_or_amend_message`].
    pub fn update_conversation(&self, message: NewMessage) -> HistoryResult<Conversation> {
        let message_id = message.message_id;
        self.store
            .append_or_amend_message(message)
            .inspect_err(|err| warn!("Rejected write of message {message_id}: {err}"))
    }

    /// Write `message` on behalf of `owner_id`.
    ///
    /// Goes to [`Self::update_conversation`] when the owner already has the
    /// target conversation; otherwise starts an unnamed conversation rooted
    /// at `message`. A conversation id held by another owner fails with
    /// `DuplicateId`.
    ///
    /// # Errors
    /// Any error from the delegated write.
    pub fn save_message(&self, owner_id: &OwnerId, message: NewMessage) -> HistoryResult<Conversation> {
        if self
            .store
            .get_conversation(owner_id, message.conversation_id)?
            .is_some()
        {
            self.update_conversation(message)
        } else {
            debug!(
                "No conversation {} for {owner_id}; starting one",
                message.conversation_id
            );
            self.new_conversation(owner_id, "", message)
        }
    }

    /// Rename one of the owner's conversations.
    ///
    /// # Errors
    /// See [`ConversationStore::rename_conversation`].
    pub fn rename_conversation(
        &self,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
        name: &str,
    ) -> HistoryResult<Conversation> {
        self.store.rename_conversation(owner_id, conversation_id, name)
    }

    /// All conversations of `owner_id`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub fn list_conversations(&self, owner_id: &OwnerId) -> HistoryResult<Vec<Conversation>> {
        self.store.list_conversations_for_owner(owner_id)
    }

    /// Messages of one conversation; with `merge`, only the latest branch.
    ///
    /// The branch is resolved after the store's read lock is released.
    /// Unknown or foreign conversations yield an empty list.
    ///
    /// # Errors
    /// Storage errors, or `CorruptHistory` when merging a cyclic tree.
    pub fn get_conversation(
        &self,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
        merge: bool,
    ) -> HistoryResult<Vec<Message>> {
        let messages = self
            .store
            .list_messages_for_conversation(owner_id, conversation_id)?;
        if merge {
            resolve_latest_branch(&messages)
        } else {
            Ok(messages)
        }
    }

    /// Every stored message. Reserved for privileged callers.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub fn list_all_messages(&self) -> HistoryResult<Vec<Message>> {
        self.store.list_all_messages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::core::errors::HistoryError;
    use crate::history::core::message::{Feedback, Role};

    fn service() -> ConversationService {
        ConversationService::new(Arc::new(SqliteConversationStore::in_memory().unwrap()))
    }

    fn owner(name: &str) -> OwnerId {
        OwnerId::new(name).unwrap()
    }

    #[test]
    fn test_merge_follows_regenerated_answer() {
        let svc = service();
        let sam = owner("sam_pull");
        let question = NewMessage::new(ConversationId::new(), None)
            .with_content(Role::User, "How many transactions?");
        let conversation_id = question.conversation_id;
        svc.new_conversation(&sam, "", question.clone()).unwrap();

        let first = NewMessage::new(conversation_id, Some(question.message_id))
            .with_content(Role::System, "42");
        let second = NewMessage::new(conversation_id, Some(question.message_id))
            .with_content(Role::System, "Forty-two, across three accounts.");
        svc.update_conversation(first).unwrap();
        svc.update_conversation(second.clone()).unwrap();

        let full = svc.get_conversation(&sam, conversation_id, false).unwrap();
        assert_eq!(full.len(), 3);

        let merged = svc.get_conversation(&sam, conversation_id, true).unwrap();
        let ids: Vec<_> = merged.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![question.message_id, second.message_id]);
    }

    #[test]
    fn test_feedback_on_older_answer_moves_merged_branch() {
        let svc = service();
        let sam = owner("sam_pull");
        let question = NewMessage::new(ConversationId::new(), None);
        let conversation_id = question.conversation_id;
        svc.new_conversation(&sam, "", question.clone()).unwrap();

        let first = NewMessage::new(conversation_id, Some(question.message_id));
        let second = NewMessage::new(conversation_id, Some(question.message_id));
        svc.update_conversation(first.clone()).unwrap();
        svc.update_conversation(second).unwrap();
        svc.update_conversation(first.clone().with_feedback(Feedback::ThumbsUp, "better"))
            .unwrap();

        let merged = svc.get_conversation(&sam, conversation_id, true).unwrap();
        assert_eq!(merged.last().unwrap().message_id, first.message_id);
        assert_eq!(merged.last().unwrap().feedback, Feedback::ThumbsUp);
    }

    #[test]
    fn test_save_message_creates_then_appends() {
        let svc = service();
        let sam = owner("sam_pull");
        let root = NewMessage::new(ConversationId::new(), None);
        let created = svc.save_message(&sam, root.clone()).unwrap();
        assert_eq!(created.name, "");
        assert_eq!(created.owner_id, sam);

        let reply = NewMessage::new(root.conversation_id, Some(root.message_id));
        let same = svc.save_message(&sam, reply).unwrap();
        assert_eq!(same.row_id, created.row_id);
        assert_eq!(svc.list_conversations(&sam).unwrap().len(), 1);
    }

    #[test]
    fn test_save_message_into_foreign_conversation_is_duplicate() {
        let svc = service();
        let root = NewMessage::new(ConversationId::new(), None);
        svc.save_message(&owner("Miss_Take"), root.clone()).unwrap();

        let intruder = NewMessage::new(root.conversation_id, None);
        let err = svc.save_message(&owner("sam_pull"), intruder).unwrap_err();
        assert!(matches!(err, HistoryError::DuplicateId(_)));
    }

    #[test]
    fn test_foreign_read_is_empty_not_error() {
        let svc = service();
        let root = NewMessage::new(ConversationId::new(), None);
        svc.new_conversation(&owner("Miss_Take"), "conv2", root.clone())
            .unwrap();
        let seen = svc
            .get_conversation(&owner("sam_pull"), root.conversation_id, true)
            .unwrap();
        assert!(seen.is_empty());
    }

    #[test]
    fn test_from_config_seeds_in_dev_mode() {
        let mut config = HistoryConfig::default();
        config.storage = crate::history::core::config::StorageConfig::in_memory();
        config.dev.seed_demo_data = true;
        let svc = ConversationService::from_config(&config).unwrap();
        assert_eq!(svc.list_all_messages().unwrap().len(), 3);
    }
}
