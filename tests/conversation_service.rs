//! End-to-end behavior of the conversation service over a file-backed store.

use std::sync::Arc;

use chat_history::history::{
    ConversationId, ConversationService, Feedback, HistoryConfig, HistoryError, NewMessage,
    OwnerId, Role, SqliteConversationStore, StorageConfig,
};

fn open(path: &std::path::Path) -> ConversationService {
    let config = StorageConfig::at_path(path);
    ConversationService::new(Arc::new(SqliteConversationStore::open(&config).unwrap()))
}

fn owner(name: &str) -> OwnerId {
    OwnerId::new(name).unwrap()
}

#[test]
fn merged_view_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.sqlite");
    let sam = owner("sam_pull");

    let root = NewMessage::new(ConversationId::new(), None).with_content(Role::User, "hi");
    let conversation_id = root.conversation_id;
    let first = NewMessage::new(conversation_id, Some(root.message_id));
    let follow_up = NewMessage::new(conversation_id, Some(first.message_id));
    let regenerated = NewMessage::new(conversation_id, Some(root.message_id));
    {
        let svc = open(&path);
        svc.new_conversation(&sam, "conv1", root.clone()).unwrap();
        svc.update_conversation(first.clone()).unwrap();
        svc.update_conversation(follow_up.clone()).unwrap();
        svc.update_conversation(regenerated.clone()).unwrap();
    }

    let svc = open(&path);
    let merged = svc.get_conversation(&sam, conversation_id, true).unwrap();
    let ids: Vec<_> = merged.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![root.message_id, regenerated.message_id]);

    // Writes after reopening still sort after the earlier ones.
    svc.update_conversation(follow_up.clone().with_feedback(Feedback::ThumbsDown, "wrong"))
        .unwrap();
    let merged = svc.get_conversation(&sam, conversation_id, true).unwrap();
    let ids: Vec<_> = merged.iter().map(|m| m.message_id).collect();
    assert_eq!(
        ids,
        vec![root.message_id, first.message_id, follow_up.message_id]
    );
}

#[test]
fn amending_twice_only_touches_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let svc = open(&dir.path().join("history.sqlite"));
    let sam = owner("sam_pull");

    let root = NewMessage::new(ConversationId::new(), None)
        .with_model("GPT-4o")
        .with_content(Role::User, "Hello, how may I help you?");
    svc.new_conversation(&sam, "", root.clone()).unwrap();

    let mut rewrite = root.clone().with_feedback(Feedback::ThumbsUp, "nice");
    rewrite.content = "rewritten".to_string();
    rewrite.model_name = "other-model".to_string();
    svc.update_conversation(rewrite).unwrap();
    svc.update_conversation(root.clone().with_feedback(Feedback::ThumbsDown, "changed my mind"))
        .unwrap();

    let stored = svc
        .get_conversation(&sam, root.conversation_id, false)
        .unwrap();
    assert_eq!(stored.len(), 1);
    let message = &stored[0];
    assert_eq!(message.content, "Hello, how may I help you?");
    assert_eq!(message.model_name, "GPT-4o");
    assert_eq!(message.role, Role::User);
    assert!(message.parent_id.is_none());
    assert_eq!(message.feedback, Feedback::ThumbsDown);
    assert_eq!(message.comment, "changed my mind");
    assert!(message.updated_at > message.created_at);
}

#[test]
fn writes_are_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let svc = open(&dir.path().join("history.sqlite"));
    let sam = owner("sam_pull");

    let orphan = NewMessage::new(ConversationId::new(), None);
    let err = svc.update_conversation(orphan).unwrap_err();
    assert!(matches!(err, HistoryError::NotFound(_)));

    let root = NewMessage::new(ConversationId::new(), None);
    svc.new_conversation(&sam, "", root.clone()).unwrap();
    let err = svc
        .new_conversation(&sam, "again", root.clone())
        .unwrap_err();
    assert!(matches!(err, HistoryError::DuplicateId(_)));

    assert_eq!(svc.list_conversations(&sam).unwrap().len(), 1);
    assert_eq!(svc.list_all_messages().unwrap().len(), 1);
}

#[test]
fn owners_only_see_their_own_history() {
    let dir = tempfile::tempdir().unwrap();
    let svc = open(&dir.path().join("history.sqlite"));
    let sam = owner("sam_pull");
    let miss = owner("Miss_Take");

    let sams = NewMessage::new(ConversationId::new(), None);
    let misses = NewMessage::new(ConversationId::new(), None);
    svc.new_conversation(&sam, "conv1", sams.clone()).unwrap();
    svc.new_conversation(&miss, "conv2", misses.clone()).unwrap();

    let listed = svc.list_conversations(&sam).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "conv1");
    assert!(
        svc.get_conversation(&sam, misses.conversation_id, false)
            .unwrap()
            .is_empty()
    );
    assert!(
        svc.list_conversations(&owner("nobody"))
            .unwrap()
            .is_empty()
    );

    let renamed = svc
        .rename_conversation(&miss, misses.conversation_id, "renamed")
        .unwrap();
    assert_eq!(renamed.name, "renamed");
    assert!(matches!(
        svc.rename_conversation(&sam, misses.conversation_id, "stolen"),
        Err(HistoryError::NotFound(_))
    ));
}

#[test]
fn dev_config_seeds_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.sqlite");
    let json = serde_json::json!({
        "storage": { "sqlite_path": path },
        "dev": { "seed_demo_data": true }
    })
    .to_string();
    let config = HistoryConfig::from_json(&json).unwrap();

    let svc = ConversationService::from_config(&config).unwrap();
    assert_eq!(svc.list_all_messages().unwrap().len(), 3);
    drop(svc);

    let svc = ConversationService::from_config(&config).unwrap();
    assert_eq!(svc.list_all_messages().unwrap().len(), 3);
    assert_eq!(svc.list_conversations(&owner("sam_pull")).unwrap().len(), 1);
    assert_eq!(svc.list_conversations(&owner("Miss_Take")).unwrap().len(), 1);
}
