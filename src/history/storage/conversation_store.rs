//! Conversation and message store.

use std::sync::RwLock;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::history::core::config::StorageConfig;
use crate::history::core::conversation::Conversation;
use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::{ConversationId, MessageId, OwnerId};
use crate::history::core::message::{Message, NewMessage};
use crate::history::storage::sql_types::{clock_to_datetime, millis_to_datetime};
use crate::history::storage::sqlite::SqliteConnections;

/// Conversation store trait.
///
/// Reads are consistent snapshots; writes are atomic and serialized.
pub trait ConversationStore: Send + Sync {
    /// Insert a conversation together with its root message.
    ///
    /// The conversation id is taken from `root.conversation_id`.
    ///
    /// # Errors
    /// `DuplicateId` if either id already exists; `Validation` for a malformed
    /// root (including one that has a parent).
    fn create_conversation(
        &self,
        owner_id: &OwnerId,
        name: &str,
        root: NewMessage,
    ) -> HistoryResult<Conversation>;

    /// Append `message` as a new node, or amend its feedback and comment if
    /// `(conversation_id, message_id)` already exists.
    ///
    /// # Errors
    /// `NotFound` if the conversation does not exist; `Validation` if a new
    /// node would become a second root or points at a parent outside the
    /// conversation; `DuplicateId` if the message id is used elsewhere.
    fn append_or_amend_message(&self, message: NewMessage) -> HistoryResult<Conversation>;

    /// Rename a conversation owned by `owner_id`.
    ///
    /// # Errors
    /// `NotFound` if the conversation does not exist or is owned by someone else.
    fn rename_conversation(
        &self,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
        name: &str,
    ) -> HistoryResult<Conversation>;

    /// Look up one conversation, scoped to its owner.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_conversation(
        &self,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
    ) -> HistoryResult<Option<Conversation>>;

    /// All conversations of `owner_id`, in insertion order.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_conversations_for_owner(&self, owner_id: &OwnerId) -> HistoryResult<Vec<Conversation>>;

    /// All messages of a conversation owned by `owner_id`, in row id order.
    /// Empty when the conversation is missing or owned by someone else.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_messages_for_conversation(
        &self,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
    ) -> HistoryResult<Vec<Message>>;

    /// Every message in the store, in row id order.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_all_messages(&self) -> HistoryResult<Vec<Message>>;
}

/// Write-side state guarded by the store lock.
///
/// Hands out strictly increasing unix-millis timestamps so that two writes
/// never share an `updated_at`, even inside one millisecond.
#[derive(Debug)]
struct WriteClock {
    last_millis: i64,
}

impl WriteClock {
    fn tick(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_millis = now.max(self.last_millis.saturating_add(1));
        self.last_millis
    }
}

const CONVERSATION_COLUMNS: &str = "id, user_id, conversation_id, name, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, message_id, parent_id, model_name, content, \
     role, response_time, feedback, comment, created_at, updated_at";

/// `SQLite` implementation of the conversation store.
pub struct SqliteConversationStore {
    lock: RwLock<WriteClock>,
    conns: SqliteConnections,
    conversations: String,
    messages: String,
}

impl SqliteConversationStore {
    /// Open the store and create its tables if needed.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the database cannot be opened.
    pub fn open(config: &StorageConfig) -> HistoryResult<Self> {
        config.validate()?;
        let conns = SqliteConnections::open(config)?;
        let conversations = config.conversation_table.clone();
        let messages = config.message_table.clone();

        let last_millis = conns.with_writer(|conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {conversations} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    conversation_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL DEFAULT '',
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{conversations}_user
                    ON {conversations} (user_id);
                CREATE TABLE IF NOT EXISTS {messages} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id TEXT NOT NULL,
                    message_id TEXT NOT NULL UNIQUE,
                    parent_id TEXT,
                    model_name TEXT NOT NULL DEFAULT '',
                    content TEXT NOT NULL DEFAULT '',
                    role TEXT NOT NULL,
                    response_time REAL NOT NULL DEFAULT 0,
                    feedback INTEGER NOT NULL DEFAULT 0,
                    comment TEXT NOT NULL DEFAULT '',
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{messages}_conversation
                    ON {messages} (conversation_id, id);"
            ))?;
            let last: Option<i64> = conn.query_row(
                &format!(
                    "SELECT MAX(ts) FROM (
                        SELECT MAX(updated_at) AS ts FROM {conversations}
                        UNION ALL
                        SELECT MAX(updated_at) AS ts FROM {messages}
                    )"
                ),
                [],
                |row| row.get(0),
            )?;
            Ok(last.unwrap_or(0))
        })?;

        info!(
            "Opened chat history store at {}",
            config.sqlite_path.display()
        );

        Ok(Self {
            lock: RwLock::new(WriteClock { last_millis }),
            conns,
            conversations,
            messages,
        })
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn in_memory() -> HistoryResult<Self> {
        Self::open(&StorageConfig::in_memory())
    }

    fn find_conversation(
        &self,
        conn: &Connection,
        conversation_id: ConversationId,
    ) -> HistoryResult<Option<Conversation>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM {} WHERE conversation_id = ?1",
                    self.conversations
                ),
                rusqlite::params![conversation_id],
                conversation_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn find_owned_conversation(
        &self,
        conn: &Connection,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
    ) -> HistoryResult<Option<Conversation>> {
        Ok(self
            .find_conversation(conn, conversation_id)?
            .filter(|conversation| &conversation.owner_id == owner_id))
    }

    fn find_message_row(
        &self,
        tx: &Transaction<'_>,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> HistoryResult<Option<i64>> {
        let row = tx
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE conversation_id = ?1 AND message_id = ?2",
                    self.messages
                ),
                rusqlite::params![conversation_id, message_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row)
    }

    fn insert_message(
        &self,
        tx: &Transaction<'_>,
        message: &NewMessage,
        now: i64,
    ) -> HistoryResult<i64> {
        tx.execute(
            &format!(
                "INSERT INTO {}
                (conversation_id, message_id, parent_id, model_name, content, role,
                 response_time, feedback, comment, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                self.messages
            ),
            rusqlite::params![
                message.conversation_id,
                message.message_id,
                message.parent_id,
                message.model_name,
                message.content,
                message.role,
                message.response_time,
                message.feedback,
                message.comment,
                now
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// Reject a new node that would break the one-root tree shape.
    fn check_placement(&self, tx: &Transaction<'_>, message: &NewMessage) -> HistoryResult<()> {
        match message.parent_id {
            None => {
                let roots: i64 = tx.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {} WHERE conversation_id = ?1 AND parent_id IS NULL",
                        self.messages
                    ),
                    rusqlite::params![message.conversation_id],
                    |row| row.get(0),
                )?;
                if roots > 0 {
                    return Err(HistoryError::Validation(format!(
                        "conversation {} already has a root message",
                        message.conversation_id
                    )));
                }
            }
            Some(parent_id) => {
                if self
                    .find_message_row(tx, message.conversation_id, parent_id)?
                    .is_none()
                {
                    return Err(HistoryError::Validation(format!(
                        "parent {parent_id} is not a message of conversation {}",
                        message.conversation_id
                    )));
                }
            }
        }
        Ok(())
    }

    fn query_messages(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> HistoryResult<Vec<Message>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, message_from_row)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(rows)
    }
}

impl ConversationStore for SqliteConversationStore {
    // The write guard spans the whole transaction so commit order follows the clock.
    #[allow(clippy::significant_drop_tightening)]
    fn create_conversation(
        &self,
        owner_id: &OwnerId,
        name: &str,
        root: NewMessage,
    ) -> HistoryResult<Conversation> {
        root.validate()?;
        if let Some(parent_id) = root.parent_id {
            return Err(HistoryError::Validation(format!(
                "root message {} must not have a parent, got {parent_id}",
                root.message_id
            )));
        }

        let mut clock = self.lock.write().map_err(|_| HistoryError::LockPoisoned)?;
        let now = clock.tick();
        let timestamp = clock_to_datetime(now)?;
        let conversation = self.conns.with_writer(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (user_id, conversation_id, name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    self.conversations
                ),
                rusqlite::params![owner_id, root.conversation_id, name, now],
            )?;
            let row_id = tx.last_insert_rowid();
            self.insert_message(&tx, &root, now)?;
            tx.commit()?;

            Ok(Conversation {
                row_id,
                created_at: timestamp,
                updated_at: timestamp,
                owner_id: owner_id.clone(),
                conversation_id: root.conversation_id,
                name: name.to_string(),
            })
        })?;

        debug!(
            "Created conversation {} for {} with root {}",
            conversation.conversation_id, owner_id, root.message_id
        );
        Ok(conversation)
    }

    // The write guard spans the whole transaction so commit order follows the clock.
    #[allow(clippy::significant_drop_tightening)]
    fn append_or_amend_message(&self, message: NewMessage) -> HistoryResult<Conversation> {
        message.validate()?;

        let mut clock = self.lock.write().map_err(|_| HistoryError::LockPoisoned)?;
        let now = clock.tick();
        self.conns.with_writer(|conn| {
            let tx = conn.transaction()?;
            let conversation = self
                .find_conversation(&tx, message.conversation_id)?
                .ok_or_else(|| {
                    HistoryError::NotFound(format!("conversation {}", message.conversation_id))
                })?;

            if let Some(row_id) =
                self.find_message_row(&tx, message.conversation_id, message.message_id)?
            {
                tx.execute(
                    &format!(
                        "UPDATE {} SET feedback = ?1, comment = ?2, updated_at = ?3 WHERE id = ?4",
                        self.messages
                    ),
                    rusqlite::params![message.feedback, message.comment, now, row_id],
                )?;
                debug!(
                    "Amended message {} in conversation {}",
                    message.message_id, message.conversation_id
                );
            } else {
                self.check_placement(&tx, &message)?;
                let row_id = self.insert_message(&tx, &message, now)?;
                debug!(
                    "Appended message {} (row {row_id}) to conversation {}",
                    message.message_id, message.conversation_id
                );
            }

            tx.commit()?;
            Ok(conversation)
        })
    }

    // The write guard spans the whole transaction so commit order follows the clock.
    #[allow(clippy::significant_drop_tightening)]
    fn rename_conversation(
        &self,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
        name: &str,
    ) -> HistoryResult<Conversation> {
        let mut clock = self.lock.write().map_err(|_| HistoryError::LockPoisoned)?;
        let now = clock.tick();
        self.conns.with_writer(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                &format!(
                    "UPDATE {} SET name = ?1, updated_at = ?2
                     WHERE conversation_id = ?3 AND user_id = ?4",
                    self.conversations
                ),
                rusqlite::params![name, now, conversation_id, owner_id],
            )?;
            if changed == 0 {
                return Err(HistoryError::NotFound(format!(
                    "conversation {conversation_id}"
                )));
            }
            let conversation = self
                .find_conversation(&tx, conversation_id)?
                .ok_or_else(|| HistoryError::NotFound(format!("conversation {conversation_id}")))?;
            tx.commit()?;
            Ok(conversation)
        })
    }

    fn get_conversation(
        &self,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
    ) -> HistoryResult<Option<Conversation>> {
        let _guard = self.lock.read().map_err(|_| HistoryError::LockPoisoned)?;
        self.conns
            .with_reader(|conn| self.find_owned_conversation(conn, owner_id, conversation_id))
    }

    fn list_conversations_for_owner(&self, owner_id: &OwnerId) -> HistoryResult<Vec<Conversation>> {
        let _guard = self.lock.read().map_err(|_| HistoryError::LockPoisoned)?;
        self.conns.with_reader(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM {} WHERE user_id = ?1 ORDER BY id",
                self.conversations
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![owner_id], conversation_from_row)?
                .collect::<Result<Vec<_>, rusqlite::Error>>()?;
            Ok(rows)
        })
    }

    fn list_messages_for_conversation(
        &self,
        owner_id: &OwnerId,
        conversation_id: ConversationId,
    ) -> HistoryResult<Vec<Message>> {
        let _guard = self.lock.read().map_err(|_| HistoryError::LockPoisoned)?;
        self.conns.with_reader(|conn| {
            if self
                .find_owned_conversation(conn, owner_id, conversation_id)?
                .is_none()
            {
                return Ok(Vec::new());
            }
            Self::query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM {} WHERE conversation_id = ?1 ORDER BY id",
                    self.messages
                ),
                rusqlite::params![conversation_id],
            )
        })
    }

    fn list_all_messages(&self) -> HistoryResult<Vec<Message>> {
        let _guard = self.lock.read().map_err(|_| HistoryError::LockPoisoned)?;
        self.conns.with_reader(|conn| {
            Self::query_messages(
                conn,
                &format!("SELECT {MESSAGE_COLUMNS} FROM {} ORDER BY id", self.messages),
                [],
            )
        })
    }
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        row_id: row.get(0)?,
        owner_id: row.get(1)?,
        conversation_id: row.get(2)?,
        name: row.get(3)?,
        created_at: millis_to_datetime(4, row.get(4)?)?,
        updated_at: millis_to_datetime(5, row.get(5)?)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        row_id: row.get(0)?,
        conversation_id: row.get(1)?,
        message_id: row.get(2)?,
        parent_id: row.get(3)?,
        model_name: row.get(4)?,
        content: row.get(5)?,
        role: row.get(6)?,
        response_time: row.get(7)?,
        feedback: row.get(8)?,
        comment: row.get(9)?,
        created_at: millis_to_datetime(10, row.get(10)?)?,
        updated_at: millis_to_datetime(11, row.get(11)?)?,
    })
}
