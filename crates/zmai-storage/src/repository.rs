//! SQLite-backed conversation store.
//!
//! Message logs live in `conversations` as a JSON array per row; metadata
//! lives in `conversations_meta` under the same id. Every write that touches
//! both tables runs in one transaction.

use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use zmai_core::error::ZmaiError;
use zmai_core::types::{
    generate_conversation_id, validate_conversation_id, Conversation, ConversationMeta,
    ConversationSummary, Message, NewConversation, DEFAULT_COLOR, DEFAULT_TITLE,
};

use crate::db::Database;
use crate::store::ConversationStore;

/// Conversation store over the shared SQLite `Database`.
pub struct SqliteConversationStore {
    db: Arc<Database>,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert the default metadata record for `id` unless one exists, then
    /// run `update` and return the resulting record.
    fn update_meta<F>(&self, id: &str, update: F) -> Result<ConversationMeta, ZmaiError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<usize>,
    {
        validate_conversation_id(id)?;
        self.db.with_transaction(|tx| {
            insert_default_meta(tx, id)?;
            update(tx).map_err(|e| {
                ZmaiError::Storage(format!("Failed to update conversation metadata: {}", e))
            })?;
            load_meta(tx, id)?.ok_or_else(|| {
                ZmaiError::Storage(format!("Metadata for {} vanished during update", id))
            })
        })
    }
}

impl ConversationStore for SqliteConversationStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn create_conversation(&self, new: NewConversation) -> Result<Conversation, ZmaiError> {
        let id = generate_conversation_id();
        let meta = new.into_meta();

        self.db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO conversations (id, messages) VALUES (?1, '[]')",
                rusqlite::params![id],
            )
            .map_err(|e| ZmaiError::Storage(format!("Failed to create conversation: {}", e)))?;
            tx.execute(
                "INSERT INTO conversations_meta (id, title, color, owner_id, search_enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id,
                    meta.title,
                    meta.color,
                    meta.owner_id,
                    meta.search_enabled as i32,
                ],
            )
            .map_err(|e| ZmaiError::Storage(format!("Failed to create conversation: {}", e)))?;
            Ok(())
        })?;

        debug!(conversation_id = %id, "Conversation created");
        Ok(Conversation {
            id,
            messages: Vec::new(),
            meta,
        })
    }

    fn list_conversations(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<ConversationSummary>, ZmaiError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, color, owner_id FROM conversations_meta
                     WHERE (?1 IS NULL OR owner_id = ?1)
                     ORDER BY rowid ASC",
                )
                .map_err(|e| ZmaiError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![owner_id], |row| {
                    Ok(ConversationSummary {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        color: row.get(2)?,
                        owner_id: row.get(3)?,
                    })
                })
                .map_err(|e| ZmaiError::Storage(e.to_string()))?;

            let mut summaries = Vec::new();
            for row in rows {
                summaries.push(row.map_err(|e| ZmaiError::Storage(e.to_string()))?);
            }
            Ok(summaries)
        })
    }

    fn get_conversation(&self, id: &str) -> Result<Conversation, ZmaiError> {
        validate_conversation_id(id)?;
        self.db.with_conn(|conn| {
            let messages = load_messages(conn, id)?;
            let meta = load_meta(conn, id)?.unwrap_or_default();
            Ok(Conversation {
                id: id.to_string(),
                messages,
                meta,
            })
        })
    }

    fn exists(&self, id: &str) -> Result<bool, ZmaiError> {
        validate_conversation_id(id)?;
        self.db.with_conn(|conn| Ok(load_meta(conn, id)?.is_some()))
    }

    fn append_turn(
        &self,
        id: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<(), ZmaiError> {
        validate_conversation_id(id)?;
        self.db.with_transaction(|tx| {
            let mut messages = load_messages(tx, id)?;
            messages.push(user.clone());
            messages.push(assistant.clone());
            let encoded = serde_json::to_string(&messages)?;

            tx.execute(
                "INSERT INTO conversations (id, messages, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(id) DO UPDATE SET
                     messages = excluded.messages,
                     updated_at = excluded.updated_at",
                rusqlite::params![id, encoded],
            )
            .map_err(|e| ZmaiError::Storage(format!("Failed to save turn: {}", e)))?;

            insert_default_meta(tx, id)?;
            debug!(conversation_id = %id, total = messages.len(), "Turn appended");
            Ok(())
        })
    }

    fn rename_conversation(&self, id: &str, title: &str) -> Result<ConversationMeta, ZmaiError> {
        self.update_meta(id, |conn| {
            conn.execute(
                "UPDATE conversations_meta SET title = ?2 WHERE id = ?1",
                rusqlite::params![id, title],
            )
        })
    }

    fn set_color(&self, id: &str, color: &str) -> Result<ConversationMeta, ZmaiError> {
        self.update_meta(id, |conn| {
            conn.execute(
                "UPDATE conversations_meta SET color = ?2 WHERE id = ?1",
                rusqlite::params![id, color],
            )
        })
    }

    fn set_search_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<ConversationMeta, ZmaiError> {
        self.update_meta(id, |conn| {
            conn.execute(
                "UPDATE conversations_meta SET search_enabled = ?2 WHERE id = ?1",
                rusqlite::params![id, enabled as i32],
            )
        })
    }

    fn delete_conversation(&self, id: &str) -> Result<(), ZmaiError> {
        validate_conversation_id(id)?;
        self.db.with_transaction(|tx| {
            tx.execute(
                "DELETE FROM conversations WHERE id = ?1",
                rusqlite::params![id],
            )
            .map_err(|e| ZmaiError::Storage(format!("Failed to delete conversation: {}", e)))?;
            tx.execute(
                "DELETE FROM conversations_meta WHERE id = ?1",
                rusqlite::params![id],
            )
            .map_err(|e| ZmaiError::Storage(format!("Failed to delete conversation: {}", e)))?;
            Ok(())
        })
    }
}

fn load_messages(conn: &Connection, id: &str) -> Result<Vec<Message>, ZmaiError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT messages FROM conversations WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| ZmaiError::Storage(format!("Failed to load history: {}", e)))?;

    match raw {
        Some(text) if !text.is_empty() => serde_json::from_str(&text).map_err(|e| {
            ZmaiError::Storage(format!("Corrupt message log for {}: {}", id, e))
        }),
        _ => Ok(Vec::new()),
    }
}

fn load_meta(conn: &Connection, id: &str) -> Result<Option<ConversationMeta>, ZmaiError> {
    conn.query_row(
        "SELECT title, color, owner_id, search_enabled FROM conversations_meta WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(ConversationMeta {
                title: row.get(0)?,
                color: row.get(1)?,
                owner_id: row.get(2)?,
                search_enabled: row.get::<_, i64>(3)? != 0,
            })
        },
    )
    .optional()
    .map_err(|e| ZmaiError::Storage(format!("Failed to load metadata: {}", e)))
}

fn insert_default_meta(conn: &Connection, id: &str) -> Result<(), ZmaiError> {
    conn.execute(
        "INSERT OR IGNORE INTO conversations_meta (id, title, color, owner_id, search_enabled)
         VALUES (?1, ?2, ?3, NULL, 0)",
        rusqlite::params![id, DEFAULT_TITLE, DEFAULT_COLOR],
    )
    .map_err(|e| ZmaiError::Storage(format!("Failed to create metadata: {}", e)))?;
    Ok(())
}
