use chrono::{DateTime, Utc};
use hive_shared::models::{canonical_pair, Conversation, Message};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::convert::{get_ts, get_uuid, stored, ts};
use crate::database::Database;
use crate::error::{not_found, Result};

impl Database {
    /// The conversation between `a` and `b`, created on first use.
    pub fn get_or_create_conversation(
        &self,
        a: Uuid,
        b: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Conversation> {
        let (lo, hi) = canonical_pair(a, b);
        let now = ts(&stored(now));
        self.conn().execute(
            "INSERT OR IGNORE INTO conversations (id, user_a_id, user_b_id, last_message_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![Uuid::new_v4().to_string(), lo.to_string(), hi.to_string(), now],
        )?;

        self.conn()
            .query_row(
                "SELECT id, user_a_id, user_b_id, last_message_at, created_at
                 FROM conversations WHERE user_a_id = ?1 AND user_b_id = ?2",
                params![lo.to_string(), hi.to_string()],
                row_to_conversation,
            )
            .map_err(not_found)
    }

    pub fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.conn()
            .query_row(
                "SELECT id, user_a_id, user_b_id, last_message_at, created_at
                 FROM conversations WHERE id = ?1",
                params![id.to_string()],
                row_to_conversation,
            )
            .map_err(not_found)
    }

    /// Conversations of `user_id`, most recently active first.
    pub fn conversations_of(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_a_id, user_b_id, last_message_at, created_at
             FROM conversations
             WHERE user_a_id = ?1 OR user_b_id = ?1
             ORDER BY last_message_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    /// Append a text message and bump the conversation's activity stamp.
    pub fn insert_message(
        &mut self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content: content.to_string(),
            message_type: "text".to_string(),
            is_read: false,
            created_at: stored(now),
        };

        let tx = self.write_tx()?;
        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, content, message_type, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                message.conversation_id.to_string(),
                message.sender_id.to_string(),
                message.content,
                message.message_type,
                message.is_read,
                ts(&message.created_at),
            ],
        )?;
        tx.execute(
            "UPDATE conversations SET last_message_at = ?2 WHERE id = ?1",
            params![conversation_id.to_string(), ts(&message.created_at)],
        )?;
        tx.commit()?;

        Ok(message)
    }

    /// A page of messages in chronological order, `offset` counted back
    /// from the newest.
    pub fn get_messages(&self, conversation_id: Uuid, limit: u32, offset: u32) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, conversation_id, sender_id, content, message_type, is_read, created_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            params![conversation_id.to_string(), limit, offset],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        messages.reverse();
        Ok(messages)
    }

    pub fn last_message(&self, conversation_id: Uuid) -> Result<Option<Message>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, conversation_id, sender_id, content, message_type, is_read, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC
                 LIMIT 1",
                params![conversation_id.to_string()],
                row_to_message,
            )
            .optional()?)
    }

    /// Messages addressed to `reader_id` that are still unread.
    pub fn unread_count(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<u32> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
            params![conversation_id.to_string(), reader_id.to_string()],
            |row| row.get(0),
        )?)
    }

    pub fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<usize> {
        Ok(self.conn().execute(
            "UPDATE messages SET is_read = 1
             WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
            params![conversation_id.to_string(), reader_id.to_string()],
        )?)
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: get_uuid(row, 0)?,
        user_a_id: get_uuid(row, 1)?,
        user_b_id: get_uuid(row, 2)?,
        last_message_at: get_ts(row, 3)?,
        created_at: get_ts(row, 4)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: get_uuid(row, 0)?,
        conversation_id: get_uuid(row, 1)?,
        sender_id: get_uuid(row, 2)?,
        content: row.get(3)?,
        message_type: row.get(4)?,
        is_read: row.get(5)?,
        created_at: get_ts(row, 6)?,
    })
}
