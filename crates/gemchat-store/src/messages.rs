use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::db;
use crate::error::{Result, StoreError};
use crate::types::{ChatroomMessage, MessageRole, NewMessage};

/// Append-only log of chatroom messages.
pub struct MessageRepo {
    db: Mutex<Connection>,
}

impl MessageRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    #[instrument(skip(self, new), fields(chatroom_id = %new.chatroom_id, role = %new.role))]
    pub fn create(&self, new: NewMessage) -> Result<ChatroomMessage> {
        let db = db::lock(&self.db);
        let room_exists = db
            .query_row(
                "SELECT 1 FROM chatrooms WHERE id = ?1",
                rusqlite::params![new.chatroom_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !room_exists {
            return Err(StoreError::NotFound {
                entity: "chatroom",
                id: new.chatroom_id,
            });
        }

        let msg = ChatroomMessage {
            id: db::new_id(),
            chatroom_id: new.chatroom_id,
            role: new.role,
            content: new.content,
            persona_id: new.persona_id,
            created_at: db::now(),
        };
        db.execute(
            "INSERT INTO chatroom_messages (id, chatroom_id, role, content, persona_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                msg.id,
                msg.chatroom_id,
                msg.role.to_string(),
                msg.content,
                msg.persona_id,
                msg.created_at
            ],
        )
        .map_err(StoreError::from_write)?;
        debug!(id = %msg.id, "message stored");
        Ok(msg)
    }

    /// Messages of one chatroom, oldest first.
    pub fn list_by_chatroom(&self, chatroom_id: &str) -> Result<Vec<ChatroomMessage>> {
        let db = db::lock(&self.db);
        let mut stmt = db.prepare(
            "SELECT id, chatroom_id, role, content, persona_id, created_at
             FROM chatroom_messages
             WHERE chatroom_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(rusqlite::params![chatroom_id], row_to_message)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatroomMessage> {
    let role: String = row.get(2)?;
    let role = role.parse::<MessageRole>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::<dyn std::error::Error + Send + Sync>::from(e),
        )
    })?;
    Ok(ChatroomMessage {
        id: row.get(0)?,
        chatroom_id: row.get(1)?,
        role,
        content: row.get(3)?,
        persona_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}
