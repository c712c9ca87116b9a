use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::db;
use crate::error::{Result, StoreError};
use crate::types::{Chatroom, ChatroomUpdate, NewChatroom};

const COLUMNS: &str = "id, user_id, title, created_at, updated_at";

/// CRUD over `chatrooms` and their persona enrollments.
pub struct ChatroomRepo {
    db: Mutex<Connection>,
}

impl ChatroomRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Create a chatroom and enroll its personas in the given order.
    /// An unknown persona id fails the whole call with a constraint error.
    #[instrument(skip(self, new), fields(title = %new.title))]
    pub fn create(&self, new: NewChatroom) -> Result<Chatroom> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(StoreError::blank("title"));
        }

        let now = db::now();
        let mut room = Chatroom {
            id: db::new_id(),
            user_id: new.user_id,
            title: title.to_string(),
            persona_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut db = db::lock(&self.db);
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO chatrooms (id, user_id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                room.id,
                room.user_id,
                room.title,
                room.created_at,
                room.updated_at
            ],
        )
        .map_err(StoreError::from_write)?;
        room.persona_ids = enroll(&tx, &room.id, &new.persona_ids)?;
        tx.commit()?;

        debug!(id = %room.id, personas = room.persona_ids.len(), "chatroom created");
        Ok(room)
    }

    pub fn list(&self) -> Result<Vec<Chatroom>> {
        let db = db::lock(&self.db);
        let mut stmt = db.prepare(&format!(
            "SELECT {COLUMNS} FROM chatrooms ORDER BY created_at, id"
        ))?;
        let mut rooms = stmt
            .query_map([], row_to_chatroom)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for room in &mut rooms {
            room.persona_ids = enrolled_ids(&db, &room.id)?;
        }
        Ok(rooms)
    }

    pub fn get(&self, id: &str) -> Result<Option<Chatroom>> {
        let db = db::lock(&self.db);
        get_locked(&db, id)
    }

    /// Rename and/or replace the enrollment set.
    #[instrument(skip(self, update))]
    pub fn update(&self, id: &str, update: ChatroomUpdate) -> Result<Chatroom> {
        let mut db = db::lock(&self.db);
        let mut room = get_locked(&db, id)?.ok_or_else(|| StoreError::NotFound {
            entity: "chatroom",
            id: id.to_string(),
        })?;

        if let Some(title) = update.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(StoreError::blank("title"));
            }
            room.title = title.to_string();
        }
        room.updated_at = db::now();

        let tx = db.transaction()?;
        tx.execute(
            "UPDATE chatrooms SET title = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![room.title, room.updated_at, room.id],
        )
        .map_err(StoreError::from_write)?;
        if let Some(persona_ids) = update.persona_ids {
            tx.execute(
                "DELETE FROM chatroom_enrolled_personas WHERE chatroom_id = ?1",
                rusqlite::params![room.id],
            )?;
            room.persona_ids = enroll(&tx, &room.id, &persona_ids)?;
        }
        tx.commit()?;
        Ok(room)
    }

    /// Delete a chatroom together with its enrollments and messages.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<()> {
        let db = db::lock(&self.db);
        let rows_changed = db
            .execute("DELETE FROM chatrooms WHERE id = ?1", rusqlite::params![id])
            .map_err(StoreError::from_write)?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound {
                entity: "chatroom",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

/// Insert enrollment rows, skipping repeated ids. Returns the ids enrolled.
fn enroll(conn: &Connection, chatroom_id: &str, persona_ids: &[String]) -> Result<Vec<String>> {
    let mut enrolled: Vec<String> = Vec::with_capacity(persona_ids.len());
    for persona_id in persona_ids {
        if enrolled.contains(persona_id) {
            continue;
        }
        conn.execute(
            "INSERT INTO chatroom_enrolled_personas (chatroom_id, persona_id, enrolled_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![chatroom_id, persona_id, db::now()],
        )
        .map_err(StoreError::from_write)?;
        enrolled.push(persona_id.clone());
    }
    Ok(enrolled)
}

fn enrolled_ids(db: &Connection, chatroom_id: &str) -> Result<Vec<String>> {
    let mut stmt = db.prepare(
        "SELECT persona_id FROM chatroom_enrolled_personas
         WHERE chatroom_id = ?1 ORDER BY enrolled_at, rowid",
    )?;
    let ids = stmt
        .query_map(rusqlite::params![chatroom_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

fn get_locked(db: &Connection, id: &str) -> Result<Option<Chatroom>> {
    let room = db
        .query_row(
            &format!("SELECT {COLUMNS} FROM chatrooms WHERE id = ?1"),
            rusqlite::params![id],
            row_to_chatroom,
        )
        .optional()?;
    match room {
        Some(mut room) => {
            room.persona_ids = enrolled_ids(db, &room.id)?;
            Ok(Some(room))
        }
        None => Ok(None),
    }
}

fn row_to_chatroom(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chatroom> {
    Ok(Chatroom {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        persona_ids: Vec::new(),
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_keys::ApiKeyRepo;
    use crate::personas::PersonaRepo;
    use crate::types::{NewApiKey, NewPersona};

    struct Fixture {
        personas: PersonaRepo,
        rooms: ChatroomRepo,
        persona_ids: Vec<String>,
        // Keeps the shared in-memory database alive.
        _keys: ApiKeyRepo,
    }

    fn fixture(name: &str, persona_count: usize) -> Fixture {
        let keys = ApiKeyRepo::new(db::open_shared_memory(name).unwrap());
        let personas = PersonaRepo::new(db::open_shared_memory(name).unwrap());
        let rooms = ChatroomRepo::new(db::open_shared_memory(name).unwrap());

        let key_id = keys
            .create(NewApiKey {
                user_id: None,
                api_key: "AIza-rooms".to_string(),
                description: None,
            })
            .unwrap()
            .id;
        let persona_ids = (0..persona_count)
            .map(|i| {
                personas
                    .create(NewPersona {
                        user_id: None,
                        name: format!("p{i}"),
                        description: None,
                        system_prompt: "Answer briefly.".to_string(),
                        model_used: "gemini-2.0-flash".to_string(),
                        api_key_id: key_id.clone(),
                    })
                    .unwrap()
                    .id
            })
            .collect();

        Fixture {
            personas,
            rooms,
            persona_ids,
            _keys: keys,
        }
    }

    fn new_room(title: &str, persona_ids: Vec<String>) -> NewChatroom {
        NewChatroom {
            user_id: None,
            title: title.to_string(),
            persona_ids,
        }
    }

    #[test]
    fn create_keeps_enrollment_order() {
        let f = fixture("rooms_order", 3);
        let wanted = vec![
            f.persona_ids[2].clone(),
            f.persona_ids[0].clone(),
            f.persona_ids[2].clone(),
        ];

        let room = f.rooms.create(new_room("Standup", wanted)).unwrap();
        let expected = vec![f.persona_ids[2].clone(), f.persona_ids[0].clone()];
        assert_eq!(room.persona_ids, expected);

        let fetched = f.rooms.get(&room.id).unwrap().unwrap();
        assert_eq!(fetched, room);
        assert_eq!(f.rooms.list().unwrap(), vec![room]);
    }

    #[test]
    fn unknown_persona_rolls_back_creation() {
        let f = fixture("rooms_unknown_persona", 1);
        let err = f
            .rooms
            .create(new_room("Broken", vec!["ghost".to_string()]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(f.rooms.list().unwrap().is_empty());
    }

    #[test]
    fn blank_title_is_rejected() {
        let f = fixture("rooms_blank_title", 0);
        let err = f.rooms.create(new_room("   ", vec![])).unwrap_err();
        assert!(matches!(err, StoreError::Invalid { field: "title", .. }));
    }

    #[test]
    fn update_replaces_enrollments() {
        let f = fixture("rooms_update", 2);
        let room = f
            .rooms
            .create(new_room("Old", vec![f.persona_ids[0].clone()]))
            .unwrap();

        let updated = f
            .rooms
            .update(
                &room.id,
                ChatroomUpdate {
                    title: Some("New".to_string()),
                    persona_ids: Some(vec![f.persona_ids[1].clone()]),
                },
            )
            .unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.persona_ids, vec![f.persona_ids[1].clone()]);
        assert_eq!(f.rooms.get(&room.id).unwrap().unwrap(), updated);

        let title_only = f
            .rooms
            .update(
                &room.id,
                ChatroomUpdate {
                    title: Some("Newer".to_string()),
                    persona_ids: None,
                },
            )
            .unwrap();
        assert_eq!(title_only.persona_ids, vec![f.persona_ids[1].clone()]);
    }

    #[test]
    fn deleting_persona_drops_enrollment() {
        let f = fixture("rooms_persona_cascade", 2);
        let room = f
            .rooms
            .create(new_room("Pair", f.persona_ids.clone()))
            .unwrap();

        f.personas.delete(&f.persona_ids[0]).unwrap();
        let fetched = f.rooms.get(&room.id).unwrap().unwrap();
        assert_eq!(fetched.persona_ids, vec![f.persona_ids[1].clone()]);
    }

    #[test]
    fn delete_then_missing() {
        let f = fixture("rooms_delete", 0);
        let room = f.rooms.create(new_room("Temp", vec![])).unwrap();

        f.rooms.delete(&room.id).unwrap();
        assert!(f.rooms.get(&room.id).unwrap().is_none());
        assert!(matches!(
            f.rooms.delete(&room.id),
            Err(StoreError::NotFound { entity: "chatroom", .. })
        ));
        assert!(matches!(
            f.rooms.update(&room.id, ChatroomUpdate::default()),
            Err(StoreError::NotFound { .. })
        ));
    }
}
