use std::sync::Mutex;

use gemchat_core::types::Persona;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::db;
use crate::error::{Result, StoreError};
use crate::types::{NewPersona, PersonaUpdate};

const COLUMNS: &str = "id, user_id, name, description, system_prompt, model_used, api_key_id, \
                       created_at, updated_at";

/// CRUD over the `personas` table.
///
/// Every persona leaving this repository is in the canonical
/// [`Persona`] shape: `api_key_id` is the bare id of the linked key.
pub struct PersonaRepo {
    db: Mutex<Connection>,
}

impl PersonaRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    #[instrument(skip(self, new), fields(name = %new.name))]
    pub fn create(&self, new: NewPersona) -> Result<Persona> {
        let name = required("name", &new.name)?;
        let system_prompt = required("system_prompt", &new.system_prompt)?;
        let model_used = required("model_used", &new.model_used)?;
        let api_key_id = required("api_key_id", &new.api_key_id)?;

        let now = db::now();
        let persona = Persona {
            id: db::new_id(),
            user_id: new.user_id,
            name,
            description: new.description,
            system_prompt,
            model_used,
            api_key_id,
            created_at: now.clone(),
            updated_at: now,
        };

        let db = db::lock(&self.db);
        insert(&db, &persona)?;
        debug!(id = %persona.id, "persona created");
        Ok(persona)
    }

    pub fn list(&self) -> Result<Vec<Persona>> {
        let db = db::lock(&self.db);
        let mut stmt = db.prepare(&format!(
            "SELECT {COLUMNS} FROM personas ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], row_to_persona)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get(&self, id: &str) -> Result<Option<Persona>> {
        let db = db::lock(&self.db);
        get_locked(&db, id)
    }

    /// Batch lookup. Unknown ids are skipped; the result is ordered by
    /// creation time (then id), not by the order of `ids`.
    #[instrument(skip(self), fields(requested = ids.len()))]
    pub fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Persona>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let db = db::lock(&self.db);
        let mut stmt = db.prepare(&format!(
            "SELECT {COLUMNS} FROM personas WHERE id IN ({}) ORDER BY created_at, id",
            db::placeholders(ids.len())
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), row_to_persona)?;
        let personas = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(found = personas.len(), "persona batch lookup");
        Ok(personas)
    }

    /// Apply a partial update and return the stored result.
    #[instrument(skip(self, update))]
    pub fn update(&self, id: &str, update: PersonaUpdate) -> Result<Persona> {
        let db = db::lock(&self.db);
        let mut persona = get_locked(&db, id)?.ok_or_else(|| StoreError::NotFound {
            entity: "persona",
            id: id.to_string(),
        })?;

        if let Some(name) = update.name {
            persona.name = required("name", &name)?;
        }
        if let Some(description) = update.description {
            persona.description = Some(description);
        }
        if let Some(system_prompt) = update.system_prompt {
            persona.system_prompt = required("system_prompt", &system_prompt)?;
        }
        if let Some(model_used) = update.model_used {
            persona.model_used = required("model_used", &model_used)?;
        }
        if let Some(api_key_id) = update.api_key_id {
            persona.api_key_id = required("api_key_id", &api_key_id)?;
        }
        persona.updated_at = db::now();

        db.execute(
            "UPDATE personas
             SET name = ?1, description = ?2, system_prompt = ?3, model_used = ?4,
                 api_key_id = ?5, updated_at = ?6
             WHERE id = ?7",
            rusqlite::params![
                persona.name,
                persona.description,
                persona.system_prompt,
                persona.model_used,
                persona.api_key_id,
                persona.updated_at,
                persona.id
            ],
        )
        .map_err(StoreError::from_write)?;
        Ok(persona)
    }

    /// Delete a persona. Chatroom enrollments go with it; messages that
    /// referenced it keep their content with `persona_id` cleared.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<()> {
        let db = db::lock(&self.db);
        let rows_changed = db
            .execute("DELETE FROM personas WHERE id = ?1", rusqlite::params![id])
            .map_err(StoreError::from_write)?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound {
                entity: "persona",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

fn insert(db: &Connection, p: &Persona) -> Result<()> {
    db.execute(
        "INSERT INTO personas
         (id, user_id, name, description, system_prompt, model_used, api_key_id,
          created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            p.id,
            p.user_id,
            p.name,
            p.description,
            p.system_prompt,
            p.model_used,
            p.api_key_id,
            p.created_at,
            p.updated_at
        ],
    )
    .map_err(StoreError::from_write)?;
    Ok(())
}

fn get_locked(db: &Connection, id: &str) -> Result<Option<Persona>> {
    let persona = db
        .query_row(
            &format!("SELECT {COLUMNS} FROM personas WHERE id = ?1"),
            rusqlite::params![id],
            row_to_persona,
        )
        .optional()?;
    Ok(persona)
}

/// Rejects blank values; the text is stored exactly as given.
fn required(field: &'static str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(StoreError::blank(field));
    }
    Ok(value.to_string())
}

/// Map a SQLite row to the canonical `Persona`.
fn row_to_persona(row: &rusqlite::Row<'_>) -> rusqlite::Result<Persona> {
    Ok(Persona {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        system_prompt: row.get(4)?,
        model_used: row.get(5)?,
        api_key_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
