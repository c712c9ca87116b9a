use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::db;
use crate::error::{Result, StoreError};
use crate::types::{ApiKey, NewApiKey};

const COLUMNS: &str = "id, user_id, api_key, description, token_used, created_at";

/// CRUD over the `api_keys` table.
pub struct ApiKeyRepo {
    db: Mutex<Connection>,
}

impl ApiKeyRepo {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    #[instrument(skip(self, new), fields(user_id = ?new.user_id))]
    pub fn create(&self, new: NewApiKey) -> Result<ApiKey> {
        let api_key = new.api_key.trim();
        if api_key.is_empty() {
            return Err(StoreError::blank("api_key"));
        }

        let key = ApiKey {
            id: db::new_id(),
            user_id: new.user_id,
            api_key: api_key.to_string(),
            description: new.description,
            token_used: 0,
            created_at: db::now(),
        };

        let db = db::lock(&self.db);
        db.execute(
            "INSERT INTO api_keys (id, user_id, api_key, description, token_used, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                key.id,
                key.user_id,
                key.api_key,
                key.description,
                key.token_used,
                key.created_at
            ],
        )
        .map_err(StoreError::from_write)?;
        debug!(id = %key.id, "api key stored");
        Ok(key)
    }

    pub fn list(&self) -> Result<Vec<ApiKey>> {
        let db = db::lock(&self.db);
        let mut stmt = db.prepare(&format!(
            "SELECT {COLUMNS} FROM api_keys ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], row_to_api_key)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete every record carrying this secret value.
    #[instrument(skip_all)]
    pub fn delete_by_key(&self, api_key: &str) -> Result<()> {
        let db = db::lock(&self.db);
        let rows_changed = db
            .execute(
                "DELETE FROM api_keys WHERE api_key = ?1",
                rusqlite::params![api_key],
            )
            .map_err(StoreError::from_write)?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound {
                entity: "api key",
                id: mask(api_key),
            });
        }
        Ok(())
    }
}

/// Keep secrets out of error messages and logs.
fn mask(api_key: &str) -> String {
    let tail: String = api_key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{tail}")
}

fn row_to_api_key(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKey> {
    Ok(ApiKey {
        id: row.get(0)?,
        user_id: row.get(1)?,
        api_key: row.get(2)?,
        description: row.get(3)?,
        token_used: row.get(4)?,
        created_at: row.get(5)?,
    })
}
