use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::error::Result;

/// Open a connection with the pragmas every repository relies on.
///
/// `foreign_keys` is per-connection in SQLite, so each repository's
/// connection must go through here for cascades to fire.
pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema applied. Used by tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Named in-memory database shared by every connection opened with the same
/// name in this process, so several repositories can see the same tables.
/// Used by tests; the data lives as long as one of the connections does.
pub fn open_shared_memory(name: &str) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        format!("file:{name}?mode=memory&cache=shared"),
        rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    init_db(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(())
}

/// Initialise all tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_api_keys_table(conn)?;
    create_personas_table(conn)?;
    create_chatrooms_table(conn)?;
    create_enrolled_personas_table(conn)?;
    create_messages_table(conn)?;
    Ok(())
}

fn create_api_keys_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS api_keys (
            id          TEXT PRIMARY KEY,
            user_id     TEXT,
            api_key     TEXT NOT NULL,
            description TEXT,
            token_used  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_api_keys_key
            ON api_keys(api_key);",
    )?;
    Ok(())
}

/// Personas must point at an api_keys row; deleting a key that is still
/// referenced fails with a constraint error.
fn create_personas_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS personas (
            id            TEXT PRIMARY KEY,
            user_id       TEXT,
            name          TEXT NOT NULL,
            description   TEXT,
            system_prompt TEXT NOT NULL,
            model_used    TEXT NOT NULL,
            api_key_id    TEXT NOT NULL REFERENCES api_keys(id),
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn create_chatrooms_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chatrooms (
            id          TEXT PRIMARY KEY,
            user_id     TEXT,
            title       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// Join table behind `Chatroom::persona_ids`. Rows go away with either side.
fn create_enrolled_personas_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chatroom_enrolled_personas (
            chatroom_id TEXT NOT NULL REFERENCES chatrooms(id) ON DELETE CASCADE,
            persona_id  TEXT NOT NULL REFERENCES personas(id) ON DELETE CASCADE,
            enrolled_at TEXT NOT NULL,
            PRIMARY KEY (chatroom_id, persona_id)
        );",
    )?;
    Ok(())
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chatroom_messages (
            id          TEXT PRIMARY KEY,
            chatroom_id TEXT NOT NULL REFERENCES chatrooms(id) ON DELETE CASCADE,
            role        TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
            content     TEXT NOT NULL,
            persona_id  TEXT REFERENCES personas(id) ON DELETE SET NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_chatroom
            ON chatroom_messages(chatroom_id, created_at);",
    )?;
    Ok(())
}

/// Lock a repository connection. A poisoned lock still guards a usable
/// connection (SQLite rolls back the interrupted statement), so recover it.
pub(crate) fn lock(db: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Microsecond RFC3339 timestamp; rows created back to back still sort.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// `?1, ?2, ...` for an `IN (...)` clause of `n` parameters.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
