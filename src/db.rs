//! Database operations for chat history

use crate::models::ChatMessage;
use crate::paths::get_db_path;
use rusqlite::{params, Connection};
use std::path::Path;

/// Initializes the SQLite database at the default location, creating tables
/// if needed
pub fn init_database() -> Result<Connection, String> {
    open_database(&get_db_path()?)
}

/// Opens the SQLite database at the given path, creating tables if needed
pub fn open_database(db_path: &Path) -> Result<Connection, String> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chat_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL
        )",
        [],
    )
    .map_err(|e| format!("Failed to create table: {}", e))?;

    Ok(conn)
}

/// Stores a chat message in the database
pub fn store_chat_message(
    conn: &Connection,
    timestamp: &str,
    role: &str,
    content: &str,
) -> Result<(), String> {
    conn.execute(
        "INSERT INTO chat_history (timestamp, role, content) VALUES (?1, ?2, ?3)",
        params![timestamp, role, content],
    )
    .map_err(|e| format!("Failed to store message: {}", e))?;
    Ok(())
}

/// Retrieves the most recent chat messages, in chronological order
pub fn get_chat_history(conn: &Connection, limit: i64) -> Result<Vec<ChatMessage>, String> {
    let mut stmt = conn
        .prepare("SELECT id, timestamp, role, content FROM chat_history ORDER BY id DESC LIMIT ?1")
        .map_err(|e| format!("Failed to prepare query: {}", e))?;

    let messages = stmt
        .query_map(params![limit], |row| {
            Ok(ChatMessage {
                id: Some(row.get(0)?),
                timestamp: row.get(1)?,
                role: row.get(2)?,
                content: row.get(3)?,
            })
        })
        .map_err(|e| format!("Failed to query: {}", e))?;

    let mut result: Vec<ChatMessage> = messages.filter_map(|m| m.ok()).collect();

    // Reverse to get chronological order
    result.reverse();
    Ok(result)
}

/// Clears all chat history from the database
pub fn clear_chat_history(conn: &Connection) -> Result<(), String> {
    conn.execute("DELETE FROM chat_history", [])
        .map_err(|e| format!("Failed to clear history: {}", e))?;
    Ok(())
}
