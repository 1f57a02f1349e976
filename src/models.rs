//! Data models and structures used throughout the application

use serde::{Deserialize, Serialize};

/// Represents a single chat message stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Option<i64>,
    pub timestamp: String,
    pub role: String,
    pub content: String,
}
