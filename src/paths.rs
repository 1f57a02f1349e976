//! Path utilities and file system helpers

use std::path::PathBuf;

/// Gets the application data directory
pub fn get_app_data_dir() -> Result<PathBuf, String> {
    dirs::data_dir()
        .map(|p| p.join("com.mathchat.desktop"))
        .ok_or_else(|| "Could not find app data directory".to_string())
}

/// Clears all application data
pub fn clear_app_data() -> Result<(), String> {
    let app_dir = get_app_data_dir()?;
    if app_dir.exists() {
        std::fs::remove_dir_all(&app_dir)
            .map_err(|e| format!("Failed to clear app data: {}", e))?;
    }
    Ok(())
}

/// Gets the chat history database file path
pub fn get_db_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join("chat_history.db"))
}

/// Gets the LLM configuration file path
pub fn get_llm_config_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join(".llm_config.json"))
}
