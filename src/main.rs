// Prevents additional console window on Windows in release
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Module declarations
mod chat;
mod db;
mod flows;
mod models;
mod paths;
mod prompts;

use chat::{run_submission, SubmissionOutcome};
use flows::OpenRouterFlows;
use models::ChatMessage;
use paths::{clear_app_data, get_llm_config_path};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tauri::{command, AppHandle};

// ============ LLM Configuration ============

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    pub openrouter_api_key: Option<String>,
}

fn default_model() -> String {
    "openai/chatgpt-4o-latest".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            openrouter_api_key: None,
        }
    }
}

fn load_llm_config_from(config_path: &Path) -> Result<LlmConfig, String> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read LLM config: {}", e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse LLM config: {}", e))
    } else {
        Ok(LlmConfig::default())
    }
}

fn save_llm_config_to(config_path: &Path, config: &LlmConfig) -> Result<(), String> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory: {}", e))?;
    }
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize LLM config: {}", e))?;
    std::fs::write(config_path, content).map_err(|e| format!("Failed to save LLM config: {}", e))
}

fn load_llm_config() -> Result<LlmConfig, String> {
    load_llm_config_from(&get_llm_config_path()?)
}

fn save_llm_config(config: &LlmConfig) -> Result<(), String> {
    save_llm_config_to(&get_llm_config_path()?, config)
}

// ============ Built-in API Key Support ============

/// XOR key for deobfuscation (must match build.rs)
const XOR_KEY: [u8; 16] = [
    0x4d, 0x61, 0x74, 0x68, 0x43, 0x68, 0x61, 0x74, 0x53, 0x65, 0x63, 0x72, 0x65, 0x74, 0x21,
    0x21,
];

/// Compile-time embedded obfuscated API key (hex-encoded)
const OBFUSCATED_API_KEY: &str = env!("OBFUSCATED_API_KEY");

/// Whether a built-in API key was provided at compile time
const HAS_BUILTIN_KEY: &str = env!("HAS_BUILTIN_KEY");

/// Deobfuscate the hex-encoded XOR-obfuscated API key
fn deobfuscate_api_key(hex_encoded: &str) -> Option<String> {
    if hex_encoded.is_empty() {
        return None;
    }

    // Decode hex string to bytes
    let obfuscated: Vec<u8> = (0..hex_encoded.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(hex_encoded.get(i..i + 2)?, 16).ok())
        .collect();

    if obfuscated.is_empty() {
        return None;
    }

    // XOR deobfuscate
    let deobfuscated: Vec<u8> = obfuscated
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ XOR_KEY[i % XOR_KEY.len()])
        .collect();

    String::from_utf8(deobfuscated).ok()
}

/// Get the built-in API key if one was embedded at compile time
fn get_builtin_api_key() -> Option<String> {
    if HAS_BUILTIN_KEY == "1" {
        deobfuscate_api_key(OBFUSCATED_API_KEY)
    } else {
        None
    }
}

// ============ API Key Commands ============

#[command]
async fn save_api_key(key: String) -> Result<(), String> {
    info!("[save_api_key] Saving OpenRouter API key");
    let mut config = load_llm_config()?;
    config.openrouter_api_key = Some(key);
    save_llm_config(&config)?;
    info!("[save_api_key] OpenRouter API key saved successfully");
    Ok(())
}

#[command]
async fn get_api_key() -> Result<Option<String>, String> {
    // Built-in key (compile-time embedded) takes precedence
    if let Some(builtin_key) = get_builtin_api_key() {
        return Ok(Some(builtin_key));
    }
    let config = load_llm_config()?;
    Ok(config.openrouter_api_key)
}

#[command]
async fn has_api_key() -> Result<bool, String> {
    if get_builtin_api_key().is_some() {
        return Ok(true);
    }
    let config = load_llm_config()?;
    Ok(config.openrouter_api_key.is_some())
}

#[command]
async fn set_model(model: String) -> Result<(), String> {
    info!("[set_model] Switching model to {}", model);
    let mut config = load_llm_config()?;
    config.model = model;
    save_llm_config(&config)
}

// ============ Chat Commands ============

/// Whether a submission is currently in flight. A second submission while
/// one is outstanding is rejected, never queued, so transcript writes cannot
/// interleave.
static SUBMISSION_IN_FLIGHT: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub outcome: SubmissionOutcome,
    pub messages: Vec<ChatMessage>,
}

#[command]
async fn ask_question(question: String) -> Result<AskResponse, String> {
    let config = load_llm_config()?;
    let api_key = get_builtin_api_key()
        .or(config.openrouter_api_key)
        .ok_or_else(|| "Please enter and save your API key first.".to_string())?;

    if question.trim().is_empty() {
        return Err("Please enter a math question.".to_string());
    }

    if SUBMISSION_IN_FLIGHT
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("[ask_question] Rejecting submission while another is in flight");
        return Err("A question is already being processed.".to_string());
    }

    info!("[ask_question] Running submission ({} chars)", question.len());
    let flows = OpenRouterFlows::new(api_key, config.model);
    let result = run_submission(&flows, &question).await;
    SUBMISSION_IN_FLIGHT.store(false, Ordering::SeqCst);
    let result = result?;

    // Persist the produced transcript entries with one shared timestamp
    let conn = db::init_database()?;
    let timestamp = chrono::Utc::now().to_rfc3339();
    let mut messages = Vec::with_capacity(result.messages.len());
    for entry in result.messages {
        db::store_chat_message(&conn, &timestamp, &entry.role, &entry.content)?;
        messages.push(ChatMessage {
            id: None,
            timestamp: timestamp.clone(),
            role: entry.role,
            content: entry.content,
        });
    }

    info!("[ask_question] Submission finished: {:?}", result.outcome);
    Ok(AskResponse {
        outcome: result.outcome,
        messages,
    })
}

#[command]
async fn get_chat_history(limit: i64) -> Result<Vec<ChatMessage>, String> {
    let conn = db::init_database()?;
    db::get_chat_history(&conn, limit)
}

#[command]
async fn clear_chat_history() -> Result<(), String> {
    info!("[clear_chat_history] Clearing chat history");
    let conn = db::init_database()?;
    db::clear_chat_history(&conn)
}

#[command]
async fn clear_all_data() -> Result<(), String> {
    info!("[clear_all_data] Clearing all application data");
    clear_app_data()
}

// ============ Misc Commands ============

#[command]
fn log_from_frontend(level: String, message: String) {
    match level.as_str() {
        "error" => error!("[frontend] {}", message),
        "warn" => warn!("[frontend] {}", message),
        _ => info!("[frontend] {}", message),
    }
}

#[command]
fn quit_app(app: AppHandle) {
    info!("[quit_app] Quitting application");
    app.exit(0);
}

fn main() {
    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::new()
                .target(tauri_plugin_log::Target::new(
                    tauri_plugin_log::TargetKind::LogDir {
                        file_name: Some("mathchat.log".into()),
                    },
                ))
                .level(log::LevelFilter::Info)
                .build(),
        )
        .invoke_handler(tauri::generate_handler![
            save_api_key,
            get_api_key,
            has_api_key,
            set_model,
            ask_question,
            get_chat_history,
            clear_chat_history,
            clear_all_data,
            log_from_frontend,
            quit_app,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
