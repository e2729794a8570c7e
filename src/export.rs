use crate::config::AppConfig;
use crate::database::Database;
use crate::error::AppResult;
use crate::models::{ChatSession, Sender, YesNo};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed output artifact; each run overwrites the previous one.
pub const TRAINING_DATA_FILE: &str = "training_data.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_accurate: Option<YesNo>,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub messages: Vec<TrainingMessage>,
    pub metadata: TrainingMetadata,
}

/// Flattens stored sessions into role/content conversations, preserving
/// message order. User messages keep the user role; everything else is
/// attributed to the assistant.
pub fn to_training_records(sessions: &[ChatSession]) -> Vec<TrainingRecord> {
    sessions
        .iter()
        .map(|session| {
            let messages = session
                .messages
                .iter()
                .map(|msg| TrainingMessage {
                    role: match msg.sender {
                        Sender::User => "user".to_string(),
                        Sender::Bot => "assistant".to_string(),
                    },
                    content: msg.text.clone(),
                })
                .collect();

            TrainingRecord {
                messages,
                metadata: TrainingMetadata {
                    rating: session.feedback.as_ref().and_then(|f| f.rating),
                    is_accurate: session.feedback.as_ref().and_then(|f| f.is_accurate),
                    timestamp: session.created_at,
                },
            }
        })
        .collect()
}

/// Run-to-completion export: reads every chat session newest first and
/// writes the whole set as one pretty-printed JSON document. Any failure is
/// left to the caller, which treats it as fatal.
pub fn run(config: &AppConfig, output_path: &Path) -> AppResult<usize> {
    let database = Database::new(&config.database.path)?;
    let sessions = database.get_all_chat_sessions()?;
    tracing::info!("Found {} chat sessions", sessions.len());

    let records = to_training_records(&sessions);
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(output_path, json)?;

    tracing::info!(
        "Exported {} records to {}",
        records.len(),
        output_path.display()
    );
    Ok(records.len())
}
