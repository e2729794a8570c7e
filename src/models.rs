use crate::error::{AppError, AppResult};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_MESSAGE_LEN: usize = 1000;

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("valid email regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Read,
    Responded,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::Read => "read",
            FeedbackStatus::Responded => "responded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(FeedbackStatus::Pending),
            "read" => Some(FeedbackStatus::Read),
            "responded" => Some(FeedbackStatus::Responded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub status: FeedbackStatus,
    pub email_sent: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Feedback {
    /// Builds a new record from raw submission fields, applying the same
    /// validation the storage schema enforces: trim, length limits, a basic
    /// email shape check, and lower-casing of the address.
    pub fn new(name: &str, email: &str, message: &str) -> AppResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "Name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }

        let email = validate_email(email)?;

        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("Message is required".to_string()));
        }
        if message.len() > MAX_MESSAGE_LEN {
            return Err(AppError::Validation(format!(
                "Message cannot exceed {MAX_MESSAGE_LEN} characters"
            )));
        }

        let now = Utc::now().timestamp();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email,
            message: message.to_string(),
            status: FeedbackStatus::Pending,
            email_sent: false,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Re-runs the schema-level field checks against an existing record, used by
/// updates so the contract holds regardless of what the backing store allowed.
pub fn validate_feedback_fields(feedback: &Feedback) -> AppResult<()> {
    Feedback::new(&feedback.name, &feedback.email, &feedback.message).map(|_| ())
}

pub fn validate_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if !email_regex().is_match(&email) {
        return Err(AppError::Validation(
            "Please provide a valid email address".to_string(),
        ));
    }
    Ok(email)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Sender::User),
            "bot" => Some(Sender::Bot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "yes" => Some(YesNo::Yes),
            "no" => Some(YesNo::No),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_accurate: Option<YesNo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fast: Option<YesNo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub would_use_again: Option<YesNo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<SessionFeedback>,
    pub created_at: i64,
}

impl ChatSession {
    pub fn new(messages: Vec<ChatMessage>, feedback: Option<SessionFeedback>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            messages,
            feedback,
            created_at: Utc::now().timestamp(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateFeedbackRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

impl CreateFeedbackRequest {
    /// Presence check before any trimming, mirroring the storage schema's
    /// required-field constraints. Empty strings count as missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.as_deref().unwrap_or("").is_empty() {
            missing.push("name");
        }
        if self.email.as_deref().unwrap_or("").is_empty() {
            missing.push("email");
        }
        if self.message.as_deref().unwrap_or("").is_empty() {
            missing.push("message");
        }
        missing
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFeedbackQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SaveChatRequest {
    pub messages: Option<Vec<IncomingChatMessage>>,
    pub feedback: Option<IncomingSessionFeedback>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingChatMessage {
    pub sender: Option<String>,
    pub text: Option<String>,
    pub timestamp: Option<i64>,
}

impl IncomingChatMessage {
    pub fn validate(&self, index: usize) -> AppResult<ChatMessage> {
        let sender = self
            .sender
            .as_deref()
            .and_then(Sender::parse)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Message {index}: sender must be 'user' or 'bot'"
                ))
            })?;
        let text = self.text.as_deref().unwrap_or("").trim();
        if text.is_empty() {
            return Err(AppError::Validation(format!(
                "Message {index}: text is required"
            )));
        }
        Ok(ChatMessage {
            sender,
            text: text.to_string(),
            timestamp: self.timestamp.unwrap_or_else(|| Utc::now().timestamp()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingSessionFeedback {
    pub is_accurate: Option<String>,
    pub is_fast: Option<String>,
    pub would_use_again: Option<String>,
    pub rating: Option<i64>,
    pub comments: Option<String>,
}

impl IncomingSessionFeedback {
    pub fn validate(&self) -> AppResult<SessionFeedback> {
        let parse_answer = |field: &str, value: &Option<String>| -> AppResult<Option<YesNo>> {
            match value.as_deref() {
                None => Ok(None),
                Some(v) => YesNo::parse(v).map(Some).ok_or_else(|| {
                    AppError::Validation(format!("Feedback {field} must be 'yes' or 'no'"))
                }),
            }
        };

        Ok(SessionFeedback {
            is_accurate: parse_answer("isAccurate", &self.is_accurate)?,
            is_fast: parse_answer("isFast", &self.is_fast)?,
            would_use_again: parse_answer("wouldUseAgain", &self.would_use_again)?,
            // Ratings outside the survey scale are clamped, not rejected.
            rating: self.rating.map(|r| r.clamp(1, 5) as u8),
            comments: self.comments.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackCreatedData {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackCreatedResponse {
    pub success: bool,
    pub message: String,
    pub data: FeedbackCreatedData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub data: Feedback,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackUpdatedResponse {
    pub success: bool,
    pub message: String,
    pub data: Feedback,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackListResponse {
    pub success: bool,
    pub data: Vec<Feedback>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatSessionResponse {
    pub success: bool,
    pub message: String,
    pub data: ChatSession,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    pub uptime: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointListing {
    pub health: String,
    pub feedback: String,
    pub chat: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexResponse {
    pub success: bool,
    pub message: String,
    pub version: String,
    pub endpoints: EndpointListing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_new_trims_and_lowercases() {
        let feedback = Feedback::new("  Amina  ", "  A@Example.COM ", "  Great! ").unwrap();
        assert_eq!(feedback.name, "Amina");
        assert_eq!(feedback.email, "a@example.com");
        assert_eq!(feedback.message, "Great!");
        assert_eq!(feedback.status, FeedbackStatus::Pending);
        assert!(!feedback.email_sent);
    }

    #[test]
    fn feedback_new_rejects_bad_email() {
        assert!(Feedback::new("Amina", "not-an-email", "hello").is_err());
        assert!(Feedback::new("Amina", "a@b", "hello").is_err());
        assert!(Feedback::new("Amina", "", "hello").is_err());
    }

    #[test]
    fn feedback_message_length_boundary() {
        let exactly = "x".repeat(MAX_MESSAGE_LEN);
        assert!(Feedback::new("Amina", "a@example.com", &exactly).is_ok());

        let too_long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(Feedback::new("Amina", "a@example.com", &too_long).is_err());
    }

    #[test]
    fn feedback_name_length_boundary() {
        let exactly = "n".repeat(MAX_NAME_LEN);
        assert!(Feedback::new(&exactly, "a@example.com", "hi").is_ok());
        let too_long = "n".repeat(MAX_NAME_LEN + 1);
        assert!(Feedback::new(&too_long, "a@example.com", "hi").is_err());
    }

    #[test]
    fn missing_fields_reports_each_absent_field() {
        let req = CreateFeedbackRequest {
            name: None,
            email: Some("a@example.com".to_string()),
            message: Some("".to_string()),
        };
        assert_eq!(req.missing_fields(), vec!["name", "message"]);
    }

    #[test]
    fn status_parse_accepts_only_known_values() {
        assert_eq!(FeedbackStatus::parse("pending"), Some(FeedbackStatus::Pending));
        assert_eq!(FeedbackStatus::parse("read"), Some(FeedbackStatus::Read));
        assert_eq!(
            FeedbackStatus::parse("responded"),
            Some(FeedbackStatus::Responded)
        );
        assert_eq!(FeedbackStatus::parse("archived"), None);
        assert_eq!(FeedbackStatus::parse("Pending"), None);
    }

    #[test]
    fn chat_message_requires_known_sender_and_text() {
        let msg = IncomingChatMessage {
            sender: Some("user".to_string()),
            text: Some("hi".to_string()),
            timestamp: None,
        };
        let validated = msg.validate(0).unwrap();
        assert_eq!(validated.sender, Sender::User);
        assert_eq!(validated.text, "hi");

        let bad_sender = IncomingChatMessage {
            sender: Some("admin".to_string()),
            text: Some("hi".to_string()),
            timestamp: None,
        };
        assert!(bad_sender.validate(0).is_err());

        let no_text = IncomingChatMessage {
            sender: Some("bot".to_string()),
            text: None,
            timestamp: None,
        };
        assert!(no_text.validate(1).is_err());
    }

    #[test]
    fn session_feedback_clamps_rating() {
        let incoming = IncomingSessionFeedback {
            is_accurate: Some("yes".to_string()),
            is_fast: None,
            would_use_again: None,
            rating: Some(9),
            comments: None,
        };
        let validated = incoming.validate().unwrap();
        assert_eq!(validated.rating, Some(5));
        assert_eq!(validated.is_accurate, Some(YesNo::Yes));

        let low = IncomingSessionFeedback {
            is_accurate: None,
            is_fast: None,
            would_use_again: None,
            rating: Some(0),
            comments: None,
        };
        assert_eq!(low.validate().unwrap().rating, Some(1));
    }

    #[test]
    fn session_feedback_rejects_unknown_answer() {
        let incoming = IncomingSessionFeedback {
            is_accurate: Some("maybe".to_string()),
            is_fast: None,
            would_use_again: None,
            rating: None,
            comments: None,
        };
        assert!(incoming.validate().is_err());
    }

    #[test]
    fn feedback_serializes_camel_case() {
        let feedback = Feedback::new("Amina", "a@example.com", "hi").unwrap();
        let json = serde_json::to_value(&feedback).unwrap();
        assert!(json.get("emailSent").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["status"], "pending");
    }
}
