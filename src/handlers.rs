use crate::database::Database;
use crate::email::EmailNotifier;
use crate::error::AppError;
use crate::models::{
    ChatSession, ChatSessionResponse, ConfirmationResponse, CreateFeedbackRequest,
    EndpointListing, Feedback, FeedbackCreatedData, FeedbackCreatedResponse, FeedbackListResponse,
    FeedbackResponse, FeedbackStatus, FeedbackUpdatedResponse, HealthResponse, IndexResponse,
    ListFeedbackQuery, SaveChatRequest, UpdateStatusRequest,
};
use actix_web::{web, HttpResponse, Result};
use std::sync::Arc;
use std::time::SystemTime;

pub struct AppState {
    pub database: Arc<Database>,
    /// None when no email section is configured; Submit then skips the
    /// notification step entirely.
    pub notifier: Option<Arc<dyn EmailNotifier>>,
    pub start_time: SystemTime,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/feedback", web::post().to(create_feedback))
            .route("/feedback", web::get().to(list_feedback))
            .route("/feedback/{id}", web::get().to(get_feedback))
            .route(
                "/feedback/{id}/status",
                web::patch().to(update_feedback_status),
            )
            .route("/feedback/{id}", web::delete().to(delete_feedback))
            .route("/chat", web::post().to(save_chat_session))
            .route("/health", web::get().to(health_check)),
    )
    .route("/", web::get().to(index))
    .default_service(web::route().to(not_found));
}

/// Maps body deserialization failures into the standard error envelope
/// instead of actix-web's plain-text 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::Validation(format!("Invalid request body: {err}")).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::Validation(format!("Invalid query string: {err}")).into())
}

pub async fn create_feedback(
    data: web::Data<AppState>,
    request: web::Json<CreateFeedbackRequest>,
) -> Result<HttpResponse, AppError> {
    let req = request.into_inner();

    let missing = req.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Please provide {}",
            missing.join(", ")
        )));
    }

    let feedback = Feedback::new(
        req.name.as_deref().unwrap_or_default(),
        req.email.as_deref().unwrap_or_default(),
        req.message.as_deref().unwrap_or_default(),
    )?;

    data.database.create_feedback(&feedback)?;

    // Notification is best-effort: the record stands whether or not the
    // email goes out, and the caller never sees a delivery failure.
    if let Some(notifier) = &data.notifier {
        match notifier.send_feedback_notification(&feedback).await {
            Ok(()) => {
                if let Err(e) = data.database.mark_email_sent(&feedback.id) {
                    tracing::warn!(
                        "Failed to record notification flag for {}: {}",
                        feedback.id,
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!("Email sending failed for {}: {}", feedback.id, e);
            }
        }
    }

    let response = FeedbackCreatedResponse {
        success: true,
        message: "Feedback submitted successfully! We will get back to you soon.".to_string(),
        data: FeedbackCreatedData {
            id: feedback.id,
            name: feedback.name,
            email: feedback.email,
            created_at: feedback.created_at,
        },
    };
    Ok(HttpResponse::Created().json(response))
}

pub async fn list_feedback(
    data: web::Data<AppState>,
    query: web::Query<ListFeedbackQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(10)
        .clamp(1, crate::database::MAX_PAGE_SIZE);

    let (feedback, total) = data
        .database
        .list_feedback(query.status.as_deref(), page, limit)?;

    let response = FeedbackListResponse {
        success: true,
        data: feedback,
        total,
        total_pages: total.div_ceil(limit),
        current_page: page,
    };
    Ok(HttpResponse::Ok().json(response))
}

pub async fn get_feedback(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let feedback = data.database.get_feedback_by_id(&path.into_inner())?;
    let response = FeedbackResponse {
        success: true,
        data: feedback,
    };
    Ok(HttpResponse::Ok().json(response))
}

pub async fn update_feedback_status(
    data: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let status = request
        .status
        .as_deref()
        .and_then(FeedbackStatus::parse)
        .ok_or_else(|| {
            AppError::Validation(
                "Invalid status. Must be: pending, read, or responded".to_string(),
            )
        })?;

    let feedback = data
        .database
        .update_feedback_status(&path.into_inner(), status)?;

    let response = FeedbackUpdatedResponse {
        success: true,
        message: "Feedback status updated successfully".to_string(),
        data: feedback,
    };
    Ok(HttpResponse::Ok().json(response))
}

pub async fn delete_feedback(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    data.database.delete_feedback(&path.into_inner())?;
    let response = ConfirmationResponse {
        success: true,
        message: "Feedback deleted successfully".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

pub async fn save_chat_session(
    data: web::Data<AppState>,
    request: web::Json<SaveChatRequest>,
) -> Result<HttpResponse, AppError> {
    let req = request.into_inner();

    let incoming = req.messages.ok_or_else(|| {
        AppError::Validation("Invalid input: messages array is required".to_string())
    })?;

    let messages = incoming
        .iter()
        .enumerate()
        .map(|(i, msg)| msg.validate(i))
        .collect::<Result<Vec<_>, _>>()?;

    let feedback = req.feedback.map(|f| f.validate()).transpose()?;

    let session = ChatSession::new(messages, feedback);
    data.database.create_chat_session(&session)?;

    let response = ChatSessionResponse {
        success: true,
        message: "Chat session and feedback saved successfully".to_string(),
        data: session,
    };
    Ok(HttpResponse::Created().json(response))
}

pub async fn health_check(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let uptime = data
        .start_time
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let response = HealthResponse {
        success: true,
        message: "Server is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime,
    };
    Ok(HttpResponse::Ok().json(response))
}

pub async fn index() -> Result<HttpResponse, AppError> {
    let response = IndexResponse {
        success: true,
        message: "Welcome to Feedback API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: EndpointListing {
            health: "/api/health".to_string(),
            feedback: "/api/feedback".to_string(),
            chat: "/api/chat".to_string(),
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

pub async fn not_found() -> Result<HttpResponse, AppError> {
    let response = ConfirmationResponse {
        success: false,
        message: "Route not found".to_string(),
    };
    Ok(HttpResponse::NotFound().json(response))
}
