use crate::config::EmailConfig;
use crate::error::{AppError, AppResult};
use crate::models::Feedback;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Outbound notification seam. Submit treats every failure here as
/// best-effort: logged, swallowed, never surfaced to the caller.
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send_feedback_notification(&self, feedback: &Feedback) -> AppResult<()>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    admin: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let credentials = Credentials::new(config.user.clone(), config.password.clone());

        // secure = implicit TLS (465); otherwise STARTTLS on the given port.
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| AppError::Email(format!("Invalid SMTP relay {}: {e}", config.host)))?;

        let transport = builder.port(config.port).credentials(credentials).build();

        let from: Mailbox = format!("Feedback System <{}>", config.user)
            .parse()
            .map_err(|e| {
                AppError::Email(format!("Invalid sender address {}: {e}", config.user))
            })?;

        let admin: Mailbox = config.admin_email.parse().map_err(|e| {
            AppError::Email(format!(
                "Invalid admin address {}: {e}",
                config.admin_email
            ))
        })?;

        Ok(Self {
            transport,
            from,
            admin,
        })
    }
}

#[async_trait]
impl EmailNotifier for SmtpNotifier {
    async fn send_feedback_notification(&self, feedback: &Feedback) -> AppResult<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.admin.clone())
            .subject(format!("New Feedback Received from {}", feedback.name))
            .multipart(MultiPart::alternative_plain_html(
                notification_text(feedback),
                notification_html(feedback),
            ))
            .map_err(|e| AppError::Email(format!("Failed to build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("Failed to send notification: {e}")))?;

        tracing::info!("Sent feedback notification for {}", feedback.id);
        Ok(())
    }
}

fn notification_text(feedback: &Feedback) -> String {
    format!(
        "New Feedback Received\n\n\
         Name: {}\n\
         Email: {}\n\n\
         Message:\n{}\n\n\
         Feedback ID: {}\n",
        feedback.name, feedback.email, feedback.message, feedback.id
    )
}

fn notification_html(feedback: &Feedback) -> String {
    format!(
        "<html><body>\
         <h2>New Feedback Received</h2>\
         <p><strong>Name:</strong> {}</p>\
         <p><strong>Email:</strong> <a href=\"mailto:{email}\">{email}</a></p>\
         <p><strong>Message:</strong></p>\
         <p style=\"white-space: pre-wrap;\">{}</p>\
         <p style=\"color: #888; font-size: 12px;\">Feedback ID: {}</p>\
         </body></html>",
        feedback.name,
        feedback.message,
        feedback.id,
        email = feedback.email
    )
}
