use async_trait::async_trait;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

use crate::config::NotificationConfig;

/// NotifyError
///
/// Why a contact notice was not delivered. Never turned into an HTTP error: the contact
/// handler only reports it through `email_sent`.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email provider not configured")]
    NotConfigured,

    #[error("email provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// ContactNotice
///
/// What the administrator receives about a newly stored contact message.
#[derive(Debug, Clone)]
pub struct ContactNotice {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

/// Notifier
///
/// Best-effort delivery of contact notices. Implementations must not retry indefinitely;
/// the caller waits for the result before answering the request.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_contact(&self, notice: &ContactNotice) -> Result<(), NotifyError>;
}

pub type NotifierState = Arc<dyn Notifier>;

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: String,
    html: String,
    reply_to: &'a str,
}

/// ResendNotifier
///
/// Sends through the Resend HTTP API. Without an API key every call fails fast with
/// `NotConfigured`.
#[derive(Clone)]
pub struct ResendNotifier {
    client: reqwest::Client,
    config: NotificationConfig,
}

impl ResendNotifier {
    pub fn new(config: NotificationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn notify_contact(&self, notice: &ContactNotice) -> Result<(), NotifyError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(NotifyError::NotConfigured)?;

        let payload = EmailPayload {
            from: &self.config.sender,
            to: [&self.config.admin_email],
            subject: format!("Nuevo mensaje: {}", notice.subject),
            html: render_notice(notice),
            reply_to: &notice.email,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to = %self.config.admin_email, "contact notification sent");
        Ok(())
    }
}

/// Minimal HTML escaping for user-supplied text placed in the email body.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the notice body. Every interpolated value is escaped; message line breaks are
/// kept as `<br>`.
pub fn render_notice(notice: &ContactNotice) -> String {
    let phone = notice
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(escape_html)
        .unwrap_or_else(|| "No proporcionado".to_string());
    let message = escape_html(&notice.message).replace('\n', "<br>");

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <h2>Nuevo mensaje de contacto</h2>
  <p><strong>Nombre:</strong> {name}</p>
  <p><strong>Email:</strong> <a href="mailto:{email}">{email}</a></p>
  <p><strong>Teléfono:</strong> {phone}</p>
  <p><strong>Asunto:</strong> {subject}</p>
  <div style="background: #f9f9f9; padding: 16px; border-left: 3px solid #667eea;">{message}</div>
  <p style="color: #666; font-size: 12px;">Puedes responder directamente a este correo.</p>
</body>
</html>"#,
        name = escape_html(&notice.name),
        email = escape_html(&notice.email),
        phone = phone,
        subject = escape_html(&notice.subject),
        message = message,
    )
}

/// MockNotifier
///
/// Test double; `should_fail` simulates a provider outage.
#[derive(Clone, Default)]
pub struct MockNotifier {
    pub should_fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify_contact(&self, _notice: &ContactNotice) -> Result<(), NotifyError> {
        if self.should_fail {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "Mock notifier error: simulation requested".to_string(),
            });
        }
        Ok(())
    }
}
