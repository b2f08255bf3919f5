//! Mail gateway: transactional email through the Gmail API.
//!
//! Messages are assembled as RFC 822 text, base64url-encoded, and posted
//! to `users/me/messages/send` with the shared Google access token.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use porter_auth::{GoogleCredential, GoogleTokenCache};
use porter_schema::MessageHandle;
use serde_json::json;

use crate::SchedulingError;

const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com";

pub struct MailGateway {
    http: reqwest::Client,
    api_base: String,
    credential: GoogleCredential,
    token: Arc<GoogleTokenCache>,
    sender: String,
}

impl MailGateway {
    pub fn new(
        credential: GoogleCredential,
        token: Arc<GoogleTokenCache>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            api_base: DEFAULT_API_BASE.to_string(),
            credential,
            token,
            sender: sender.into(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// HTML invite with the join link and, when present, a calendar link.
    pub async fn send_invite(
        &self,
        to: &str,
        subject: &str,
        join_url: &str,
        calendar_link: Option<&str>,
        start_display: &str,
    ) -> Result<MessageHandle, SchedulingError> {
        let calendar_row = match calendar_link {
            Some(link) => {
                format!("<p><b>Calendar:</b> <a href=\"{link}\">View in Google Calendar</a></p>")
            }
            None => String::new(),
        };
        let html = format!(
            "<div>\
             <p>Hi,</p>\
             <p>Your meeting is scheduled.</p>\
             <p><b>Start:</b> {start_display}</p>\
             <p><b>Join:</b> <a href=\"{join_url}\">{join_url}</a></p>\
             {calendar_row}\
             <p>Regards,<br/>Assistant</p>\
             </div>"
        );
        self.send_raw(to, subject, "text/html", &html).await
    }

    /// Plain-text operator notification (new lead, meeting summary).
    pub async fn send_notification(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<MessageHandle, SchedulingError> {
        self.send_raw(to, subject, "text/plain", body).await
    }

    async fn send_raw(
        &self,
        to: &str,
        subject: &str,
        content_type: &str,
        body: &str,
    ) -> Result<MessageHandle, SchedulingError> {
        let bearer = self.token.bearer(&self.http, &self.credential).await?;
        let raw = encode_message(&self.sender, to, subject, content_type, body);

        let url = format!("{}/gmail/v1/users/me/messages/send", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&bearer)
            .json(&json!({ "raw": raw }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulingError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let sent: serde_json::Value = response.json().await?;
        let id = sent["id"].as_str().unwrap_or_default().to_string();
        tracing::info!(message_id = %id, %to, "sent email");
        Ok(MessageHandle { id })
    }
}

fn encode_message(from: &str, to: &str, subject: &str, content_type: &str, body: &str) -> String {
    let message = format!(
        "From: {from}\r\n\
         To: {to}\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: {content_type}; charset=\"UTF-8\"\r\n\
         \r\n\
         {body}"
    );
    URL_SAFE_NO_PAD.encode(message)
}
