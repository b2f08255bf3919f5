//! Meeting gateway: scheduled Zoom meetings on the host account.

use chrono::{DateTime, FixedOffset};
use porter_auth::{ZoomCredentials, ZoomTokenCache};
use porter_schema::MeetingHandle;
use serde::{Deserialize, Serialize};

use crate::SchedulingError;

const DEFAULT_API_BASE: &str = "https://api.zoom.us/v2";
const DEFAULT_AUTH_BASE: &str = "https://zoom.us";

pub struct ZoomGateway {
    http: reqwest::Client,
    api_base: String,
    auth_base: String,
    credentials: ZoomCredentials,
    token: ZoomTokenCache,
}

#[derive(Serialize)]
struct MeetingPayload<'a> {
    topic: &'a str,
    /// 2 = scheduled meeting
    #[serde(rename = "type")]
    meeting_type: u8,
    start_time: String,
    duration: u32,
    timezone: &'a str,
    settings: MeetingSettings,
}

#[derive(Serialize)]
struct MeetingSettings {
    host_video: bool,
    participant_video: bool,
}

#[derive(Deserialize)]
struct MeetingResponse {
    id: i64,
    topic: String,
    start_time: String,
    join_url: String,
    start_url: String,
}

impl ZoomGateway {
    pub fn new(credentials: ZoomCredentials) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .unwrap_or_default(),
            api_base: DEFAULT_API_BASE.to_string(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            credentials,
            token: ZoomTokenCache::new(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_base(mut self, base: impl Into<String>) -> Self {
        self.auth_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn host_email(&self) -> &str {
        &self.credentials.host_email
    }

    /// Create a scheduled meeting on the host account.
    pub async fn create_meeting(
        &self,
        topic: &str,
        start: DateTime<FixedOffset>,
        duration_minutes: u32,
        timezone: &str,
    ) -> Result<MeetingHandle, SchedulingError> {
        let bearer = self
            .token
            .bearer(&self.http, &self.auth_base, &self.credentials)
            .await?;

        let url = format!(
            "{}/users/{}/meetings",
            self.api_base, self.credentials.host_email
        );
        let payload = MeetingPayload {
            topic: if topic.is_empty() { "Meeting" } else { topic },
            meeting_type: 2,
            start_time: start.to_rfc3339(),
            duration: duration_minutes,
            timezone,
            settings: MeetingSettings {
                host_video: true,
                participant_video: true,
            },
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&bearer)
            .json(&payload)
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

        let meeting: MeetingResponse = response.json().await?;
        tracing::info!(meeting_id = meeting.id, "created zoom meeting");
        Ok(MeetingHandle {
            id: meeting.id,
            topic: meeting.topic,
            join_url: meeting.join_url,
            host_url: meeting.start_url,
            start_time: meeting.start_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> ZoomCredentials {
        ZoomCredentials {
            account_id: "acc".into(),
            client_id: "cid".into(),
            client_secret: "cs".into(),
            host_email: "assistant@example.com".into(),
        }
    }

    fn start() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-10-22T15:30:00-04:00").unwrap()
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ztok",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_meeting_maps_response_to_handle() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/users/assistant@example.com/meetings"))
            .and(header("authorization", "Bearer ztok"))
            .and(body_partial_json(serde_json::json!({
                "topic": "Discovery Call",
                "type": 2,
                "duration": 45,
                "timezone": "America/New_York"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 123456789,
                "topic": "Discovery Call",
                "start_time": "2025-10-22T19:30:00Z",
                "join_url": "https://zoom.us/j/123456789",
                "start_url": "https://zoom.us/s/123456789"
            })))
            .mount(&server)
            .await;

        let gateway = ZoomGateway::new(credentials())
            .with_api_base(server.uri())
            .with_auth_base(server.uri());
        let handle = gateway
            .create_meeting("Discovery Call", start(), 45, "America/New_York")
            .await
            .unwrap();

        assert_eq!(handle.id, 123456789);
        assert_eq!(handle.join_url, "https://zoom.us/j/123456789");
        assert_eq!(handle.host_url, "https://zoom.us/s/123456789");
    }

    #[tokio::test]
    async fn create_meeting_surfaces_upstream_failure() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/users/assistant@example.com/meetings"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid start_time"))
            .mount(&server)
            .await;

        let gateway = ZoomGateway::new(credentials())
            .with_api_base(server.uri())
            .with_auth_base(server.uri());
        let err = gateway
            .create_meeting("t", start(), 30, "UTC")
            .await
            .unwrap_err();
        match err {
            SchedulingError::Upstream { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid start_time");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn rejected_credentials_are_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let gateway = ZoomGateway::new(credentials())
            .with_api_base(server.uri())
            .with_auth_base(server.uri());
        let err = gateway
            .create_meeting("t", start(), 30, "UTC")
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Auth(_)));
    }
}
