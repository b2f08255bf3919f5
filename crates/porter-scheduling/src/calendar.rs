//! Calendar gateway: Google Calendar events, optionally with an
//! auto-provisioned Meet link.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use porter_auth::{GoogleCredential, GoogleTokenCache};
use porter_schema::EventHandle;
use serde_json::json;
use uuid::Uuid;

use crate::SchedulingError;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub struct CalendarGateway {
    http: reqwest::Client,
    api_base: String,
    credential: GoogleCredential,
    token: Arc<GoogleTokenCache>,
}

/// One event to insert. `join_url` carries an external conference link
/// (e.g. Zoom) into the location/description; `generate_meet_link` asks
/// Google to provision a Meet link instead.
#[derive(Debug, Clone)]
pub struct EventInput {
    pub topic: String,
    pub start: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub attendee_email: Option<String>,
    pub join_url: Option<String>,
    pub timezone: Option<String>,
    pub generate_meet_link: bool,
}

impl CalendarGateway {
    /// `token` is shared with the mail gateway so the two Google-facing
    /// facades refresh one access token between them.
    pub fn new(credential: GoogleCredential, token: Arc<GoogleTokenCache>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            api_base: DEFAULT_API_BASE.to_string(),
            credential,
            token,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn create_event(&self, input: EventInput) -> Result<EventHandle, SchedulingError> {
        let bearer = self.token.bearer(&self.http, &self.credential).await?;
        let end = input.start + Duration::minutes(i64::from(input.duration_minutes));

        let mut event = json!({
            "summary": if input.topic.is_empty() { "Meeting" } else { input.topic.as_str() },
            "location": input.join_url.clone().unwrap_or_default(),
            "description": match &input.join_url {
                Some(url) => format!("Join link: {url}"),
                None => "Calendar event".to_string(),
            },
            "start": time_field(&input.start, input.timezone.as_deref()),
            "end": time_field(&end, input.timezone.as_deref()),
        });
        if let Some(email) = &input.attendee_email {
            event["attendees"] = json!([{ "email": email }]);
        }
        if input.generate_meet_link {
            // requestId must be unique per insert
            event["conferenceData"] = json!({
                "createRequest": {
                    "requestId": Uuid::new_v4().to_string(),
                    "conferenceSolutionKey": { "type": "hangoutsMeet" },
                }
            });
        }

        let url = format!("{}/calendars/primary/events", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&bearer)
            .query(&[
                ("sendUpdates", "all"),
                (
                    "conferenceDataVersion",
                    if input.generate_meet_link { "1" } else { "0" },
                ),
            ])
            .json(&event)
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

        let created: serde_json::Value = response.json().await?;
        let meet_link = extract_meet_link(&created);
        if input.generate_meet_link && meet_link.is_none() {
            // Requested but not provisioned: degrade, don't fail.
            tracing::warn!("calendar event created without the requested meet link");
        }

        Ok(EventHandle {
            id: created["id"].as_str().unwrap_or_default().to_string(),
            html_link: created["htmlLink"].as_str().unwrap_or_default().to_string(),
            start: created["start"]["dateTime"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            end: created["end"]["dateTime"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            meet_link,
        })
    }
}

fn time_field(instant: &DateTime<FixedOffset>, timezone: Option<&str>) -> serde_json::Value {
    match timezone {
        // Explicit timeZone so attendees see their local wall clock.
        Some(tz) => json!({ "dateTime": instant.to_rfc3339(), "timeZone": tz }),
        None => json!({ "dateTime": instant.to_rfc3339() }),
    }
}

fn extract_meet_link(created: &serde_json::Value) -> Option<String> {
    if let Some(link) = created["hangoutLink"].as_str() {
        return Some(link.to_string());
    }
    created["conferenceData"]["entryPoints"]
        .as_array()?
        .iter()
        .find(|ep| ep["entryPointType"].as_str() == Some("video"))
        .and_then(|ep| ep["uri"].as_str())
        .map(str::to_string)
}

/// Pre-filled Google Calendar "add event" link for visitors who were not
/// invited through the API.
pub fn template_link(
    topic: &str,
    start: DateTime<Utc>,
    duration_minutes: u32,
    join_url: &str,
) -> String {
    let end = start + Duration::minutes(i64::from(duration_minutes));
    let fmt = "%Y%m%dT%H%M%SZ";
    format!(
        "https://www.google.com/calendar/render?action=TEMPLATE&text={}&dates={}/{}&details={}&location=Online&trp=false",
        urlencoding::encode(topic),
        start.format(fmt),
        end.format(fmt),
        urlencoding::encode(&format!("Join link: {join_url}")),
    )
}
