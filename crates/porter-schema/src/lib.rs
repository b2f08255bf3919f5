use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Node in the conversation state machine for one visitor session.
///
/// The happy path runs left to right; `FreeChat` is reachable from any
/// stage when input does not match the stage's expected pattern, and
/// `Booked` is absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AskName,
    AskEmail,
    AskNeed,
    ConfirmRequirement,
    AskPlatform,
    AskTime,
    Booked,
    FreeChat,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AskName => "ask_name",
            Stage::AskEmail => "ask_email",
            Stage::AskNeed => "ask_need",
            Stage::ConfirmRequirement => "confirm_requirement",
            Stage::AskPlatform => "ask_platform",
            Stage::AskTime => "ask_time",
            Stage::Booked => "booked",
            Stage::FreeChat => "free_chat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ask_name" => Some(Stage::AskName),
            "ask_email" => Some(Stage::AskEmail),
            "ask_need" => Some(Stage::AskNeed),
            "confirm_requirement" => Some(Stage::ConfirmRequirement),
            "ask_platform" => Some(Stage::AskPlatform),
            "ask_time" => Some(Stage::AskTime),
            "booked" => Some(Stage::Booked),
            "free_chat" => Some(Stage::FreeChat),
            _ => None,
        }
    }
}

/// Meeting platform chosen by the visitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Zoom,
    GoogleMeet,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Zoom => "zoom",
            Platform::GoogleMeet => "google_meet",
        }
    }

    /// Accepts the spellings visitors actually type ("zoom", "meet",
    /// "google meet", "google_meet").
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.contains("zoom") {
            Some(Platform::Zoom)
        } else if s.contains("meet") {
            Some(Platform::GoogleMeet)
        } else {
            None
        }
    }
}

// ============================================================
// Chat endpoint wire types
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    /// Discard any existing session for this key and start over.
    #[serde(default)]
    pub new_session: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Defaults to empty when absent so the handler can reject it with
    /// a uniform 400 instead of an extractor rejection.
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub bot_reply: String,
    pub stage: Stage,
    pub trigger_contact: bool,
    pub trigger_meeting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_link: Option<String>,
}

// ============================================================
// Schedule endpoint wire types
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `hh:mm AM/PM`
    pub time: String,
    #[serde(default)]
    pub client_timezone: Option<String>,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub email: Option<String>,
}

fn default_platform() -> String {
    "zoom".to_string()
}

fn default_topic() -> String {
    "Client Meeting".to_string()
}

fn default_duration() -> u32 {
    45
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub ok: bool,
    pub platform: Platform,
    pub topic: String,
    pub duration: u32,
    /// Wall-clock rendering in the client's zone.
    pub when_client_local: String,
    /// The same instant mirrored into the operator reference zone.
    pub when_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<EventHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<MessageHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_link: Option<String>,
}

// ============================================================
// Gateway result handles
// ============================================================

/// Result of creating a video-conference meeting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetingHandle {
    pub id: i64,
    pub topic: String,
    pub join_url: String,
    /// Host-side start URL; not shared with attendees.
    pub host_url: String,
    pub start_time: String,
}

/// Result of creating a calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventHandle {
    pub id: String,
    pub html_link: String,
    pub start: String,
    pub end: String,
    /// Auto-provisioned conference link, when one was requested and the
    /// upstream actually produced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meet_link: Option<String>,
}

/// Result of sending a transactional email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageHandle {
    pub id: String,
}

/// Ephemeral scheduling order produced by the conversation policy and
/// consumed immediately by the gateways. Never persisted.
#[derive(Debug, Clone)]
pub struct MeetingRequest {
    pub topic: String,
    pub start: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub platform: Platform,
    pub timezone: String,
    pub attendee_email: Option<String>,
}

// ============================================================
// Learning rules
// ============================================================

/// Stored instruction to avoid repeating a past low-scoring reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRule {
    pub avoid_text: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub user_message: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

// ============================================================
// Portfolio content
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    #[serde(default)]
    pub tagline: String,
    pub description: String,
    #[serde(default)]
    pub tech_stacks: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub title: String,
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct About {
    pub name: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    pub slug: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
}

/// Read-only profile snapshot used to build the reply-provider prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub intro: String,
    pub skills: Vec<String>,
    pub projects: Vec<Project>,
    pub services: Vec<Service>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_round_trips_through_str() {
        for stage in [
            Stage::AskName,
            Stage::AskEmail,
            Stage::AskNeed,
            Stage::ConfirmRequirement,
            Stage::AskPlatform,
            Stage::AskTime,
            Stage::Booked,
            Stage::FreeChat,
        ] {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::parse("nope"), None);
    }

    #[test]
    fn stage_serializes_snake_case() {
        let json = serde_json::to_string(&Stage::ConfirmRequirement).unwrap();
        assert_eq!(json, "\"confirm_requirement\"");
    }

    #[test]
    fn platform_parse_accepts_visitor_spellings() {
        assert_eq!(Platform::parse("Zoom please"), Some(Platform::Zoom));
        assert_eq!(Platform::parse("google meet"), Some(Platform::GoogleMeet));
        assert_eq!(Platform::parse("meet"), Some(Platform::GoogleMeet));
        assert_eq!(Platform::parse("teams"), None);
    }

    #[test]
    fn chat_request_defaults_optional_fields() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert!(req.session_id.is_none());
        assert!(!req.new_session);
        assert_eq!(req.message, "hi");
    }

    #[test]
    fn schedule_request_fills_defaults() {
        let req: ScheduleRequest =
            serde_json::from_str(r#"{"date": "2025-10-22", "time": "03:30 PM"}"#).unwrap();
        assert_eq!(req.platform, "zoom");
        assert_eq!(req.duration, 45);
        assert_eq!(req.topic, "Client Meeting");
    }

    #[test]
    fn chat_response_omits_absent_links() {
        let resp = ChatResponse {
            session_id: "s1".into(),
            bot_reply: "hello".into(),
            stage: Stage::AskName,
            trigger_contact: false,
            trigger_meeting: false,
            meeting_link: None,
            calendar_link: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("meeting_link"));
        assert!(!json.contains("calendar_link"));
    }
}
