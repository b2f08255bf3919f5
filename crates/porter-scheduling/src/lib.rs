pub mod calendar;
pub mod gmail;
pub mod timezone;
pub mod zoom;

use thiserror::Error;

pub use calendar::{CalendarGateway, EventInput};
pub use gmail::MailGateway;
pub use zoom::ZoomGateway;

/// Failure domains for the scheduling path. None of these are fatal to a
/// conversation turn; the policy converts them into a degraded reply.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("authentication failed: {0}")]
    Auth(#[from] porter_auth::AuthError),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("could not parse date/time: {0}")]
    TimeParse(String),

    #[error("unknown timezone: {0}")]
    Timezone(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl SchedulingError {
    /// True when the failure is the caller's input rather than an
    /// upstream or credential problem; surfaced to the visitor as a
    /// clarifying question, not a 5xx.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::TimeParse(_) | Self::Timezone(_) | Self::UnsupportedPlatform(_)
        )
    }
}
