//! Meeting-booking orchestration over the external gateways.
//!
//! A `Booker` holds whichever gateways are configured; callers always
//! get a typed result, with unconfigured gateways surfacing as auth
//! errors rather than panics. Email delivery is best-effort: a failed
//! invite never fails a booking that already happened.

use chrono::Utc;
use chrono_tz::Tz;
use porter_auth::AuthError;
use porter_scheduling::calendar::template_link;
use porter_scheduling::timezone::{display, normalize, parse_zone, reference_display};
use porter_scheduling::{CalendarGateway, EventInput, MailGateway, SchedulingError, ZoomGateway};
use porter_schema::{
    EventHandle, MeetingHandle, MeetingRequest, MessageHandle, Platform, ScheduleRequest,
    ScheduleResponse,
};

pub struct Booker {
    zoom: Option<ZoomGateway>,
    calendar: Option<CalendarGateway>,
    mail: Option<MailGateway>,
    reference: Tz,
    operator_email: Option<String>,
}

#[derive(Debug, Default)]
pub struct BookingOutcome {
    pub meeting: Option<MeetingHandle>,
    pub event: Option<EventHandle>,
    pub join_link: Option<String>,
    pub calendar_link: Option<String>,
}

impl Booker {
    pub fn new(reference: Tz) -> Self {
        Self {
            zoom: None,
            calendar: None,
            mail: None,
            reference,
            operator_email: None,
        }
    }

    pub fn with_zoom(mut self, gateway: ZoomGateway) -> Self {
        self.zoom = Some(gateway);
        self
    }

    pub fn with_calendar(mut self, gateway: CalendarGateway) -> Self {
        self.calendar = Some(gateway);
        self
    }

    pub fn with_mail(mut self, gateway: MailGateway) -> Self {
        self.mail = Some(gateway);
        self
    }

    pub fn with_operator_email(mut self, email: impl Into<String>) -> Self {
        self.operator_email = Some(email.into());
        self
    }

    pub fn reference(&self) -> &Tz {
        &self.reference
    }

    /// Create the meeting for `request` on its platform.
    ///
    /// Zoom bookings also get a calendar event carrying the join link;
    /// if that event fails the booking still stands and the calendar
    /// link falls back to a pre-filled template URL.
    pub async fn book(&self, request: &MeetingRequest) -> Result<BookingOutcome, SchedulingError> {
        match request.platform {
            Platform::Zoom => self.book_zoom(request).await,
            Platform::GoogleMeet => self.book_meet(request).await,
        }
    }

    async fn book_zoom(&self, request: &MeetingRequest) -> Result<BookingOutcome, SchedulingError> {
        let zoom = self.zoom.as_ref().ok_or_else(|| {
            SchedulingError::Auth(AuthError::MissingCredentials(
                "zoom gateway not configured".to_string(),
            ))
        })?;
        let meeting = zoom
            .create_meeting(
                &request.topic,
                request.start,
                request.duration_minutes,
                &request.timezone,
            )
            .await?;
        let join_link = meeting.join_url.clone();

        let event = match &self.calendar {
            Some(calendar) => {
                let result = calendar
                    .create_event(EventInput {
                        topic: request.topic.clone(),
                        start: request.start,
                        duration_minutes: request.duration_minutes,
                        attendee_email: request.attendee_email.clone(),
                        join_url: Some(join_link.clone()),
                        timezone: Some(request.timezone.clone()),
                        generate_meet_link: false,
                    })
                    .await;
                match result {
                    Ok(event) => Some(event),
                    Err(e) => {
                        tracing::warn!(error = %e, "calendar event failed after zoom booking");
                        None
                    }
                }
            }
            None => None,
        };

        let calendar_link = match &event {
            Some(event) => Some(event.html_link.clone()),
            None => Some(template_link(
                &request.topic,
                request.start.with_timezone(&Utc),
                request.duration_minutes,
                &join_link,
            )),
        };

        Ok(BookingOutcome {
            meeting: Some(meeting),
            event,
            join_link: Some(join_link),
            calendar_link,
        })
    }

    async fn book_meet(&self, request: &MeetingRequest) -> Result<BookingOutcome, SchedulingError> {
        let calendar = self.calendar.as_ref().ok_or_else(|| {
            SchedulingError::Auth(AuthError::MissingCredentials(
                "calendar gateway not configured".to_string(),
            ))
        })?;
        let event = calendar
            .create_event(EventInput {
                topic: request.topic.clone(),
                start: request.start,
                duration_minutes: request.duration_minutes,
                attendee_email: request.attendee_email.clone(),
                join_url: None,
                timezone: Some(request.timezone.clone()),
                generate_meet_link: true,
            })
            .await?;

        Ok(BookingOutcome {
            join_link: event.meet_link.clone(),
            calendar_link: Some(event.html_link.clone()),
            event: Some(event),
            meeting: None,
        })
    }

    /// Invite the attendee and notify the operator. Failures are logged
    /// and swallowed; returns the invite handle when one was sent.
    pub async fn send_meeting_emails(
        &self,
        request: &MeetingRequest,
        outcome: &BookingOutcome,
    ) -> Option<MessageHandle> {
        let mail = self.mail.as_ref()?;
        let start_display = reference_display(&request.start, &self.reference);
        let join = outcome.join_link.as_deref().unwrap_or("(link to follow)");

        let mut invite = None;
        if let Some(attendee) = &request.attendee_email {
            match mail
                .send_invite(
                    attendee,
                    &format!("Meeting scheduled: {}", request.topic),
                    join,
                    outcome.calendar_link.as_deref(),
                    &display(&request.start),
                )
                .await
            {
                Ok(handle) => invite = Some(handle),
                Err(e) => tracing::warn!(error = %e, "attendee invite failed"),
            }
        }

        if let Some(operator) = &self.operator_email {
            let body = format!(
                "Meeting booked.\nTopic: {}\nWhen: {}\nPlatform: {}\nAttendee: {}\nJoin: {}",
                request.topic,
                start_display,
                request.platform.as_str(),
                request.attendee_email.as_deref().unwrap_or("(none)"),
                join,
            );
            if let Err(e) = mail
                .send_notification(operator, "Meeting booked", &body)
                .await
            {
                tracing::warn!(error = %e, "operator notification failed");
            }
        }

        invite
    }

    /// Operator-only email, best-effort. Used for lead notifications.
    pub async fn notify_operator(&self, subject: &str, body: &str) {
        let (Some(mail), Some(operator)) = (&self.mail, &self.operator_email) else {
            return;
        };
        if let Err(e) = mail.send_notification(operator, subject, body).await {
            tracing::warn!(error = %e, "operator notification failed");
        }
    }

    /// Direct scheduling, bypassing the conversation: normalize the
    /// client wall clock, book, email both parties.
    pub async fn schedule(
        &self,
        request: &ScheduleRequest,
        default_zone: &Tz,
    ) -> Result<ScheduleResponse, SchedulingError> {
        let platform = Platform::parse(&request.platform)
            .ok_or_else(|| SchedulingError::UnsupportedPlatform(request.platform.clone()))?;
        let zone = match &request.client_timezone {
            Some(name) => parse_zone(name)?,
            None => *default_zone,
        };
        let start = normalize(&request.date, &request.time, &zone)?;

        let meeting_request = MeetingRequest {
            topic: request.topic.clone(),
            start: start.fixed_offset(),
            duration_minutes: request.duration,
            platform,
            timezone: zone.name().to_string(),
            attendee_email: request.email.clone(),
        };

        let outcome = self.book(&meeting_request).await?;
        let email = self.send_meeting_emails(&meeting_request, &outcome).await;

        Ok(ScheduleResponse {
            ok: true,
            platform,
            topic: request.topic.clone(),
            duration: request.duration,
            when_client_local: display(&start),
            when_reference: reference_display(&start, &self.reference),
            join_link: outcome.join_link.clone(),
            meeting: outcome.meeting,
            calendar: outcome.event,
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use porter_auth::{GoogleCredential, GoogleTokenCache, ZoomCredentials};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn meeting_request(platform: Platform) -> MeetingRequest {
        MeetingRequest {
            topic: "Discovery Call".into(),
            start: DateTime::parse_from_rfc3339("2025-10-22T15:30:00-04:00").unwrap(),
            duration_minutes: 45,
            platform,
            timezone: "America/New_York".into(),
            attendee_email: Some("client@example.com".into()),
        }
    }

    fn zoom_gateway(server: &MockServer) -> ZoomGateway {
        ZoomGateway::new(ZoomCredentials {
            account_id: "acc".into(),
            client_id: "cid".into(),
            client_secret: "cs".into(),
            host_email: "host@example.com".into(),
        })
        .with_api_base(server.uri())
        .with_auth_base(server.uri())
    }

    fn calendar_gateway(server: &MockServer) -> CalendarGateway {
        CalendarGateway::new(
            GoogleCredential {
                client_id: "cid".into(),
                client_secret: "cs".into(),
                refresh_token: "rt".into(),
                token_uri: format!("{}/token", server.uri()),
            },
            Arc::new(GoogleTokenCache::new()),
        )
        .with_api_base(server.uri())
    }

    async fn mount_zoom(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ztok", "expires_in": 3600
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/host@example.com/meetings"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 11,
                "topic": "Discovery Call",
                "start_time": "2025-10-22T19:30:00Z",
                "join_url": "https://zoom.us/j/11",
                "start_url": "https://zoom.us/s/11"
            })))
            .mount(server)
            .await;
    }

    async fn mount_google(server: &MockServer, with_meet_link: bool) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "gtok", "expires_in": 3600
            })))
            .mount(server)
            .await;
        let mut event = serde_json::json!({
            "id": "evt1",
            "htmlLink": "https://calendar.google.com/event?eid=evt1",
            "start": {"dateTime": "2025-10-22T15:30:00-04:00"},
            "end": {"dateTime": "2025-10-22T16:15:00-04:00"}
        });
        if with_meet_link {
            event["hangoutLink"] = serde_json::json!("https://meet.google.com/abc-defg-hij");
        }
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(event))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn zoom_booking_returns_join_and_calendar_links() {
        let server = MockServer::start().await;
        mount_zoom(&server).await;
        mount_google(&server, false).await;

        let booker = Booker::new(chrono_tz::Asia::Kolkata)
            .with_zoom(zoom_gateway(&server))
            .with_calendar(calendar_gateway(&server));
        let outcome = booker.book(&meeting_request(Platform::Zoom)).await.unwrap();

        assert_eq!(outcome.join_link.as_deref(), Some("https://zoom.us/j/11"));
        assert!(outcome
            .calendar_link
            .as_deref()
            .unwrap()
            .contains("calendar.google.com"));
        assert_eq!(outcome.meeting.unwrap().id, 11);
    }

    #[tokio::test]
    async fn zoom_booking_without_calendar_falls_back_to_template_link() {
        let server = MockServer::start().await;
        mount_zoom(&server).await;

        let booker = Booker::new(chrono_tz::Asia::Kolkata).with_zoom(zoom_gateway(&server));
        let outcome = booker.book(&meeting_request(Platform::Zoom)).await.unwrap();

        let link = outcome.calendar_link.unwrap();
        assert!(link.starts_with("https://www.google.com/calendar/render"));
        assert!(link.contains("Discovery%20Call"));
    }

    #[tokio::test]
    async fn meet_booking_uses_provisioned_link() {
        let server = MockServer::start().await;
        mount_google(&server, true).await;

        let booker =
            Booker::new(chrono_tz::Asia::Kolkata).with_calendar(calendar_gateway(&server));
        let outcome = booker
            .book(&meeting_request(Platform::GoogleMeet))
            .await
            .unwrap();

        assert_eq!(
            outcome.join_link.as_deref(),
            Some("https://meet.google.com/abc-defg-hij")
        );
        assert!(outcome.meeting.is_none());
    }

    #[tokio::test]
    async fn missing_gateway_is_an_auth_error() {
        let booker = Booker::new(chrono_tz::Asia::Kolkata);
        let err = booker
            .book(&meeting_request(Platform::Zoom))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Auth(_)));
    }

    #[tokio::test]
    async fn schedule_rejects_unknown_platform_and_zone() {
        let booker = Booker::new(chrono_tz::Asia::Kolkata);
        let mut request = ScheduleRequest {
            platform: "teams".into(),
            topic: "t".into(),
            date: "2025-10-22".into(),
            time: "03:30 PM".into(),
            client_timezone: None,
            duration: 45,
            email: None,
        };
        let err = booker
            .schedule(&request, &chrono_tz::UTC)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::UnsupportedPlatform(_)));
        assert!(err.is_input_error());

        request.platform = "zoom".into();
        request.client_timezone = Some("Mars/Olympus_Mons".into());
        let err = booker
            .schedule(&request, &chrono_tz::UTC)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Timezone(_)));
    }

    #[tokio::test]
    async fn schedule_books_and_renders_both_zones() {
        let server = MockServer::start().await;
        mount_zoom(&server).await;

        let booker = Booker::new(chrono_tz::Asia::Kolkata).with_zoom(zoom_gateway(&server));
        let request = ScheduleRequest {
            platform: "zoom".into(),
            topic: "Discovery Call".into(),
            date: "2025-10-22".into(),
            time: "03:30 PM".into(),
            client_timezone: Some("America/New_York".into()),
            duration: 45,
            email: None,
        };
        let response = booker.schedule(&request, &chrono_tz::UTC).await.unwrap();

        assert!(response.ok);
        assert_eq!(response.platform, Platform::Zoom);
        assert!(response.when_client_local.contains("03:30 PM"));
        // 15:30 EDT is 01:00 the next day in the reference zone.
        assert!(response.when_reference.contains("01:00 AM"));
        assert_eq!(response.join_link.as_deref(), Some("https://zoom.us/j/11"));
    }
}
