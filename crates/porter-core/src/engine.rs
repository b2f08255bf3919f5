//! Conversation policy: the lead-qualifying stage machine.
//!
//! One `handle` call is one visitor turn. The session row is persisted
//! before any gateway side effect runs, so a crashed booking never
//! rewinds the conversation; gateway failures degrade the reply instead
//! of failing the turn.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use porter_memory::{SessionLockManager, SessionRecord, Store, StoreError};
use porter_provider::{CompletionRequest, ReplyProvider};
use porter_scheduling::timezone::{default_slot, display, extract_wall_clock, normalize};
use porter_schema::{ChatRequest, ChatResponse, MeetingRequest, Platform, Stage};
use uuid::Uuid;

use crate::booking::Booker;
use crate::evaluator;
use crate::profile;

/// Visitor wants to hire or build something.
const CONTACT_KEYWORDS: [&str; 7] = [
    "hire",
    "freelance",
    "project",
    "work with you",
    "build",
    "website",
    "develop",
];

/// Visitor wants a conversation, not just information.
const MEETING_KEYWORDS: [&str; 7] = [
    "call",
    "meet",
    "schedule",
    "talk",
    "connect later",
    "tomorrow",
    "next week",
];

/// General coding questions the assistant deflects.
const MISUSE_KEYWORDS: [&str; 6] = [
    "what is",
    "how to",
    "generate code",
    "explain",
    "syntax",
    "write a function",
];

const AFFIRMATIVE: [&str; 7] = ["yes", "yeah", "yep", "correct", "right", "sure", "ok"];

const MISUSE_REPLY: &str = "I'm here to talk about this portfolio, its projects, and \
    services, not to answer general programming questions. Is there a project I can \
    help you with?";

const BOOKED_REPLY: &str = "You're all set! The meeting is already scheduled; check \
    your email for the invite.";

const DEFAULT_MEETING_MINUTES: u32 = 45;

/// Session context window kept in the row and fed to the provider.
const MESSAGE_WINDOW: usize = 12;

enum Effect {
    NotifyLead,
    Book(MeetingRequest),
}

pub struct Policy {
    store: Store,
    locks: SessionLockManager,
    provider: Arc<dyn ReplyProvider>,
    booker: Arc<Booker>,
    client_zone: Tz,
}

impl Policy {
    pub fn new(
        store: Store,
        provider: Arc<dyn ReplyProvider>,
        booker: Arc<Booker>,
        client_zone: Tz,
    ) -> Self {
        Self {
            store,
            locks: SessionLockManager::new(),
            provider,
            booker,
            client_zone,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run one visitor turn to completion.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse, StoreError> {
        let session_key = request
            .session_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let _guard = self.locks.acquire(&session_key).await;

        if request.new_session {
            self.store.delete_session(&session_key).await?;
        }
        let mut session = match self.store.get_session(&session_key).await? {
            Some(session) => session,
            None => SessionRecord::new(&session_key),
        };

        // Identity hints fill empty fields only; they never overwrite.
        if session.name.is_none() {
            session.name = request.name.clone().filter(|n| !n.trim().is_empty());
        }
        if session.email.is_none() {
            session.email = request.email.clone().filter(|e| !e.trim().is_empty());
        }

        let message = request.message.trim().to_string();
        let lower = message.to_lowercase();
        let trigger_contact = CONTACT_KEYWORDS.iter().any(|k| lower.contains(k));
        let trigger_meeting = MEETING_KEYWORDS.iter().any(|k| lower.contains(k));

        session.messages.push(format!("user: {message}"));
        session.message_count += 1;

        let (mut reply, mut effects) = if is_misuse(&lower) {
            (MISUSE_REPLY.to_string(), Vec::new())
        } else {
            self.advance(&mut session, &message, &lower, trigger_contact)
                .await?
        };

        if trigger_contact && !trigger_meeting && session.stage != Stage::Booked {
            effects.push(Effect::NotifyLead);
        }

        // State is durable before any gateway call.
        self.store.upsert_session(&session).await?;

        let mut meeting_link = None;
        let mut calendar_link = None;
        let mut notified_lead = false;
        for effect in effects {
            match effect {
                Effect::NotifyLead if notified_lead => {}
                Effect::NotifyLead => {
                    notified_lead = true;
                    let summary = self.summarize_requirement(&session).await;
                    self.booker
                        .notify_operator("New lead from the portfolio chat", &summary)
                        .await;
                }
                Effect::Book(meeting_request) => {
                    match self.booker.book(&meeting_request).await {
                        Ok(outcome) => {
                            if let Some(join) = &outcome.join_link {
                                reply.push_str(&format!(" Join link: {join}"));
                            }
                            if let Some(link) = &outcome.calendar_link {
                                reply.push_str(&format!(" Calendar: {link}"));
                            }
                            meeting_link = outcome.join_link.clone();
                            calendar_link = outcome.calendar_link.clone();
                            self.booker
                                .send_meeting_emails(&meeting_request, &outcome)
                                .await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, session = %session.session_key,
                                "booking failed; conversation continues");
                            reply.push_str(
                                " I couldn't reach the scheduling service just now, \
                                 so the invite will arrive by email shortly.",
                            );
                        }
                    }
                }
            }
        }

        let rules = self.store.list_rules().await?;
        reply = evaluator::redact(&reply, &rules);
        self.learn_from_turn(&session, &message, &reply).await?;

        session.messages.push(format!("bot: {reply}"));
        if session.messages.len() > MESSAGE_WINDOW {
            let excess = session.messages.len() - MESSAGE_WINDOW;
            session.messages.drain(..excess);
        }
        self.store.upsert_session(&session).await?;

        Ok(ChatResponse {
            session_id: session_key,
            bot_reply: reply,
            stage: session.stage,
            trigger_contact,
            trigger_meeting,
            meeting_link,
            calendar_link,
        })
    }

    /// Stage transition table. Mutates the session and returns the base
    /// reply plus any side effects to run after persisting.
    async fn advance(
        &self,
        session: &mut SessionRecord,
        message: &str,
        lower: &str,
        trigger_contact: bool,
    ) -> Result<(String, Vec<Effect>), StoreError> {
        let mut effects = Vec::new();
        let reply = match session.stage {
            Stage::AskName => {
                if let Some(name) = session.name.clone() {
                    session.stage = Stage::AskEmail;
                    format!("Welcome, {name}! What's the best email to reach you at?")
                } else if message.is_empty() || profile::is_greeting(lower) {
                    "Hi there! I'm the assistant for this portfolio. May I have your name?"
                        .to_string()
                } else {
                    session.name = Some(message.to_string());
                    session.stage = Stage::AskEmail;
                    format!("Nice to meet you, {message}! What's the best email to reach you at?")
                }
            }
            Stage::AskEmail => {
                if session.email.is_some() {
                    session.stage = Stage::AskNeed;
                    "Thanks! So, what are you looking to build or get help with?".to_string()
                } else if message.is_empty() || profile::is_greeting(lower) {
                    "Could you share your email so I can send you the details?".to_string()
                } else {
                    session.email = Some(message.to_string());
                    session.stage = Stage::AskNeed;
                    "Got it. What are you looking to build or get help with?".to_string()
                }
            }
            Stage::AskNeed => {
                if trigger_contact || message.split_whitespace().count() >= 5 {
                    session.pending_requirement = Some(message.to_string());
                    session.stage = Stage::ConfirmRequirement;
                    format!("So you need: \"{message}\". Did I get that right?")
                } else {
                    self.free_reply(session, message).await?
                }
            }
            Stage::ConfirmRequirement => {
                if is_affirmative(lower) {
                    session.requirement_confirmed = true;
                    session.stage = Stage::AskPlatform;
                    effects.push(Effect::NotifyLead);
                    "Great. Would you prefer Zoom or Google Meet for a quick call?".to_string()
                } else {
                    self.free_reply(session, message).await?
                }
            }
            Stage::AskPlatform => match Platform::parse(message) {
                Some(platform) => {
                    session.platform = Some(platform);
                    session.stage = Stage::AskTime;
                    "When works for you? Give me a date and time like \
                     2025-11-03 02:30 PM, or just say anything and I'll \
                     propose a slot."
                        .to_string()
                }
                None => self.free_reply(session, message).await?,
            },
            Stage::AskTime => {
                let start = match extract_wall_clock(message) {
                    Some((date, time)) => {
                        match normalize(&date, &time, &self.client_zone) {
                            Ok(start) => start,
                            Err(e) => {
                                // Stage unchanged; ask for a usable time.
                                return Ok((
                                    format!("That time didn't work out ({e}). Could you give \
                                             me another date and time?"),
                                    effects,
                                ));
                            }
                        }
                    }
                    None => default_slot(Utc::now(), &self.client_zone),
                };
                session.stage = Stage::Booked;
                let topic = match &session.name {
                    Some(name) => format!("Call with {name}"),
                    None => "Client Meeting".to_string(),
                };
                effects.push(Effect::Book(MeetingRequest {
                    topic,
                    start: start.fixed_offset(),
                    duration_minutes: DEFAULT_MEETING_MINUTES,
                    platform: session.platform.unwrap_or(Platform::Zoom),
                    timezone: self.client_zone.name().to_string(),
                    attendee_email: session.email.clone(),
                }));
                format!("Booked for {}.", display(&start))
            }
            Stage::Booked => BOOKED_REPLY.to_string(),
            Stage::FreeChat => self.free_reply(session, message).await?,
        };
        Ok((reply, effects))
    }

    /// Provider-backed reply with profile context; provider failure
    /// degrades to a canned keyword reply.
    async fn free_reply(
        &self,
        session: &SessionRecord,
        message: &str,
    ) -> Result<String, StoreError> {
        let portfolio = self.store.profile().await?;
        let rules = self.store.list_rules().await?;
        let system = format!(
            "{}{}",
            profile::SYSTEM_PROMPT,
            profile::rules_instruction(&rules)
        );
        let context = format!(
            "{}RECENT:\n{}",
            profile::prompt_context(&portfolio),
            session.messages.join("\n")
        );
        let completion = CompletionRequest::new(system, message).with_context(context);
        match self.provider.complete(completion).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::warn!(error = %e, "reply provider unavailable, using canned reply");
                Ok(profile::canned_reply(message))
            }
        }
    }

    /// The visitor's message is implicit feedback on the turn; a low
    /// score stores this turn's finalized reply as a rule to avoid.
    async fn learn_from_turn(
        &self,
        session: &SessionRecord,
        message: &str,
        reply: &str,
    ) -> Result<(), StoreError> {
        if reply.trim().is_empty() {
            // A fully redacted reply has nothing left to avoid.
            return Ok(());
        }
        let score = evaluator::implicit_score(message);
        if evaluator::should_learn(score) {
            let rule = evaluator::rule_from_reply(
                reply,
                message,
                Some(session.stage.as_str().to_string()),
                score,
            );
            if self.store.insert_rule(&rule).await? {
                tracing::debug!(score, "stored new learning rule");
            }
        }
        Ok(())
    }

    /// Condense the transcript for the operator; provider failure falls
    /// back to the raw requirement.
    async fn summarize_requirement(&self, session: &SessionRecord) -> String {
        let requirement = session
            .pending_requirement
            .clone()
            .unwrap_or_else(|| "(not stated yet)".to_string());
        let lead = format!(
            "Name: {}\nEmail: {}\nRequirement: {}",
            session.name.as_deref().unwrap_or("(unknown)"),
            session.email.as_deref().unwrap_or("(unknown)"),
            requirement,
        );

        let completion = CompletionRequest::new(
            "Summarize this lead's requirement in two or three short bullet points.",
            session.messages.join("\n"),
        );
        match self.provider.complete(completion).await {
            Ok(summary) => format!("{lead}\n\nSummary:\n{summary}"),
            Err(_) => lead,
        }
    }
}

fn is_misuse(lower: &str) -> bool {
    MISUSE_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn is_affirmative(lower: &str) -> bool {
    let cleaned: String = lower
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned
        .split_whitespace()
        .any(|w| AFFIRMATIVE.contains(&w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_matches_whole_words_only() {
        assert!(is_affirmative("yes, exactly"));
        assert!(is_affirmative("OK!".to_lowercase().as_str()));
        assert!(!is_affirmative("yesterday maybe"));
        assert!(!is_affirmative("no"));
    }

    #[test]
    fn misuse_keywords_catch_coding_questions() {
        assert!(is_misuse("how to reverse a linked list"));
        assert!(is_misuse("write a function that sorts"));
        assert!(!is_misuse("i want to hire you"));
    }
}
