//! Prompt assembly for the reply provider, plus the canned replies used
//! when the provider is disabled or unreachable.

use porter_schema::{LearningRule, Profile};

/// Fixed persona instruction for every free-form completion.
pub const SYSTEM_PROMPT: &str = "\
You are the portfolio assistant on a freelance engineer's website. \
Answer briefly (2-4 sentences), stay on the topics of the engineer's \
skills, projects, and services, and nudge visitors with a real project \
toward sharing their requirement and booking a call. Never invent \
facts that are not in the profile context. Never answer general coding \
or homework questions.";

/// Portfolio snapshot rendered as plain-text context for the provider.
pub fn prompt_context(profile: &Profile) -> String {
    let mut out = String::new();
    if !profile.intro.is_empty() {
        out.push_str("ABOUT: ");
        out.push_str(&profile.intro);
        out.push('\n');
    }
    if !profile.skills.is_empty() {
        out.push_str("SKILLS: ");
        out.push_str(&profile.skills.join(", "));
        out.push('\n');
    }
    for project in &profile.projects {
        out.push_str("PROJECT: ");
        out.push_str(&project.title);
        if !project.tagline.is_empty() {
            out.push_str(" (");
            out.push_str(&project.tagline);
            out.push(')');
        }
        out.push_str(" - ");
        out.push_str(&project.description);
        if !project.tech_stacks.is_empty() {
            out.push_str(" [");
            out.push_str(&project.tech_stacks.join(", "));
            out.push(']');
        }
        out.push('\n');
    }
    for service in &profile.services {
        out.push_str("SERVICE: ");
        out.push_str(&service.title);
        out.push_str(" - ");
        out.push_str(&service.description);
        out.push('\n');
    }
    out
}

/// Learning rules rendered as extra system guidance.
pub fn rules_instruction(rules: &[LearningRule]) -> String {
    if rules.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nAvoid phrasings like these, visitors reacted poorly to them:\n");
    for rule in rules.iter().take(10) {
        out.push_str("- ");
        out.push_str(&rule.avoid_text);
        out.push('\n');
    }
    out
}

const GREETINGS: [&str; 6] = ["hi", "hello", "hey", "yo", "hola", "greetings"];
const GREETING_FILLERS: [&str; 3] = ["there", "all", "everyone"];

/// True when the message is a bare greeting and carries no other content.
pub fn is_greeting(message: &str) -> bool {
    let cleaned: String = message
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let Some((first, rest)) = words.split_first() else {
        return false;
    };
    words.len() <= 2
        && GREETINGS.contains(first)
        && rest
            .iter()
            .all(|w| GREETINGS.contains(w) || GREETING_FILLERS.contains(w))
}

/// Keyword-matched reply used when no provider is reachable.
pub fn canned_reply(message: &str) -> String {
    let msg = message.to_lowercase();
    if is_greeting(&msg) {
        return "Hello! I can tell you about my work, or help you schedule a call. \
                What brings you here?"
            .to_string();
    }
    if msg.contains("skill") || msg.contains("stack") || msg.contains("tech") {
        return "I work across backend services, APIs, and automation. Ask about a \
                specific project if you want details."
            .to_string();
    }
    if msg.contains("project") || msg.contains("portfolio") {
        return "You can browse the projects section for case studies. If one looks \
                close to what you need, tell me about your requirement."
            .to_string();
    }
    // "pric" stem also catches "pricing".
    if msg.contains("pric") || msg.contains("cost") || msg.contains("rate") {
        return "Pricing depends on scope. Share what you want built and we can set \
                up a quick call to talk numbers."
            .to_string();
    }
    if msg.contains("hire") || msg.contains("contact") || msg.contains("work with") {
        return "Happy to talk. Tell me a bit about your project and I will set up a \
                meeting."
            .to_string();
    }
    "Could you tell me a bit more? I can talk about skills, projects, services, or \
     set up a meeting."
        .to_string()
}
