//! Implicit feedback scoring and the reply-redaction pass.
//!
//! The visitor's message is treated as implicit feedback on the turn:
//! a low score turns the turn's reply into a learning rule, and every
//! outbound reply is scrubbed of rule text before it leaves.

use chrono::Utc;
use porter_schema::LearningRule;

const POSITIVE: [&str; 6] = ["thanks", "great", "helpful", "yes", "ok", "sure"];
const NEGATIVE: [&str; 6] = ["no", "not", "confused", "wrong", "bad", "later"];

/// Below this the turn's reply is recorded as something to avoid.
pub const LEARN_THRESHOLD: f64 = 0.4;

/// Rules keep only a prefix of the offending reply.
const AVOID_TEXT_LEN: usize = 80;

/// Crude sentiment: base 0.5, nudged by keyword hits, clamped to [0, 1].
pub fn implicit_score(user_message: &str) -> f64 {
    let msg = user_message.to_lowercase();
    let mut score: f64 = 0.5;
    if POSITIVE.iter().any(|k| msg.contains(k)) {
        score += 0.3;
    }
    if NEGATIVE.iter().any(|k| msg.contains(k)) {
        score -= 0.3;
    }
    score.clamp(0.0, 1.0)
}

pub fn should_learn(score: f64) -> bool {
    score < LEARN_THRESHOLD
}

/// Build a rule from a reply that scored poorly.
pub fn rule_from_reply(
    reply: &str,
    user_message: &str,
    intent: Option<String>,
    score: f64,
) -> LearningRule {
    LearningRule {
        avoid_text: truncate_chars(reply.trim(), AVOID_TEXT_LEN),
        reason: "low implicit feedback score".to_string(),
        created_at: Utc::now(),
        intent,
        user_message: Some(user_message.to_string()),
        score: Some(score),
    }
}

/// Strip every rule's `avoid_text` from the reply, case-insensitively.
pub fn redact(reply: &str, rules: &[LearningRule]) -> String {
    let mut out = reply.to_string();
    let mut removed = false;
    for rule in rules {
        if rule.avoid_text.is_empty() {
            continue;
        }
        while let Some((start, end)) = find_ci(&out, &rule.avoid_text) {
            out.replace_range(start..end, "");
            removed = true;
        }
    }
    if !removed {
        // A clean reply keeps its original formatting.
        return out;
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Byte range of the first case-insensitive occurrence of `needle`.
fn find_ci(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }
    let indices: Vec<(usize, char)> = haystack.char_indices().collect();
    'outer: for start in 0..indices.len() {
        let mut pos = start;
        let mut matched = 0;
        while matched < needle.len() {
            let Some(&(_, c)) = indices.get(pos) else {
                continue 'outer;
            };
            for lc in c.to_lowercase() {
                if needle.get(matched) != Some(&lc) {
                    continue 'outer;
                }
                matched += 1;
            }
            pos += 1;
        }
        let (start_byte, _) = indices[start];
        let end_byte = indices
            .get(pos)
            .map(|&(i, _)| i)
            .unwrap_or(haystack.len());
        return Some((start_byte, end_byte));
    }
    None
}
