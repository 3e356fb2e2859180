use dialog_flow::ConversationState;
use regex::Regex;
use std::sync::LazyLock;

/// The classified purpose of a single utterance, one variant per handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// An active guided flow consumes the message regardless of content
    GuidedStep,
    CountPolicies,
    StartCreation,
    /// Carries the first 6-digit token found in the message
    PolicyNumberLookup(String),
    MemberLookup {
        first_name: String,
        last_name: String,
    },
    /// Insurance-related question, answered with enriched context
    InsuranceQuestion,
    SmallTalk,
}

static POLICY_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{6})\b").expect("valid policy number pattern"));

static MEMBER_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:for|member)\s+([A-Za-z]+)\s+([A-Za-z]+)").expect("valid member pattern")
});

const INSURANCE_KEYWORDS: &[&str] = &["cover", "valid", "expire", "policy", "benefit", "claim"];

/// Map a trimmed, non-empty utterance to exactly one routing decision.
/// Priority is fixed; the first matching rule wins. Pure, no side effects.
pub fn classify(state: &ConversationState, utterance: &str) -> Intent {
    if state.is_creating() {
        return Intent::GuidedStep;
    }

    let lower = utterance.to_lowercase();
    if is_count_query(&lower) {
        return Intent::CountPolicies;
    }
    if is_creation_request(&lower) {
        return Intent::StartCreation;
    }
    if let Some(number) = extract_policy_number(utterance) {
        return Intent::PolicyNumberLookup(number);
    }
    if let Some((first_name, last_name)) = parse_member_name(utterance) {
        return Intent::MemberLookup {
            first_name,
            last_name,
        };
    }
    if has_insurance_keyword(&lower) {
        return Intent::InsuranceQuestion;
    }
    Intent::SmallTalk
}

fn is_count_query(lower: &str) -> bool {
    let asks_quantity = ["how many", "count", "number"]
        .iter()
        .any(|p| lower.contains(p));
    asks_quantity && lower.contains("policies")
}

fn is_creation_request(lower: &str) -> bool {
    (lower.contains("add") || lower.contains("create")) && lower.contains("policy")
}

/// First 6-digit token in the message, if any
pub fn extract_policy_number(utterance: &str) -> Option<String> {
    POLICY_NUMBER_RE
        .captures(utterance)
        .map(|caps| caps[1].to_string())
}

/// Read a two-token person name out of the message: explicit "for X Y" /
/// "member X Y" phrasing first, else the last two alphabetic words.
///
/// Also used by the orchestrator to retry a failed policy-number lookup as a
/// member lookup on the same utterance.
pub fn parse_member_name(utterance: &str) -> Option<(String, String)> {
    if let Some(caps) = MEMBER_PHRASE_RE.captures(utterance) {
        return Some((caps[1].to_string(), caps[2].to_string()));
    }

    let words: Vec<&str> = utterance
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty() && w.chars().all(|c| c.is_alphabetic()))
        .collect();
    if words.len() < 2 {
        return None;
    }
    Some((
        words[words.len() - 2].to_string(),
        words[words.len() - 1].to_string(),
    ))
}

pub fn has_insurance_keyword(lower: &str) -> bool {
    INSURANCE_KEYWORDS.iter().any(|k| lower.contains(k))
}
