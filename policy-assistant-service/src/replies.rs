//! All user-facing assistant copy lives here, so handlers stay readable and
//! tests can assert on behavior without string-matching in five places.

use dialog_flow::AssistantError;

use crate::gateway::policy_api::PolicyRecord;
use crate::intent;

pub fn policy_details(record: &PolicyRecord) -> String {
    format!(
        "Here is what I found for policy {}:\n{}",
        record.policy_number.as_deref().unwrap_or("(no number)"),
        record_summary(record)
    )
}

pub fn member_matches(first_name: &str, last_name: &str, records: &[PolicyRecord]) -> String {
    let plural = if records.len() == 1 { "policy" } else { "policies" };
    let summaries = records
        .iter()
        .map(record_summary)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "I found {} {} for {} {}:\n{}",
        records.len(),
        plural,
        first_name,
        last_name,
        summaries
    )
}

pub fn record_summary(record: &PolicyRecord) -> String {
    let mut lines = Vec::new();
    if let Some(number) = &record.policy_number {
        lines.push(format!("- Policy number: {number}"));
    }
    if let Some(provider) = &record.provider {
        lines.push(format!("- Provider: {provider}"));
    }
    match (&record.first_name, &record.last_name) {
        (Some(first), Some(last)) => lines.push(format!("- Member: {first} {last}")),
        (None, Some(last)) => lines.push(format!("- Member: {last}")),
        _ => {}
    }
    if let Some(status) = &record.coverage_status {
        lines.push(format!("- Coverage status: {status}"));
    }
    if let Some(amount) = record.coverage_amount {
        lines.push(format!("- Coverage amount: ${amount:.2}"));
    }
    if let Some(amount) = record.premium_amount {
        lines.push(format!("- Premium: ${amount:.2}"));
    }
    if let Some(expiry) = &record.expiry_date {
        lines.push(format!("- Expires: {expiry}"));
    }
    if lines.is_empty() {
        lines.push("- (no details on record)".to_string());
    }
    lines.join("\n")
}

pub fn count_reply(count: usize) -> String {
    format!("There are {count} saved policies.")
}

pub fn count_failure(error: &AssistantError) -> String {
    format!("I couldn't count the saved policies right now ({error}). Please try again in a moment.")
}

pub fn create_success(record: &PolicyRecord) -> String {
    match &record.policy_number {
        Some(number) => format!("All done! Policy {number} has been saved."),
        None => "All done! The policy has been saved.".to_string(),
    }
}

pub fn create_failure(error: &AssistantError) -> String {
    format!(
        "I collected everything, but saving the policy failed ({error}). The draft was discarded; say \"add a policy\" to start over."
    )
}

pub fn creation_cancelled() -> String {
    "No problem, I've discarded that draft. Ask me anything else, or say \"add a policy\" to start again.".to_string()
}

pub fn unrecognized_policy_note(policy_number: &str) -> String {
    format!("Note: policy number {policy_number} was not recognized in the system.")
}

/// Single apologetic message for an unhandled gateway failure. The trailing
/// clause depends on what the user seemed to be asking about.
pub fn failure_reply(utterance: &str) -> String {
    let base = "I'm sorry, something went wrong while I was looking into that.";
    let hint = if intent::extract_policy_number(utterance).is_some() {
        "You can also try the manual policy lookup screen to verify that number."
    } else if intent::has_insurance_keyword(&utterance.to_lowercase()) {
        "Could you share your member ID so I can check the policy directly?"
    } else {
        "Please try again in a moment, or ask me about a specific policy."
    };
    format!("{base} {hint}")
}

/// Deterministic reply used when no model credential is configured.
pub fn offline_reply(records: &[PolicyRecord]) -> String {
    if records.is_empty() {
        return "I can look up a policy by its 6-digit number or by member name, count the saved policies, or walk you through adding a new one. What would you like to do?".to_string();
    }
    let summaries = records
        .iter()
        .map(record_summary)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Here's what I can tell you from the records I have:\n{summaries}")
}
