use chrono::{NaiveDate, Utc};
use dialog_flow::CreationStep;
use serde_json::Value;

/// The fixed step table for the guided policy-creation dialogue. One static
/// table shared by all sessions; progress lives in the conversation state.
pub static CREATION_STEPS: &[CreationStep] = &[
    CreationStep {
        key: "policy_number",
        prompt: "Let's add a new policy. What is the policy number? (at least 6 characters)",
        validator: Some(validate_policy_number),
        transform: None,
    },
    CreationStep {
        key: "provider",
        prompt: "Which insurance provider issued the policy?",
        validator: Some(validate_required),
        transform: None,
    },
    CreationStep {
        key: "first_name",
        prompt: "What is the member's first name?",
        validator: Some(validate_required),
        transform: None,
    },
    CreationStep {
        key: "last_name",
        prompt: "What is the member's last name?",
        validator: Some(validate_required),
        transform: None,
    },
    CreationStep {
        key: "dob",
        prompt: "What is the member's date of birth? Please use YYYY-MM-DD.",
        validator: Some(validate_dob),
        transform: None,
    },
    CreationStep {
        key: "coverage_amount",
        prompt: "What is the coverage amount?",
        validator: Some(validate_amount),
        transform: Some(to_amount),
    },
    CreationStep {
        key: "premium_amount",
        prompt: "What is the premium amount?",
        validator: Some(validate_amount),
        transform: Some(to_amount),
    },
    CreationStep {
        key: "expiry_date",
        prompt: "When does the policy expire? Please use YYYY-MM-DD.",
        validator: Some(validate_expiry_date),
        transform: None,
    },
];

fn validate_policy_number(input: &str) -> Option<String> {
    (input.len() < 6).then(|| "Policy number must be at least 6 characters.".to_string())
}

fn validate_required(input: &str) -> Option<String> {
    input
        .is_empty()
        .then(|| "This field cannot be empty.".to_string())
}

fn parse_iso_date(input: &str) -> Option<NaiveDate> {
    // strict YYYY-MM-DD: chrono alone would accept unpadded months/days
    let mut segments = input.split('-');
    let (y, m, d) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || y.len() != 4 || m.len() != 2 || d.len() != 2 {
        return None;
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

fn validate_dob(input: &str) -> Option<String> {
    match parse_iso_date(input) {
        None => Some("Date of birth must be a real date in YYYY-MM-DD format.".to_string()),
        Some(date) if date > Utc::now().date_naive() => {
            Some("Date of birth cannot be in the future.".to_string())
        }
        Some(_) => None,
    }
}

fn validate_expiry_date(input: &str) -> Option<String> {
    match parse_iso_date(input) {
        None => Some("Expiry date must be a real date in YYYY-MM-DD format.".to_string()),
        Some(date) if date <= Utc::now().date_naive() => {
            Some("Expiry date must be after today.".to_string())
        }
        Some(_) => None,
    }
}

fn validate_amount(input: &str) -> Option<String> {
    match input.parse::<f64>() {
        Ok(value) if value > 0.0 => None,
        _ => Some("Please enter an amount greater than zero.".to_string()),
    }
}

fn to_amount(input: &str) -> Value {
    input.parse::<f64>().map(Value::from).unwrap_or(Value::Null)
}
