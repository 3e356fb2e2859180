use thiserror::Error;

/// Error taxonomy for the assistant.
///
/// `NotFound` is an expected outcome with its own user-facing copy, not a
/// failure; `Configuration` switches callers to deterministic fallback
/// behavior instead of surfacing to the user.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("record not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("language model error: {0}")]
    Provider(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("missing configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AssistantError>;
