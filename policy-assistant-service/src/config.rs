use std::env;

/// Runtime configuration, read once at startup.
///
/// A missing `GEMINI_API_KEY` is not an error: the assistant falls back to
/// deterministic templated replies and never calls the model.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub policy_api_base: String,
    pub policy_api_token: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());

        Self {
            policy_api_base: env::var("POLICY_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000/api/v1".to_string()),
            policy_api_token: env::var("POLICY_API_TOKEN").unwrap_or_default(),
            gemini_api_key,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }
}
