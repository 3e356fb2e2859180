use async_trait::async_trait;
use dialog_flow::{AssistantError, PolicyDraft, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A policy record as the external API returns it. The assistant never owns
/// this data; every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy_number: Option<String>,
    pub provider: Option<String>,
    pub member_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
    pub coverage_status: Option<String>,
    pub coverage_amount: Option<f64>,
    pub premium_amount: Option<f64>,
    pub expiry_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PolicyListResponse {
    policies: Vec<PolicyRecord>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: String,
}

/// Boundary to the external policy REST service. Single attempt per
/// operation; failures come back as error values, never panics.
#[async_trait]
pub trait PolicyApi: Send + Sync {
    /// `Ok(None)` means the number is unknown (HTTP 404); callers present
    /// different copy for that than for transport failures.
    async fn lookup_by_number(&self, policy_number: &str) -> Result<Option<PolicyRecord>>;

    /// Empty result is not an error.
    async fn lookup_by_member(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<PolicyRecord>>;

    /// Length of the fetched policy collection. Failure surfaces as an
    /// error, never as zero.
    async fn count(&self) -> Result<usize>;

    async fn create(&self, payload: Value) -> Result<PolicyRecord>;
}

pub struct HttpPolicyGateway {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpPolicyGateway {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PolicyApi for HttpPolicyGateway {
    async fn lookup_by_number(&self, policy_number: &str) -> Result<Option<PolicyRecord>> {
        debug!(policy_number, "looking up policy by number");
        let response = self
            .client
            .get(self.url("/policies/lookup"))
            .query(&[("policy_number", policy_number)])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Transport(error_message(status, &body)));
        }

        let record = response
            .json::<PolicyRecord>()
            .await
            .map_err(|e| AssistantError::Transport(format!("malformed policy response: {e}")))?;
        Ok(Some(record))
    }

    async fn lookup_by_member(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<PolicyRecord>> {
        debug!(first_name, last_name, "looking up policies by member");
        let response = self
            .client
            .get(self.url("/policies/search"))
            .query(&[("first_name", first_name), ("last_name", last_name)])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Transport(error_message(status, &body)));
        }

        let list = response
            .json::<PolicyListResponse>()
            .await
            .map_err(|e| AssistantError::Transport(format!("malformed search response: {e}")))?;
        Ok(list.policies)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .get(self.url("/policies"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Transport(error_message(status, &body)));
        }

        let list = response
            .json::<PolicyListResponse>()
            .await
            .map_err(|e| AssistantError::Transport(format!("malformed list response: {e}")))?;
        Ok(list.policies.len())
    }

    async fn create(&self, payload: Value) -> Result<PolicyRecord> {
        debug!("submitting new policy record");
        let response = self
            .client
            .post(self.url("/policies"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Transport(error_message(status, &body)));
        }

        response
            .json::<PolicyRecord>()
            .await
            .map_err(|e| AssistantError::Transport(format!("malformed create response: {e}")))
    }
}

/// Prefer the API's own `detail` field; fall back to a generic message when
/// the error body is not the expected JSON.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.detail,
        Err(_) => format!("policy API returned HTTP {}", status.as_u16()),
    }
}

/// Turn a completed draft into the create-endpoint payload. The flow never
/// collects a member id, so a synthetic one is generated here.
pub fn create_payload(draft: PolicyDraft) -> Value {
    let mut fields = draft.into_inner();
    fields.insert(
        "member_id".to_string(),
        Value::String(synthetic_member_id()),
    );
    Value::Object(fields)
}

fn synthetic_member_id() -> String {
    format!("{:06}", rand::random::<u32>() % 1_000_000)
}
