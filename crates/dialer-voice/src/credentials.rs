use crate::config::{ApiConfig, DeviceConfig};
use crate::error::VoiceError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Source of the signaling credential used to register the device.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetches a credential. Single attempt; callers layer retries if they want them.
    async fn fetch_token(&self) -> Result<String, VoiceError>;
}

/// Fetches credentials from `GET {base_url}/token`.
#[derive(Debug, Clone)]
pub struct HttpCredentialSource {
    http: reqwest::Client,
    url: String,
    identity: Option<String>,
}

impl HttpCredentialSource {
    pub fn new(api: &ApiConfig, device: &DeviceConfig) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: api.endpoint("/token"),
            identity: device.identity.clone(),
        })
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch_token(&self) -> Result<String, VoiceError> {
        let mut request = self.http.get(&self.url);
        if let Some(identity) = &self.identity {
            request = request.query(&[("identity", identity)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VoiceError::CredentialFetch(format!("token endpoint unreachable: {}", e)))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| VoiceError::CredentialFetch(format!("invalid token response: {}", e)))?;

        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("token endpoint returned {}", status));
            return Err(VoiceError::CredentialFetch(detail));
        }

        token_from_body(&body)
    }
}

/// Extracts `token` from a `{ token: string }` body. Any other shape is rejected.
pub fn token_from_body(body: &Value) -> Result<String, VoiceError> {
    match body.get("token") {
        Some(Value::String(token)) => {
            info!(token_len = token.len(), "received signaling credential");
            Ok(token.clone())
        }
        Some(other) => {
            debug!(kind = %json_kind(other), "token field has the wrong type");
            Err(VoiceError::CredentialFetch(
                "token is not a valid string".to_string(),
            ))
        }
        None => Err(VoiceError::CredentialFetch(
            "response has no token field".to_string(),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
