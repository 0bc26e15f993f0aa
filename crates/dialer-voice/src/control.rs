//! Call-control HTTP client: place calls, push live text, end calls.
//!
//! Every operation is a single request. Nothing is retried or cached.

use crate::config::{ApiConfig, TextRoute};
use crate::error::VoiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Placement failures without an `error` field get this reason.
const UNKNOWN_PLACEMENT_ERROR: &str = "unknown error";

/// Body of `POST /call`.
#[derive(Debug, Serialize)]
pub struct PlaceCallRequest<'a> {
    pub to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}

/// Response of `POST /call`. Both the success and error shapes decode into
/// this struct; [`PlaceCallResponse::into_result`] decides which one it was.
#[derive(Debug, Default, Deserialize)]
pub struct PlaceCallResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PlaceCallResponse {
    /// Only `status == "success"` counts as a placed call, regardless of the
    /// HTTP status the body arrived with.
    pub fn into_result(self) -> Result<PlacedCall, VoiceError> {
        if self.status.as_deref() == Some("success") {
            return Ok(PlacedCall {
                call_id: self.call_sid,
            });
        }
        Err(VoiceError::CallPlacement(
            self.error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| UNKNOWN_PLACEMENT_ERROR.to_string()),
        ))
    }
}

/// A call accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedCall {
    /// Server-side call identifier, when the backend returns one.
    pub call_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTextRequest<'a> {
    call_sid: Option<&'a str>,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct PushTtsRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EndCallRequest<'a> {
    call_sid: Option<&'a str>,
}

/// Request/response operations against the call-control backend.
#[async_trait]
pub trait CallControl: Send + Sync {
    async fn place_call(
        &self,
        target: &str,
        initial_text: Option<&str>,
    ) -> Result<PlacedCall, VoiceError>;

    /// Best-effort push of spoken text into the live call.
    async fn push_text(&self, call_id: Option<&str>, text: &str) -> Result<(), VoiceError>;

    /// Optional server-side hangup. A no-op when the backend has no such endpoint.
    async fn end_call(&self, call_id: Option<&str>) -> Result<(), VoiceError>;
}

/// [`CallControl`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct CallControlClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl CallControlClient {
    pub fn new(config: ApiConfig) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CallControl for CallControlClient {
    async fn place_call(
        &self,
        target: &str,
        initial_text: Option<&str>,
    ) -> Result<PlacedCall, VoiceError> {
        let response = self
            .http
            .post(self.config.endpoint("/call"))
            .json(&PlaceCallRequest {
                to: target,
                text: initial_text,
            })
            .send()
            .await
            .map_err(|e| VoiceError::CallPlacement(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VoiceError::CallPlacement(format!("failed to read response: {}", e)))?;

        let parsed: PlaceCallResponse = serde_json::from_str(&body).map_err(|e| {
            VoiceError::CallPlacement(format!("invalid response (HTTP {}): {}", status, e))
        })?;
        let placed = parsed.into_result()?;

        info!(to = target, call_id = ?placed.call_id, "call placed");
        Ok(placed)
    }

    async fn push_text(&self, call_id: Option<&str>, text: &str) -> Result<(), VoiceError> {
        let route = self.config.text_route;
        let request = self.http.post(self.config.endpoint(route.path()));
        let request = match route {
            TextRoute::SendText => request.json(&SendTextRequest {
                call_sid: call_id,
                text,
            }),
            TextRoute::PushTts => request.json(&PushTtsRequest { text }),
        };

        let response = request
            .send()
            .await
            .map_err(|e| VoiceError::TextDispatch(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(VoiceError::TextDispatch(format!(
                "{} returned {}",
                route.path(),
                response.status()
            )));
        }

        debug!(call_id = ?call_id, chars = text.chars().count(), "text pushed");
        Ok(())
    }

    async fn end_call(&self, call_id: Option<&str>) -> Result<(), VoiceError> {
        let Some(path) = self.config.end_call_path.as_deref() else {
            debug!("no end-call endpoint configured; relying on local teardown");
            return Ok(());
        };

        let response = self
            .http
            .post(self.config.endpoint(path))
            .json(&EndCallRequest { call_sid: call_id })
            .send()
            .await
            .map_err(|e| VoiceError::CallTermination(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(VoiceError::CallTermination(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<PlacedCall, VoiceError> {
        serde_json::from_str::<PlaceCallResponse>(body)
            .unwrap()
            .into_result()
    }

    #[test]
    fn success_with_call_sid() {
        assert_eq!(
            parse(r#"{"status":"success","call_sid":"CA123","message":"ok"}"#),
            Ok(PlacedCall {
                call_id: Some("CA123".to_string())
            })
        );
    }

    #[test]
    fn success_without_call_sid() {
        assert_eq!(
            parse(r#"{"status":"success"}"#),
            Ok(PlacedCall { call_id: None })
        );
    }

    #[test]
    fn error_status_carries_reason() {
        assert_eq!(
            parse(r#"{"status":"error","error":"busy"}"#),
            Err(VoiceError::CallPlacement("busy".to_string()))
        );
    }

    #[test]
    fn bare_error_body_is_a_failure() {
        assert_eq!(
            parse(r#"{"error":"missing parameters"}"#),
            Err(VoiceError::CallPlacement("missing parameters".to_string()))
        );
        assert_eq!(
            parse("{}"),
            Err(VoiceError::CallPlacement("unknown error".to_string()))
        );
    }

    #[test]
    fn send_text_body_uses_camel_case() {
        let json = serde_json::to_value(SendTextRequest {
            call_sid: Some("CA1"),
            text: "hello",
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "callSid": "CA1", "text": "hello" }));
    }
}
