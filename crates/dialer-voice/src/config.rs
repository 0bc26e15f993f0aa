use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_SIGNALING_URL: &str = "ws://localhost:5000/signaling";
pub const DEFAULT_STREAM_URL: &str = "ws://localhost:5000/stream";

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_signaling_url() -> String {
    DEFAULT_SIGNALING_URL.to_string()
}

fn default_codec_preferences() -> Vec<String> {
    vec!["opus".to_string(), "pcmu".to_string()]
}

fn default_register_timeout_secs() -> u64 {
    10
}

fn default_stream_url() -> String {
    DEFAULT_STREAM_URL.to_string()
}

/// Which endpoint carries live text while a call is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRoute {
    /// `POST /send-text` with `{ callSid, text }`.
    #[default]
    SendText,
    /// `POST /push_tts` with `{ text }`; not addressed to a call.
    PushTts,
}

impl TextRoute {
    pub fn path(self) -> &'static str {
        match self {
            Self::SendText => "/send-text",
            Self::PushTts => "/push_tts",
        }
    }
}

impl std::str::FromStr for TextRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send_text" | "send-text" => Ok(Self::SendText),
            "push_tts" | "push-tts" => Ok(Self::PushTts),
            other => Err(format!("unknown text route: {other}")),
        }
    }
}

/// Call-control HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the call-control backend (token, call, text endpoints).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub text_route: TextRoute,

    /// Optional server-side hangup endpoint (e.g. `/end-call`). When unset,
    /// ending a call only tears down local device media.
    #[serde(default)]
    pub end_call_path: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            text_route: TextRoute::default(),
            end_call_path: None,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Joins `path` onto the base URL without doubling slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Telephony device registration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_signaling_url")]
    pub signaling_url: String,

    /// Identity requested from the token endpoint (`?identity=`). The
    /// backend picks a default when unset.
    #[serde(default)]
    pub identity: Option<String>,

    /// Codecs offered at registration, most preferred first.
    #[serde(default = "default_codec_preferences")]
    pub codec_preferences: Vec<String>,

    /// How long to wait for the signaling backend to acknowledge registration.
    #[serde(default = "default_register_timeout_secs")]
    pub register_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            signaling_url: default_signaling_url(),
            identity: None,
            codec_preferences: default_codec_preferences(),
            register_timeout_secs: default_register_timeout_secs(),
        }
    }
}

/// Live channel socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_url")]
    pub url: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: default_stream_url(),
        }
    }
}
