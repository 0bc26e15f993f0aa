//! Dialer configuration loading from file and environment variables.

use dialer_voice::{ApiConfig, DeviceConfig, StreamConfig, TextRoute};
use serde::Deserialize;
use thiserror::Error;

/// Config file used when neither a CLI argument nor `DIALER_CONFIG_PATH`
/// names one.
pub const DEFAULT_CONFIG_PATH: &str = "dialer.toml";

/// Top-level dialer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DialerConfig {
    /// Call-control backend.
    #[serde(default)]
    pub api: ApiConfig,

    /// Telephony device registration.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Live channel socket.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dialer_session=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override held a value that does not parse.
    #[error("invalid value for {var}: {reason}")]
    InvalidOverride { var: &'static str, reason: String },
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `DIALER_API_BASE_URL` overrides `api.base_url`
/// - `DIALER_TEXT_ROUTE` overrides `api.text_route` (`send_text` or `push_tts`)
/// - `DIALER_SIGNALING_URL` overrides `device.signaling_url`
/// - `DIALER_IDENTITY` overrides `device.identity`
/// - `DIALER_STREAM_URL` overrides `stream.url`
/// - `DIALER_LOG_LEVEL` overrides `logging.level`
/// - `DIALER_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if `DIALER_TEXT_ROUTE` names an unknown route.
pub fn load_config(path: Option<&str>) -> Result<DialerConfig, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                DialerConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => DialerConfig::default(),
    };

    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    Ok(config)
}

/// Applies `DIALER_*` overrides read through `lookup`. Empty values are
/// ignored.
pub fn apply_overrides(
    config: &mut DialerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

    if let Some(url) = get("DIALER_API_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(route) = get("DIALER_TEXT_ROUTE") {
        config.api.text_route = route
            .parse::<TextRoute>()
            .map_err(|reason| ConfigError::InvalidOverride {
                var: "DIALER_TEXT_ROUTE",
                reason,
            })?;
    }
    if let Some(url) = get("DIALER_SIGNALING_URL") {
        config.device.signaling_url = url;
    }
    if let Some(identity) = get("DIALER_IDENTITY") {
        config.device.identity = Some(identity);
    }
    if let Some(url) = get("DIALER_STREAM_URL") {
        config.stream.url = url;
    }
    if let Some(level) = get("DIALER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = get("DIALER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = DialerConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.api.text_route, TextRoute::SendText);
        assert_eq!(config.api.end_call_path, None);
        assert_eq!(config.stream.url, "ws://localhost:5000/stream");
        assert_eq!(config.device.codec_preferences, vec!["opus", "pcmu"]);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn parses_every_section() {
        let config: DialerConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://calls.example.com"
            request_timeout_secs = 5
            text_route = "push_tts"
            end_call_path = "/end-call"

            [device]
            signaling_url = "wss://calls.example.com/signaling"
            identity = "operator-7"
            codec_preferences = ["pcmu"]

            [stream]
            url = "wss://calls.example.com/stream"

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://calls.example.com");
        assert_eq!(config.api.request_timeout_secs, 5);
        assert_eq!(config.api.text_route, TextRoute::PushTts);
        assert_eq!(config.api.end_call_path.as_deref(), Some("/end-call"));
        assert_eq!(config.device.identity.as_deref(), Some("operator-7"));
        assert_eq!(config.device.codec_preferences, vec!["pcmu"]);
        assert_eq!(config.stream.url, "wss://calls.example.com/stream");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config: DialerConfig = toml::from_str(
            r#"
            [device]
            identity = "desk-2"
            "#,
        )
        .unwrap();
        assert_eq!(config.device.identity.as_deref(), Some("desk-2"));
        assert_eq!(config.device.signaling_url, "ws://localhost:5000/signaling");
        assert_eq!(config.api.request_timeout_secs, 15);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.api.base_url, DialerConfig::default().api.base_url);
    }

    #[test]
    fn loads_from_file() {
        let file = write_config("[api]\nbase_url = \"http://10.0.0.5:5000\"\n");
        let mut config: DialerConfig =
            toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        apply_overrides(&mut config, overrides(&[])).unwrap();
        assert_eq!(config.api.base_url, "http://10.0.0.5:5000");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = write_config("[api\nbase_url = ");
        let result = load_config(file.path().to_str());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config: DialerConfig =
            toml::from_str("[api]\nbase_url = \"http://file\"\n").unwrap();
        apply_overrides(
            &mut config,
            overrides(&[
                ("DIALER_API_BASE_URL", "http://env"),
                ("DIALER_TEXT_ROUTE", "push-tts"),
                ("DIALER_IDENTITY", "night-shift"),
                ("DIALER_STREAM_URL", "ws://env/stream"),
                ("DIALER_SIGNALING_URL", "ws://env/signaling"),
                ("DIALER_LOG_LEVEL", "dialer_session=debug"),
                ("DIALER_LOG_JSON", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://env");
        assert_eq!(config.api.text_route, TextRoute::PushTts);
        assert_eq!(config.device.identity.as_deref(), Some("night-shift"));
        assert_eq!(config.stream.url, "ws://env/stream");
        assert_eq!(config.device.signaling_url, "ws://env/signaling");
        assert_eq!(config.logging.level, "dialer_session=debug");
        assert!(config.logging.json);
    }

    #[test]
    fn empty_override_is_ignored() {
        let mut config = DialerConfig::default();
        apply_overrides(&mut config, overrides(&[("DIALER_API_BASE_URL", "  ")])).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5000");
    }

    #[test]
    fn unknown_text_route_is_rejected() {
        let mut config = DialerConfig::default();
        let result = apply_overrides(&mut config, overrides(&[("DIALER_TEXT_ROUTE", "sms")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride {
                var: "DIALER_TEXT_ROUTE",
                ..
            })
        ));
    }
}
