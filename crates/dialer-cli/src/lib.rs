//! Operator console for the dialer.
//!
//! The `dialer` binary wires the HTTP and WebSocket collaborators from
//! `dialer-voice` into a `dialer-session` coordinator and drives it from
//! stdin. Config loading and console parsing live here so they can be
//! tested without a terminal.

pub mod config;
pub mod console;

use dialer_session::{Collaborators, SessionError};
use dialer_voice::{
    CallControlClient, DeviceSession, HttpCredentialSource, SignalingConnector, VoiceError,
    WsChannelConnector,
};
use std::sync::Arc;
use thiserror::Error;

/// Startup and runtime failures of the binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("console I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the production collaborators from configuration.
pub fn build_collaborators(config: &config::DialerConfig) -> Result<Collaborators, CliError> {
    let credentials = HttpCredentialSource::new(&config.api, &config.device)?;
    let control = CallControlClient::new(config.api.clone())?;
    Ok(Collaborators {
        device: DeviceSession::new(
            Arc::new(credentials),
            Arc::new(SignalingConnector::new(config.device.clone())),
        ),
        control: Arc::new(control),
        channels: Arc::new(WsChannelConnector::new(config.stream.url.clone())),
    })
}
