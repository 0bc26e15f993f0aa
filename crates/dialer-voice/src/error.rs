use thiserror::Error;

/// Faults raised by the call collaborators.
///
/// Every variant carries a string detail so the error stays `Clone` and can
/// be fanned out to several notification subscribers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("credential fetch failed: {0}")]
    CredentialFetch(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("call placement failed: {0}")]
    CallPlacement(String),

    #[error("text dispatch failed: {0}")]
    TextDispatch(String),

    #[error("call termination failed: {0}")]
    CallTermination(String),

    #[error("live channel error: {0}")]
    Channel(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
