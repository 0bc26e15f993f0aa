//! Shared types for the dialer workspace.
//!
//! This crate provides the call and device state enums used by the
//! collaborator crate (`dialer-voice`), the coordinator (`dialer-session`)
//! and the operator console. Keeping them here lets every layer agree on
//! state names without depending on each other.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the operator's call session.
///
/// The coordinator is the only writer of this value. Everything else
/// observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// No telephony device has been set up yet, or it was torn down.
    #[default]
    Uninitialized,
    /// Fetching the signaling credential and registering the device.
    DeviceInitializing,
    /// The device is registered and no call is in progress.
    DeviceReady,
    /// Credential fetch or device registration failed. No call can be placed.
    DeviceFailed,
    /// A call placement request is in flight.
    Connecting,
    /// The call was placed and media is flowing.
    Active,
    /// A local hangup is being processed.
    Ending,
    /// The last call finished normally.
    Ended,
    /// The last call attempt failed.
    Failed,
}

impl CallState {
    /// Returns the canonical string label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::DeviceInitializing => "device_initializing",
            Self::DeviceReady => "device_ready",
            Self::DeviceFailed => "device_failed",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Ended => "ended",
            Self::Failed => "failed",
        }
    }

    /// Whether a new call attempt may begin from this state.
    pub fn can_start(self) -> bool {
        matches!(self, Self::DeviceReady | Self::Ended | Self::Failed)
    }

    /// Whether the live channel must be held in this state.
    ///
    /// The channel handle exists if and only if this returns `true`.
    pub fn holds_channel(self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }

    /// Whether a call attempt is underway (placed, live, or hanging up).
    pub fn is_call_in_progress(self) -> bool {
        matches!(self, Self::Connecting | Self::Active | Self::Ending)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability status reported by the telephony device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Registered with the signaling backend.
    Ready,
    /// The device reported a fault.
    Error,
    /// The media session ended (local or remote hangup).
    Disconnected,
}

impl DeviceStatus {
    /// Returns the string label for this status.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        }
    }
}
