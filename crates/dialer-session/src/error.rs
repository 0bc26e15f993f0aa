//! Error types for the session coordinator.

use dialer_types::CallState;
use dialer_voice::VoiceError;

/// Errors surfaced by the coordinator, either synchronously to a command or
/// through an [`crate::Notification::Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The command is not allowed in the current state. Nothing was sent.
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: CallState,
    },

    /// The call target is empty.
    #[error("a phone number is required")]
    InvalidTarget,

    /// A collaborator fault.
    #[error(transparent)]
    Voice(#[from] VoiceError),

    /// The coordinator has shut down.
    #[error("session coordinator has shut down")]
    Closed,
}
