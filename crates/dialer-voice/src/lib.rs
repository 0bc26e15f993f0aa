//! Call collaborators for the dialer.
//!
//! Three leaf components that the session coordinator drives:
//!
//! - **Device session** ([`DeviceSession`]): fetches a signaling credential,
//!   registers one telephony client, and reports `ready` / `error` /
//!   `disconnected` events.
//! - **Call control** ([`CallControlClient`]): places calls, pushes live
//!   text, and optionally ends calls over HTTP.
//! - **Live channel** ([`WsChannelConnector`]): owns the open/closed
//!   lifetime of the auxiliary relay socket.
//!
//! Each component sits behind a trait so the coordinator can be exercised
//! with fakes.

pub mod channel;
pub mod config;
pub mod control;
pub mod credentials;
pub mod device;
pub mod error;
pub mod signaling;

pub use channel::{ChannelConnector, LiveChannel, WsChannelConnector, WsLiveChannel};
pub use config::{
    ApiConfig, DeviceConfig, StreamConfig, TextRoute, DEFAULT_API_BASE_URL,
    DEFAULT_SIGNALING_URL, DEFAULT_STREAM_URL,
};
pub use control::{CallControl, CallControlClient, PlaceCallResponse, PlacedCall};
pub use credentials::{CredentialSource, HttpCredentialSource};
pub use device::{
    DeviceEvent, DeviceEventSink, DeviceHandle, DeviceSession, TelephonyConnector,
    TelephonyDevice,
};
pub use error::VoiceError;
pub use signaling::{SignalingConnector, SignalingDevice};
