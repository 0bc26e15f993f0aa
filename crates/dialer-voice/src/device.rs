//! Device session: credential fetch, registration, and teardown of one
//! telephony client.

use crate::credentials::CredentialSource;
use crate::error::VoiceError;
use async_trait::async_trait;
use dialer_types::DeviceStatus;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle events raised by a registered telephony device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Registration with the signaling backend completed.
    Ready,
    /// A fault was reported. Does not by itself end a call.
    Error(String),
    /// The media session ended. Local and remote hangups look the same.
    Disconnected,
}

impl DeviceEvent {
    pub fn status(&self) -> DeviceStatus {
        match self {
            Self::Ready => DeviceStatus::Ready,
            Self::Error(_) => DeviceStatus::Error,
            Self::Disconnected => DeviceStatus::Disconnected,
        }
    }
}

/// Where a device delivers its events.
///
/// The coordinator wraps its own inbound queue in a sink so device events
/// are serialized with every other event it handles.
#[derive(Clone)]
pub struct DeviceEventSink {
    emit: Arc<dyn Fn(DeviceEvent) + Send + Sync>,
}

impl DeviceEventSink {
    pub fn new(emit: impl Fn(DeviceEvent) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    /// A sink that forwards into an unbounded channel.
    pub fn from_sender(tx: mpsc::UnboundedSender<DeviceEvent>) -> Self {
        Self::new(move |event| {
            let _ = tx.send(event);
        })
    }

    pub fn emit(&self, event: DeviceEvent) {
        (self.emit)(event);
    }
}

impl fmt::Debug for DeviceEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceEventSink").finish_non_exhaustive()
    }
}

/// A constructed (but possibly not yet registered) telephony client.
#[async_trait]
pub trait TelephonyDevice: Send {
    /// Registers with the signaling backend. Resolves once registration is
    /// acknowledged.
    async fn register(&mut self) -> Result<(), VoiceError>;

    /// Hangs up any active media session. The device reports
    /// [`DeviceEvent::Disconnected`] when the session is gone.
    fn disconnect_all(&mut self);

    /// Releases the client. Called at most once by [`DeviceHandle`].
    fn destroy(&mut self);
}

/// Builds telephony clients from a signaling credential.
#[async_trait]
pub trait TelephonyConnector: Send + Sync {
    async fn connect(
        &self,
        token: &str,
        sink: DeviceEventSink,
    ) -> Result<Box<dyn TelephonyDevice>, VoiceError>;
}

/// Obtains a credential and registers one telephony client.
#[derive(Clone)]
pub struct DeviceSession {
    credentials: Arc<dyn CredentialSource>,
    connector: Arc<dyn TelephonyConnector>,
}

impl DeviceSession {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        connector: Arc<dyn TelephonyConnector>,
    ) -> Self {
        Self {
            credentials,
            connector,
        }
    }

    /// Fetches a credential, constructs the client, and registers it.
    ///
    /// Credential faults are returned as [`VoiceError::CredentialFetch`]; a
    /// client that fails to register is destroyed before the error is
    /// returned.
    pub async fn initialize(&self, sink: DeviceEventSink) -> Result<DeviceHandle, VoiceError> {
        let token = self.credentials.fetch_token().await?;
        let mut device = self.connector.connect(&token, sink).await?;

        if let Err(e) = device.register().await {
            warn!(error = %e, "device registration failed");
            device.destroy();
            return Err(e);
        }

        info!("telephony device registered");
        Ok(DeviceHandle::new(device))
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession").finish_non_exhaustive()
    }
}

/// Owning handle to a registered telephony client.
///
/// Teardown releases the client exactly once, no matter how many times it
/// is requested. Dropping the handle tears it down too.
pub struct DeviceHandle {
    device: Option<Box<dyn TelephonyDevice>>,
}

impl DeviceHandle {
    pub fn new(device: Box<dyn TelephonyDevice>) -> Self {
        Self {
            device: Some(device),
        }
    }

    /// Hangs up the active media session, if any.
    pub fn disconnect_media(&mut self) {
        match self.device.as_mut() {
            Some(device) => device.disconnect_all(),
            None => debug!("disconnect requested on released device"),
        }
    }

    /// Releases the client. Returns `true` only for the call that released it.
    pub fn teardown(&mut self) -> bool {
        match self.device.take() {
            Some(mut device) => {
                device.destroy();
                info!("telephony device released");
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.device.is_none()
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("released", &self.is_released())
            .finish()
    }
}
