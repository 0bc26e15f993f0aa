//! WebSocket signaling client backing the telephony device.
//!
//! The device connects to `signaling_url?token=<credential>`, announces
//! itself with a `register` frame, and translates the backend's frames into
//! [`DeviceEvent`]s:
//!
//! | Inbound frame            | Event                          |
//! |--------------------------|--------------------------------|
//! | `{"type":"registered"}`  | `Ready`                        |
//! | `{"type":"error", ...}`  | `Error(message)`               |
//! | `{"type":"hangup"}`      | `Disconnected`                 |
//! | socket closed or failed  | `Disconnected`, then `Error`   |

use crate::config::DeviceConfig;
use crate::device::{DeviceEvent, DeviceEventSink, TelephonyConnector, TelephonyDevice};
use crate::error::VoiceError;
use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type SignalingStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frames sent to the signaling backend.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame<'a> {
    Register {
        #[serde(skip_serializing_if = "Option::is_none")]
        identity: Option<&'a str>,
        codec_preferences: &'a [String],
    },
    Hangup,
}

/// Frames received from the signaling backend.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Registered,
    Error { message: String },
    Hangup,
    #[serde(other)]
    Unknown,
}

/// Connects telephony devices over the signaling WebSocket.
#[derive(Debug, Clone)]
pub struct SignalingConnector {
    config: DeviceConfig,
}

impl SignalingConnector {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TelephonyConnector for SignalingConnector {
    async fn connect(
        &self,
        token: &str,
        sink: DeviceEventSink,
    ) -> Result<Box<dyn TelephonyDevice>, VoiceError> {
        let mut url = Url::parse(&self.config.signaling_url).map_err(|e| {
            VoiceError::Config(format!(
                "invalid signaling url '{}': {}",
                self.config.signaling_url, e
            ))
        })?;
        url.query_pairs_mut().append_pair("token", token);

        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| VoiceError::Device(format!("signaling connect failed: {}", e)))?;
        debug!(url = %self.config.signaling_url, "signaling socket connected");

        let (mut write, read) = ws.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if write.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        let (registered_tx, registered_rx) = oneshot::channel();
        let reader = tokio::spawn(read_frames(read, sink, registered_tx));

        Ok(Box::new(SignalingDevice {
            config: self.config.clone(),
            outbound: outbound_tx,
            registered: Some(registered_rx),
            reader: Some(reader),
            writer: Some(writer),
        }))
    }
}

async fn read_frames(
    mut read: SplitStream<SignalingStream>,
    sink: DeviceEventSink,
    registered_tx: oneshot::Sender<Result<(), VoiceError>>,
) {
    let mut registered = Some(registered_tx);

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<InboundFrame>(text.as_str()) {
                Ok(InboundFrame::Registered) => {
                    if let Some(tx) = registered.take() {
                        let _ = tx.send(Ok(()));
                    }
                    sink.emit(DeviceEvent::Ready);
                }
                Ok(InboundFrame::Error { message }) => {
                    if let Some(tx) = registered.take() {
                        let _ = tx.send(Err(VoiceError::Device(message.clone())));
                    }
                    sink.emit(DeviceEvent::Error(message));
                }
                Ok(InboundFrame::Hangup) => sink.emit(DeviceEvent::Disconnected),
                Ok(InboundFrame::Unknown) => debug!("ignoring unknown signaling frame"),
                Err(e) => debug!(error = %e, "ignoring malformed signaling frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "signaling socket error");
                connection_lost(&sink, format!("signaling connection error: {}", e));
                return;
            }
        }
    }

    connection_lost(&sink, "signaling connection closed".to_string());
}

/// A lost signaling socket ends the media session: `Disconnected` goes out
/// before the fault.
fn connection_lost(sink: &DeviceEventSink, detail: String) {
    sink.emit(DeviceEvent::Disconnected);
    sink.emit(DeviceEvent::Error(detail));
}

/// A telephony device registered over the signaling socket.
pub struct SignalingDevice {
    config: DeviceConfig,
    outbound: mpsc::UnboundedSender<Message>,
    registered: Option<oneshot::Receiver<Result<(), VoiceError>>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl SignalingDevice {
    fn send_frame(&self, frame: &OutboundFrame<'_>) -> Result<(), VoiceError> {
        let text = serde_json::to_string(frame)
            .map_err(|e| VoiceError::Device(format!("failed to encode frame: {}", e)))?;
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| VoiceError::Device("signaling socket is closed".to_string()))
    }
}

#[async_trait]
impl TelephonyDevice for SignalingDevice {
    async fn register(&mut self) -> Result<(), VoiceError> {
        let registered = self
            .registered
            .take()
            .ok_or_else(|| VoiceError::Device("device already registered".to_string()))?;

        self.send_frame(&OutboundFrame::Register {
            identity: self.config.identity.as_deref(),
            codec_preferences: &self.config.codec_preferences,
        })?;

        let timeout = Duration::from_secs(self.config.register_timeout_secs);
        match tokio::time::timeout(timeout, registered).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(VoiceError::Device(
                "signaling connection closed before registration".to_string(),
            )),
            Err(_) => Err(VoiceError::Device(format!(
                "registration not acknowledged after {} seconds",
                timeout.as_secs()
            ))),
        }
    }

    fn disconnect_all(&mut self) {
        if let Err(e) = self.send_frame(&OutboundFrame::Hangup) {
            debug!(error = %e, "hangup frame not sent");
        }
    }

    fn destroy(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if self.writer.take().is_some() {
            let _ = self.outbound.send(Message::Close(None));
            info!("signaling socket closing");
        }
    }
}

impl Drop for SignalingDevice {
    fn drop(&mut self) {
        self.destroy();
    }
}
