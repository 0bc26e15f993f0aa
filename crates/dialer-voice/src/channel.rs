//! Live channel: the auxiliary socket that relays text/audio while a call
//! is up. Only its open/closed lifetime matters here.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

/// An opened (or opening) live channel.
pub trait LiveChannel: Send {
    /// Closes the channel. Safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Opens live channels.
pub trait ChannelConnector: Send + Sync {
    /// Starts connecting and returns immediately. Connection completion is
    /// not awaited.
    fn open(&self) -> Box<dyn LiveChannel>;
}

/// Opens WebSocket live channels against a fixed URL.
#[derive(Debug, Clone)]
pub struct WsChannelConnector {
    url: String,
}

impl WsChannelConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl ChannelConnector for WsChannelConnector {
    fn open(&self) -> Box<dyn LiveChannel> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(run_channel(self.url.clone(), shutdown_rx));
        Box::new(WsLiveChannel {
            shutdown: Some(shutdown_tx),
        })
    }
}

async fn run_channel(url: String, mut shutdown: oneshot::Receiver<()>) {
    let mut ws = tokio::select! {
        _ = &mut shutdown => {
            debug!(url = %url, "live channel closed before connecting");
            return;
        }
        result = connect_async(url.as_str()) => match result {
            Ok((ws, _)) => ws,
            Err(e) => {
                warn!(url = %url, error = %e, "live channel failed to connect");
                return;
            }
        },
    };
    info!(url = %url, "live channel open");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = ws.send(Message::Close(None)).await;
                info!(url = %url, "live channel closed");
                return;
            }
            msg = ws.next() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    info!(url = %url, "live channel closed by peer");
                    return;
                }
                Some(Err(e)) => {
                    warn!(url = %url, error = %e, "live channel error");
                    return;
                }
                // Relay payloads belong to the stream server and its consumers.
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Handle to a WebSocket live channel task.
#[derive(Debug)]
pub struct WsLiveChannel {
    shutdown: Option<oneshot::Sender<()>>,
}

impl LiveChannel for WsLiveChannel {
    fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    fn is_open(&self) -> bool {
        self.shutdown.is_some()
    }
}

impl Drop for WsLiveChannel {
    fn drop(&mut self) {
        self.close();
    }
}
