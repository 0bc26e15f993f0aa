//! Cloneable command surface for a running coordinator.

use crate::coordinator::{Command, Notification, Reply, SessionEvent};
use crate::error::SessionError;
use dialer_types::CallState;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Sends commands to the coordinator and observes its state.
///
/// Commands resolve once the coordinator has handled them, so a rejected
/// command (`InvalidState`, `InvalidTarget`) is reported to the caller
/// directly.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    notifications: broadcast::Sender<Notification>,
    state: watch::Receiver<CallState>,
}

impl SessionHandle {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<SessionEvent>,
        notifications: broadcast::Sender<Notification>,
        state: watch::Receiver<CallState>,
    ) -> Self {
        Self {
            events,
            notifications,
            state,
        }
    }

    pub async fn start(
        &self,
        target: impl Into<String>,
        initial_text: Option<String>,
    ) -> Result<(), SessionError> {
        let target = target.into();
        self.request(|reply| Command::Start {
            target,
            initial_text,
            reply,
        })
        .await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        self.request(|reply| Command::SendText { text, reply }).await
    }

    pub async fn end(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::End { reply }).await
    }

    /// Tears the session down. Succeeds if the coordinator is already gone.
    pub async fn teardown(&self) -> Result<(), SessionError> {
        match self.request(|reply| Command::Teardown { reply }).await {
            Err(SessionError::Closed) => Ok(()),
            other => other,
        }
    }

    /// Last published state.
    pub fn state(&self) -> CallState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CallState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    async fn request(&self, build: impl FnOnce(Reply) -> Command) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(SessionEvent::Command(build(reply)))
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }
}
