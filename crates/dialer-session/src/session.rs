//! The `CallSession` aggregate.

use crate::error::SessionError;
use chrono::{DateTime, Utc};
use dialer_types::{CallState, DeviceStatus};
use dialer_voice::LiveChannel;
use std::fmt;
use tracing::{debug, info};

/// Mutable call state owned by the coordinator.
///
/// The live channel is stored here so that the state and the resource move
/// together: [`CallSession::set_state`] closes the channel whenever the
/// session leaves `Connecting`/`Active`.
#[derive(Default)]
pub struct CallSession {
    state: CallState,
    device_status: Option<DeviceStatus>,
    target: Option<String>,
    call_id: Option<String>,
    pending_text: Option<String>,
    last_sent_text: Option<String>,
    live_channel: Option<Box<dyn LiveChannel>>,
    last_error: Option<SessionError>,
    started_at: Option<DateTime<Utc>>,
}

impl CallSession {
    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn device_status(&self) -> Option<DeviceStatus> {
        self.device_status
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn call_id(&self) -> Option<&str> {
        self.call_id.as_deref()
    }

    pub fn pending_text(&self) -> Option<&str> {
        self.pending_text.as_deref()
    }

    pub fn last_sent_text(&self) -> Option<&str> {
        self.last_sent_text.as_deref()
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn has_live_channel(&self) -> bool {
        self.live_channel.is_some()
    }

    /// Moves to `next`, closing the live channel if `next` does not hold one.
    ///
    /// Returns `false` when the session was already in `next`.
    pub(crate) fn set_state(&mut self, next: CallState) -> bool {
        if !next.holds_channel() {
            self.close_channel();
        }
        if self.state == next {
            return false;
        }
        info!(from = %self.state, to = %next, "call state transition");
        self.state = next;
        true
    }

    pub(crate) fn set_device_status(&mut self, status: DeviceStatus) {
        self.device_status = Some(status);
    }

    /// Resets per-call fields for a new attempt and takes ownership of its
    /// live channel.
    pub(crate) fn begin_attempt(
        &mut self,
        target: String,
        initial_text: Option<String>,
        channel: Box<dyn LiveChannel>,
    ) {
        self.close_channel();
        self.target = Some(target);
        self.call_id = None;
        self.pending_text = initial_text;
        self.last_sent_text = None;
        self.last_error = None;
        self.started_at = None;
        self.live_channel = Some(channel);
    }

    /// Records a placed call. The initial text went out with the placement.
    pub(crate) fn mark_placed(&mut self, call_id: Option<String>) {
        self.call_id = call_id;
        self.last_sent_text = self.pending_text.take();
        self.last_error = None;
        self.started_at = Some(Utc::now());
    }

    /// Stores `text` as the single pending item, replacing any earlier one.
    pub(crate) fn queue_text(&mut self, text: String) {
        if let Some(replaced) = self.pending_text.replace(text) {
            debug!(chars = replaced.chars().count(), "pending text replaced");
        }
    }

    pub(crate) fn take_pending_text(&mut self) -> Option<String> {
        self.pending_text.take()
    }

    pub(crate) fn record_sent_text(&mut self, text: String) {
        self.last_sent_text = Some(text);
    }

    pub(crate) fn record_error(&mut self, error: SessionError) {
        self.last_error = Some(error);
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Drops everything tied to the finished call. The target stays for display.
    pub(crate) fn clear_call(&mut self) {
        self.call_id = None;
        self.pending_text = None;
    }

    /// Call duration so far, if the call was ever placed.
    pub fn elapsed_secs(&self) -> Option<i64> {
        self.started_at
            .map(|started| (Utc::now() - started).num_seconds())
    }

    /// Clears everything, including the device status.
    pub(crate) fn reset(&mut self) {
        self.close_channel();
        *self = Self::default();
    }

    fn close_channel(&mut self) {
        if let Some(mut channel) = self.live_channel.take() {
            channel.close();
            debug!("live channel released");
        }
    }
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("state", &self.state)
            .field("device_status", &self.device_status)
            .field("target", &self.target)
            .field("call_id", &self.call_id)
            .field("pending_text", &self.pending_text)
            .field("last_sent_text", &self.last_sent_text)
            .field("live_channel", &self.live_channel.is_some())
            .field("last_error", &self.last_error)
            .finish()
    }
}
