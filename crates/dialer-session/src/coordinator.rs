//! The session coordinator: one serialized event loop that owns the call
//! state machine.
//!
//! Commands from the operator, device lifecycle events, and completions of
//! in-flight HTTP requests all arrive on the same queue and are handled one
//! at a time, each to completion. Slow work (credential fetch, call
//! placement, text push) runs in spawned tasks that post their result back
//! onto the queue, so the loop never waits on the network.
//!
//! Completions carry the attempt or device generation they were started
//! for. A completion whose generation no longer matches, or that arrives
//! after the state it was meant for has been left, is discarded.

use crate::error::SessionError;
use crate::handle::SessionHandle;
use crate::session::CallSession;
use dialer_types::CallState;
use dialer_voice::{
    CallControl, ChannelConnector, DeviceEvent, DeviceEventSink, DeviceHandle, DeviceSession,
    PlacedCall, VoiceError,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the notification broadcast channel.
const DEFAULT_NOTIFICATION_BROADCAST_CAPACITY: usize = 64;

/// Notifications for the operator surface. Each fires at most once per
/// transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    CallStarted { call_id: Option<String> },
    CallEnded,
    Error(SessionError),
}

pub type Reply = oneshot::Sender<Result<(), SessionError>>;

/// Operator commands.
#[derive(Debug)]
pub enum Command {
    Start {
        target: String,
        initial_text: Option<String>,
        reply: Reply,
    },
    SendText {
        text: String,
        reply: Reply,
    },
    End {
        reply: Reply,
    },
    Teardown {
        reply: Reply,
    },
}

/// Everything the coordinator reacts to.
#[derive(Debug)]
pub enum SessionEvent {
    Command(Command),
    DeviceInitialized {
        generation: u64,
        result: Result<DeviceHandle, VoiceError>,
    },
    Device {
        generation: u64,
        event: DeviceEvent,
    },
    CallPlaced {
        attempt: u64,
        result: Result<PlacedCall, VoiceError>,
    },
    TextPushed {
        attempt: u64,
        text: String,
        result: Result<(), VoiceError>,
    },
}

/// Injected collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub device: DeviceSession,
    pub control: Arc<dyn CallControl>,
    pub channels: Arc<dyn ChannelConnector>,
}

pub struct Coordinator {
    session: CallSession,
    collaborators: Collaborators,
    device: Option<DeviceHandle>,
    device_generation: u64,
    attempt: u64,
    text_in_flight: bool,
    torn_down: bool,
    events_tx: mpsc::WeakUnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    notifications: broadcast::Sender<Notification>,
    state_tx: watch::Sender<CallState>,
}

impl Coordinator {
    /// Builds a coordinator and the handle that feeds it.
    ///
    /// The coordinator only holds a weak reference to its own queue. Once
    /// every [`SessionHandle`] is dropped and no work is in flight, the
    /// event loop ends and tears the session down.
    pub fn new(collaborators: Collaborators) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(DEFAULT_NOTIFICATION_BROADCAST_CAPACITY);
        let (state_tx, state_rx) = watch::channel(CallState::Uninitialized);

        let coordinator = Self {
            session: CallSession::default(),
            collaborators,
            device: None,
            device_generation: 0,
            attempt: 0,
            text_in_flight: false,
            torn_down: false,
            events_tx: events_tx.downgrade(),
            events_rx,
            notifications: notifications.clone(),
            state_tx,
        };
        let handle = SessionHandle::new(events_tx, notifications, state_rx);
        (coordinator, handle)
    }

    /// Starts device initialization and runs the event loop on a new task.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.initialize() {
                warn!(error = %e, "device initialization not started");
            }
            self.run().await;
        })
    }

    /// Processes events until teardown or until every handle is gone.
    pub async fn run(&mut self) {
        while !self.torn_down {
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
        self.teardown();
    }

    /// Waits for the next queued event and handles it. Returns `false` once
    /// the queue is closed.
    pub async fn step(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn state(&self) -> CallState {
        self.session.state()
    }

    pub fn is_device_attached(&self) -> bool {
        self.device.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Handles one event to completion.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Command(command) => self.handle_command(command),
            SessionEvent::DeviceInitialized { generation, result } => {
                self.on_device_initialized(generation, result)
            }
            SessionEvent::Device { generation, event } => self.on_device_event(generation, event),
            SessionEvent::CallPlaced { attempt, result } => self.on_call_placed(attempt, result),
            SessionEvent::TextPushed {
                attempt,
                text,
                result,
            } => self.on_text_pushed(attempt, text, result),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start {
                target,
                initial_text,
                reply,
            } => {
                let _ = reply.send(self.start(target, initial_text));
            }
            Command::SendText { text, reply } => {
                let _ = reply.send(self.send_text(text));
            }
            Command::End { reply } => {
                let _ = reply.send(self.end());
            }
            Command::Teardown { reply } => {
                self.teardown();
                let _ = reply.send(Ok(()));
            }
        }
    }

    // ── commands ─────────────────────────────────────────────────────

    /// Fetches a credential and registers the device in the background.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        if self.torn_down {
            return Err(SessionError::Closed);
        }
        let state = self.session.state();
        if state != CallState::Uninitialized {
            return Err(SessionError::InvalidState {
                action: "initialize the device",
                state,
            });
        }
        let tx = self.events_tx.upgrade().ok_or(SessionError::Closed)?;

        self.device_generation += 1;
        let generation = self.device_generation;
        self.transition(CallState::DeviceInitializing);

        let sink_tx = self.events_tx.clone();
        let sink = DeviceEventSink::new(move |event| {
            if let Some(tx) = sink_tx.upgrade() {
                let _ = tx.send(SessionEvent::Device { generation, event });
            }
        });
        let device = self.collaborators.device.clone();
        tokio::spawn(async move {
            let result = device.initialize(sink).await;
            // If the coordinator is gone the handle is dropped here, which
            // releases the device.
            let _ = tx.send(SessionEvent::DeviceInitialized { generation, result });
        });
        Ok(())
    }

    /// Opens the live channel and places a call to `target`.
    pub fn start(
        &mut self,
        target: String,
        initial_text: Option<String>,
    ) -> Result<(), SessionError> {
        let target = target.trim().to_string();
        if target.is_empty() {
            return Err(SessionError::InvalidTarget);
        }
        let state = self.session.state();
        if !state.can_start() {
            return Err(SessionError::InvalidState {
                action: "start a call",
                state,
            });
        }
        let tx = self.events_tx.upgrade().ok_or(SessionError::Closed)?;

        self.attempt += 1;
        self.text_in_flight = false;
        let attempt = self.attempt;
        let initial_text = initial_text.filter(|t| !t.trim().is_empty());

        let channel = self.collaborators.channels.open();
        self.session
            .begin_attempt(target.clone(), initial_text.clone(), channel);
        self.transition(CallState::Connecting);
        info!(attempt, to = %target, "placing call");

        let control = self.collaborators.control.clone();
        tokio::spawn(async move {
            let result = control.place_call(&target, initial_text.as_deref()).await;
            let _ = tx.send(SessionEvent::CallPlaced { attempt, result });
        });
        Ok(())
    }

    /// Queues `text` for the live call. Only one item waits at a time; a
    /// newer item replaces an older one that has not been sent yet.
    pub fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        let state = self.session.state();
        if state != CallState::Active {
            return Err(SessionError::InvalidState {
                action: "send text",
                state,
            });
        }
        self.session.queue_text(text);
        if !self.text_in_flight {
            self.dispatch_pending_text();
        }
        Ok(())
    }

    /// Hangs up. A no-op when no call is in progress.
    pub fn end(&mut self) -> Result<(), SessionError> {
        let state = self.session.state();
        if !state.holds_channel() {
            debug!(%state, "end ignored, no call in progress");
            return Ok(());
        }

        self.transition(CallState::Ending);
        if let Some(device) = self.device.as_mut() {
            device.disconnect_media();
        }
        if let Some(call_id) = self.session.call_id().map(str::to_string) {
            let control = self.collaborators.control.clone();
            tokio::spawn(async move {
                if let Err(e) = control.end_call(Some(&call_id)).await {
                    warn!(call_id = %call_id, error = %e, "server-side hangup failed");
                }
            });
        }
        self.finish_call();
        Ok(())
    }

    /// Releases the live channel and the device. Safe to call any number of
    /// times; later calls find nothing to release.
    pub fn teardown(&mut self) {
        let first = !self.torn_down;
        self.torn_down = true;
        self.device_generation += 1;
        self.attempt += 1;
        self.text_in_flight = false;

        self.transition(CallState::Uninitialized);
        let released = self.release_device();
        self.session.reset();

        if first {
            info!(device_released = released, "call session torn down");
        }
    }

    // ── completions and device events ────────────────────────────────

    fn on_device_initialized(&mut self, generation: u64, result: Result<DeviceHandle, VoiceError>) {
        if generation != self.device_generation {
            debug!(generation, "discarding device initialization from an earlier device");
            return;
        }
        let state = self.session.state();
        match result {
            Ok(handle) => {
                if matches!(state, CallState::Uninitialized | CallState::DeviceFailed) {
                    debug!(%state, "device registered after session gave up on it; releasing");
                    drop(handle);
                    return;
                }
                self.device = Some(handle);
                if state == CallState::DeviceInitializing {
                    self.mark_device_ready();
                }
            }
            Err(e) => match state {
                CallState::DeviceInitializing | CallState::DeviceReady => self.fail_device(e),
                _ => debug!(%state, error = %e, "ignoring late initialization failure"),
            },
        }
    }

    fn on_device_event(&mut self, generation: u64, event: DeviceEvent) {
        if generation != self.device_generation {
            debug!(generation, ?event, "discarding event from an earlier device");
            return;
        }
        let status = event.status();
        self.session.set_device_status(status);
        let state = self.session.state();
        debug!(status = status.label(), %state, "device event");

        match event {
            DeviceEvent::Ready => {
                if state == CallState::DeviceInitializing {
                    self.mark_device_ready();
                }
            }
            DeviceEvent::Error(detail) => {
                let error = VoiceError::Device(detail);
                match state {
                    // Whether the call survives is up to the disconnected event.
                    s if s.is_call_in_progress() => {
                        warn!(%state, error = %error, "device error during call");
                        self.report_error(error.into());
                    }
                    CallState::DeviceInitializing
                    | CallState::DeviceReady
                    | CallState::Ended
                    | CallState::Failed => self.fail_device(error),
                    _ => {
                        debug!(%state, error = %error, "device error ignored");
                    }
                }
            }
            DeviceEvent::Disconnected => {
                if state.holds_channel() {
                    self.finish_call();
                } else {
                    debug!(%state, "disconnect outside a call ignored");
                }
            }
        }
    }

    fn on_call_placed(&mut self, attempt: u64, result: Result<PlacedCall, VoiceError>) {
        let state = self.session.state();
        if attempt != self.attempt || state != CallState::Connecting {
            debug!(attempt, %state, "discarding stale call placement response");
            return;
        }

        match result {
            Ok(placed) => {
                self.session.mark_placed(placed.call_id.clone());
                self.transition(CallState::Active);
                info!(call_id = ?placed.call_id, "call active");
                self.notify(Notification::CallStarted {
                    call_id: placed.call_id,
                });
            }
            Err(e) => {
                warn!(error = %e, "call placement failed");
                self.transition(CallState::Failed);
                self.report_error(e.into());
            }
        }
    }

    fn on_text_pushed(&mut self, attempt: u64, text: String, result: Result<(), VoiceError>) {
        if attempt != self.attempt {
            debug!(attempt, "discarding text push result from an earlier call");
            return;
        }
        self.text_in_flight = false;

        match result {
            Ok(()) => self.session.record_sent_text(text),
            Err(e) => {
                warn!(error = %e, "text push failed; call continues");
                self.session.record_error(e.into());
            }
        }

        if self.session.state() == CallState::Active {
            self.dispatch_pending_text();
        }
    }

    // ── helpers ──────────────────────────────────────────────────────

    fn dispatch_pending_text(&mut self) {
        let Some(tx) = self.events_tx.upgrade() else {
            return;
        };
        let Some(text) = self.session.take_pending_text() else {
            return;
        };
        self.text_in_flight = true;

        let attempt = self.attempt;
        let call_id = self.session.call_id().map(str::to_string);
        let control = self.collaborators.control.clone();
        tokio::spawn(async move {
            let result = control.push_text(call_id.as_deref(), &text).await;
            let _ = tx.send(SessionEvent::TextPushed {
                attempt,
                text,
                result,
            });
        });
    }

    fn mark_device_ready(&mut self) {
        self.session.clear_error();
        self.transition(CallState::DeviceReady);
    }

    fn fail_device(&mut self, error: VoiceError) {
        warn!(error = %error, "device unusable");
        self.release_device();
        self.transition(CallState::DeviceFailed);
        self.report_error(error.into());
    }

    /// Ends the current call: the channel closes, call fields clear, and
    /// `CallEnded` fires.
    fn finish_call(&mut self) {
        let call_id = self.session.call_id().map(str::to_string);
        let duration_secs = self.session.elapsed_secs();
        // Pushes still in flight belong to the finished call.
        self.attempt += 1;
        self.text_in_flight = false;
        self.transition(CallState::Ended);
        self.session.clear_call();
        info!(call_id = ?call_id, duration_secs = ?duration_secs, "call ended");
        self.notify(Notification::CallEnded);
    }

    fn release_device(&mut self) -> bool {
        self.device
            .take()
            .map(|mut device| device.teardown())
            .unwrap_or(false)
    }

    fn report_error(&mut self, error: SessionError) {
        self.session.record_error(error.clone());
        self.notify(Notification::Error(error));
    }

    fn transition(&mut self, next: CallState) {
        if self.session.set_state(next) {
            self.state_tx.send_replace(next);
        }
    }

    fn notify(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if !self.torn_down {
            self.teardown();
        }
    }
}
