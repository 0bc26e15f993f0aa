//! Voice call session coordinator.
//!
//! Reconciles three independently paced event sources into one call state:
//! the telephony device's lifecycle events, HTTP call-control responses,
//! and the live channel's open/close lifetime.
//!
//! # State machine
//!
//! | From | Event | To |
//! |------|-------|----|
//! | `Uninitialized` | initialize | `DeviceInitializing` |
//! | `DeviceInitializing` | device ready | `DeviceReady` |
//! | `DeviceInitializing` | credential / device error | `DeviceFailed` |
//! | `DeviceReady`, `Ended`, `Failed` | start | `Connecting` |
//! | `Connecting` | placement succeeded | `Active` |
//! | `Connecting` | placement failed | `Failed` |
//! | `Connecting`, `Active` | device disconnected | `Ended` |
//! | `Connecting`, `Active` | end | `Ending` → `Ended` |
//! | `DeviceReady`, `Ended`, `Failed` | device error | `DeviceFailed` |
//! | any | teardown | `Uninitialized` |
//!
//! The live channel is held exactly while the state is `Connecting` or
//! `Active`.
//!
//! # Usage
//!
//! ```rust,ignore
//! let (coordinator, handle) = Coordinator::new(collaborators);
//! let task = coordinator.spawn();
//!
//! handle.start("+15551234567", Some("Hello".into())).await?;
//! handle.send_text("One more thing").await?;
//! handle.end().await?;
//! handle.teardown().await?;
//! task.await?;
//! ```

mod coordinator;
mod error;
mod handle;
mod session;

pub use coordinator::{Collaborators, Command, Coordinator, Notification, Reply, SessionEvent};
pub use error::SessionError;
pub use handle::SessionHandle;
pub use session::CallSession;
