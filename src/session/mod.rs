//! Camera session lifecycle.
//!
//! A module instance owns at most one session at a time. The
//! [`SessionManager`] validates lifecycle operations synchronously against
//! the [`SessionState`] machine, then hands hardware work to the session's
//! worker thread, which owns the device handle for the session's lifetime.
//!
//! ```text
//! Idle/Closed  --open-->   Configuring --ready--> Running
//! Running      --suspend--> Suspended  --resume--> Running
//! Configuring  --abort-->  Idle          (permission denied, device busy)
//! Configuring/Running/Suspended         --fault--> Failed
//! Configuring/Running/Suspended/Failed  --close--> Closed
//! ```

mod config;
mod manager;
mod shared;
mod state;
mod worker;

pub use config::{ConfigError, FileConfig, MetricsConfig, SessionConfig, MAX_QUEUE_DEPTH};
pub use manager::{SessionHandle, SessionId, SessionManager};
pub use state::{SessionState, Transition};
