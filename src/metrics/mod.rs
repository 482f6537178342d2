//! Prometheus metrics for camera sessions.
//!
//! # Metrics Exposed
//!
//! ## Session Metrics
//! - `camera_bridge_sessions_opened_total` - Accepted session open requests
//! - `camera_bridge_state_transitions_total{state}` - Transitions by target state
//! - `camera_bridge_session_state` - Current state as a number
//!
//! ## Capture Metrics
//! - `camera_bridge_captures_completed_total{kind}` - Captures that produced a result
//! - `camera_bridge_captures_failed_total{kind,error}` - Captures resolved with an error
//! - `camera_bridge_queue_outstanding` - Requests queued or in flight
//!
//! ## Control Metrics
//! - `camera_bridge_control_changes_total` - Committed control changes
//!
//! With the `metrics` feature, [`MetricsServer`] serves the registry over
//! HTTP at `/metrics`, with a `/health` probe alongside.
//!
//! # Example
//!
//! ```no_run
//! use camera_bridge::metrics::MetricsRegistry;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(MetricsRegistry::new().expect("Failed to create registry"));
//! registry.session_opened();
//! println!("{}", registry.encode().expect("Failed to encode"));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
