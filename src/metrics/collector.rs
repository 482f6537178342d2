//! Metrics collection and registry.

use crate::error::ErrorKind;
use crate::pipeline::CaptureKind;
use crate::session::SessionState;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics for camera sessions and captures.
///
/// Shared between every session of a module instance; all methods take
/// `&self`.
pub struct MetricsRegistry {
    registry: Registry,

    // Session metrics
    sessions_opened: IntCounter,
    state_transitions: IntCounterVec,
    session_state: IntGauge,

    // Capture metrics
    captures_completed: IntCounterVec,
    captures_failed: IntCounterVec,
    queue_outstanding: IntGauge,

    // Control metrics
    control_changes: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all camera metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let sessions_opened = IntCounter::new(
            "camera_bridge_sessions_opened_total",
            "Total number of session open requests accepted",
        )?;
        let state_transitions = IntCounterVec::new(
            Opts::new(
                "camera_bridge_state_transitions_total",
                "Session state transitions by target state",
            ),
            &["state"],
        )?;
        let session_state = IntGauge::new(
            "camera_bridge_session_state",
            "Current session state (0=idle 1=configuring 2=running 3=suspended 4=closed 5=failed)",
        )?;

        let captures_completed = IntCounterVec::new(
            Opts::new(
                "camera_bridge_captures_completed_total",
                "Captures that produced a result",
            ),
            &["kind"],
        )?;
        let captures_failed = IntCounterVec::new(
            Opts::new(
                "camera_bridge_captures_failed_total",
                "Captures that resolved with an error",
            ),
            &["kind", "error"],
        )?;
        let queue_outstanding = IntGauge::new(
            "camera_bridge_queue_outstanding",
            "Capture requests queued or in flight",
        )?;

        let control_changes = IntCounter::new(
            "camera_bridge_control_changes_total",
            "Control changes committed after the device accepted them",
        )?;

        registry.register(Box::new(sessions_opened.clone()))?;
        registry.register(Box::new(state_transitions.clone()))?;
        registry.register(Box::new(session_state.clone()))?;
        registry.register(Box::new(captures_completed.clone()))?;
        registry.register(Box::new(captures_failed.clone()))?;
        registry.register(Box::new(queue_outstanding.clone()))?;
        registry.register(Box::new(control_changes.clone()))?;

        Ok(Self {
            registry,
            sessions_opened,
            state_transitions,
            session_state,
            captures_completed,
            captures_failed,
            queue_outstanding,
            control_changes,
        })
    }

    pub fn session_opened(&self) {
        self.sessions_opened.inc();
    }

    pub fn transition(&self, state: SessionState) {
        self.state_transitions
            .with_label_values(&[&state.to_string()])
            .inc();
        self.session_state.set(state.as_gauge());
    }

    pub fn capture_completed(&self, kind: CaptureKind) {
        self.captures_completed
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn capture_failed(&self, kind: CaptureKind, error: ErrorKind) {
        self.captures_failed
            .with_label_values(&[kind.as_str(), error.as_str()])
            .inc();
    }

    pub fn set_outstanding(&self, outstanding: usize) {
        self.queue_outstanding.set(outstanding as i64);
    }

    pub fn control_changed(&self) {
        self.control_changes.inc();
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        registry.session_opened();
        registry.transition(SessionState::Configuring);
        registry.transition(SessionState::Running);
        registry.capture_completed(CaptureKind::Photo);
        registry.capture_failed(CaptureKind::Video, ErrorKind::SessionClosed);
        registry.set_outstanding(3);

        let output = registry.encode().unwrap();
        assert!(output.contains("camera_bridge_sessions_opened_total 1"));
        assert!(output.contains("camera_bridge_state_transitions_total{state=\"running\"} 1"));
        assert!(output.contains("camera_bridge_session_state 2"));
        assert!(output.contains("camera_bridge_captures_completed_total{kind=\"photo\"} 1"));
        assert!(output.contains(
            "camera_bridge_captures_failed_total{error=\"session_closed\",kind=\"video\"} 1"
        ));
        assert!(output.contains("camera_bridge_queue_outstanding 3"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        // Plain metrics show up before any update
        assert!(output.contains("camera_bridge_sessions_opened_total"));
        assert!(output.contains("camera_bridge_control_changes_total"));
        assert!(output.contains("camera_bridge_queue_outstanding"));
    }
}
