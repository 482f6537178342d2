//! Events pushed to the caller.

use crate::error::ErrorKind;
use crate::pipeline::RequestId;
use crate::session::{SessionId, SessionState};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Progress of a single capture request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ProgressInfo {
    Queued,
    Started,
    /// The device is encoding a still.
    Processing,
    Recording { elapsed_ms: u64 },
    Completed,
    Failed { error: ErrorKind },
    Cancelled,
}

impl ProgressInfo {
    /// Whether no further progress follows.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressInfo::Completed | ProgressInfo::Failed { .. } | ProgressInfo::Cancelled
        )
    }
}

/// Asynchronous notifications from the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BridgeEvent {
    #[serde(rename_all = "camelCase")]
    SessionStateChanged {
        session: SessionId,
        previous: SessionState,
        state: SessionState,
    },
    #[serde(rename_all = "camelCase")]
    CaptureProgress {
        request_id: RequestId,
        info: ProgressInfo,
    },
}

impl BridgeEvent {
    /// Event name as the host runtime knows it.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::SessionStateChanged { .. } => "sessionStateChanged",
            BridgeEvent::CaptureProgress { .. } => "captureProgress",
        }
    }
}

/// Fan-out of events to every subscriber.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<BridgeEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// New receiver seeing every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<BridgeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Delivers `event`, dropping subscribers that went away.
    pub fn emit(&self, event: BridgeEvent) {
        tracing::trace!(event = event.name(), "Emitting bridge event");
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
