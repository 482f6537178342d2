//! Shared per-session state.

use super::worker::Message;
use super::{SessionConfig, SessionHandle, SessionState, Transition};
use crate::bridge::{BridgeEvent, Completer, EventBus, ProgressInfo};
use crate::control::{ControlState, ControlSurface};
use crate::device::{CameraDevice, DeviceRegistry, HardwareError, Resolution};
use crate::error::CameraError;
use crate::metrics::MetricsRegistry;
use crate::permission::PermissionGate;
use crate::pipeline::{CapturePipeline, CaptureResult, Entry, ResultHook};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};

/// Collaborators every session reaches.
pub(crate) struct Context {
    pub registry: Arc<DeviceRegistry>,
    pub gate: Arc<PermissionGate>,
    pub events: EventBus,
    pub metrics: Option<Arc<MetricsRegistry>>,
    pub hook: Option<ResultHook>,
}

/// A session as seen from both the caller side and its worker.
pub(crate) struct Session {
    handle: SessionHandle,
    core: Mutex<SessionCore>,
    commands: Mutex<Sender<Message>>,
}

impl Session {
    pub fn new(core: SessionCore, commands: Sender<Message>) -> Self {
        Self {
            handle: core.handle.clone(),
            core: Mutex::new(core),
            commands: Mutex::new(commands),
        }
    }

    #[inline]
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Queues a message for the worker. `false` once the worker has exited.
    pub fn send(&self, message: Message) -> bool {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(message)
            .is_ok()
    }

    pub fn sender(&self) -> Sender<Message> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Mutable session state, guarded by the session lock.
///
/// Events are emitted while the lock is held, so subscribers observe them
/// in the order the changes happened.
pub(crate) struct SessionCore {
    pub handle: SessionHandle,
    pub device: CameraDevice,
    pub config: SessionConfig,
    pub resolution: Resolution,
    pub state: SessionState,
    pub controls: ControlState,
    pub surface: ControlSurface,
    pub pipeline: CapturePipeline,
    /// Resolves the caller's `open`.
    pub open: Option<Completer<SessionHandle>>,
    pub ctx: Arc<Context>,
}

impl SessionCore {
    /// Applies `transition`, emitting the state-changed event.
    pub fn transition(&mut self, transition: Transition) -> bool {
        let Some(next) = self.state.apply(transition) else {
            tracing::debug!(
                session = %self.handle.id(),
                state = %self.state,
                ?transition,
                "Ignoring transition"
            );
            return false;
        };

        let previous = std::mem::replace(&mut self.state, next);
        tracing::info!(
            session = %self.handle.id(),
            device = self.device.id(),
            from = %previous,
            to = %next,
            "Session state changed"
        );
        if let Some(m) = &self.ctx.metrics {
            m.transition(next);
        }
        self.ctx.events.emit(BridgeEvent::SessionStateChanged {
            session: self.handle.id(),
            previous,
            state: next,
        });
        true
    }

    /// Error for an operation that needs a running session.
    pub fn ensure_running(&self) -> Result<(), CameraError> {
        match self.state {
            SessionState::Running => Ok(()),
            SessionState::Closed | SessionState::Failed => Err(CameraError::SessionClosed),
            other => Err(CameraError::SessionNotReady(other)),
        }
    }

    pub fn progress(&self, request_id: crate::pipeline::RequestId, info: ProgressInfo) {
        self.ctx
            .events
            .emit(BridgeEvent::CaptureProgress { request_id, info });
    }

    /// Resolves a request exactly once.
    pub fn finish(&mut self, entry: Entry, result: Result<CaptureResult, CameraError>) {
        let id = entry.request.id;
        let kind = entry.request.kind;
        let result = match (&self.ctx.hook, result) {
            (Some(hook), Ok(r)) => Ok(hook(r)),
            (_, result) => result,
        };

        let info = match &result {
            Ok(_) => ProgressInfo::Completed,
            Err(CameraError::Cancelled(_)) => ProgressInfo::Cancelled,
            Err(e) => ProgressInfo::Failed { error: e.kind() },
        };
        if let Some(m) = &self.ctx.metrics {
            match &result {
                Ok(_) => m.capture_completed(kind),
                Err(e) => m.capture_failed(kind, e.kind()),
            }
        }
        match &result {
            Ok(_) => tracing::debug!(request = %id, kind = kind.as_str(), "Capture completed"),
            Err(e) => tracing::debug!(request = %id, kind = kind.as_str(), error = %e, "Capture resolved with error"),
        }

        self.progress(id, info);
        entry.completer.complete(result);
        self.update_outstanding();
    }

    pub fn update_outstanding(&self) {
        if let Some(m) = &self.ctx.metrics {
            m.set_outstanding(self.pipeline.outstanding());
        }
    }

    /// Resolves the caller's `open`, if still waiting.
    pub fn resolve_open(&mut self, result: Result<SessionHandle, CameraError>) {
        if let Some(open) = self.open.take() {
            open.complete(result);
        }
    }

    /// Fails everything outstanding with `SessionClosed`.
    pub fn cancel_all(&mut self) {
        self.resolve_open(Err(CameraError::SessionClosed));
        let (dispatched, queued) = self.pipeline.drain();
        for entry in dispatched.into_iter().chain(queued) {
            self.finish(entry, Err(CameraError::SessionClosed));
        }
    }

    /// Moves to Failed after a device fault.
    ///
    /// Dispatched requests fail with the fault, queued ones with
    /// `SessionClosed`.
    pub fn fail(&mut self, error: HardwareError) {
        tracing::warn!(
            session = %self.handle.id(),
            device = self.device.id(),
            error = %error,
            "Hardware fault"
        );
        if !self.transition(Transition::HardwareFault) {
            return;
        }
        self.resolve_open(Err(CameraError::HardwareFault(error.clone())));
        let (dispatched, queued) = self.pipeline.drain();
        for entry in dispatched {
            self.finish(entry, Err(CameraError::HardwareFault(error.clone())));
        }
        for entry in queued {
            self.finish(entry, Err(CameraError::SessionClosed));
        }
    }

    /// Returns to Idle when open was refused before any hardware was held.
    pub fn abort(&mut self, error: CameraError) {
        tracing::info!(
            session = %self.handle.id(),
            device = self.device.id(),
            error = %error,
            "Session open refused"
        );
        if self.transition(Transition::Abort) {
            self.resolve_open(Err(error));
        }
    }
}
