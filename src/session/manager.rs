//! Session lifecycle management.

use super::shared::{Context, Session, SessionCore};
use super::worker::{self, Message};
use super::{SessionConfig, SessionState, Transition};
use crate::bridge::{pending, EventBus, Pending, ProgressInfo};
use crate::control::{ControlState, ControlSurface, ControlValue};
use crate::device::{DeviceRegistry, FlashMode, HardwareError};
use crate::error::CameraError;
use crate::metrics::MetricsRegistry;
use crate::permission::PermissionGate;
use crate::pipeline::{
    CaptureKind, CaptureOptions, CapturePipeline, CaptureRequest, CaptureResult, RequestId,
    ResultHook, StopOutcome,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Identifier of one opened session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Handle returned by a successful open, naming the session in later calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    id: SessionId,
    device_id: String,
}

impl SessionHandle {
    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[derive(Default)]
struct Slot {
    session: Option<Arc<Session>>,
    worker: Option<JoinHandle<()>>,
}

/// Owns the single session of a module instance.
pub struct SessionManager {
    registry: Arc<DeviceRegistry>,
    gate: Arc<PermissionGate>,
    events: EventBus,
    metrics: Option<Arc<MetricsRegistry>>,
    hook: Option<ResultHook>,
    next_session: AtomicU64,
    next_request: AtomicU64,
    slot: Mutex<Slot>,
}

impl SessionManager {
    pub fn new(registry: Arc<DeviceRegistry>, gate: Arc<PermissionGate>, events: EventBus) -> Self {
        Self {
            registry,
            gate,
            events,
            metrics: None,
            hook: None,
            next_session: AtomicU64::new(1),
            next_request: AtomicU64::new(1),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_result_hook(mut self, hook: ResultHook) -> Self {
        self.hook = Some(hook);
        self
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// State of the current (or most recent) session.
    pub fn state(&self) -> SessionState {
        self.slot()
            .session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or_default()
    }

    /// Opens a session on `device_id`.
    ///
    /// Validation happens here, synchronously. Authorization, device
    /// acquisition and stream setup run on the new session's worker, and
    /// their outcome resolves the returned handle.
    pub fn open(
        &self,
        device_id: &str,
        config: SessionConfig,
    ) -> Result<Pending<SessionHandle>, CameraError> {
        config.validate()?;
        let device = self
            .registry
            .find(device_id)
            .ok_or_else(|| CameraError::DeviceUnavailable(device_id.to_string()))?;

        let mut slot = self.slot();
        let mut reopening = false;
        if let Some(current) = &slot.session {
            let state = current.state();
            if !state.accepts_open() {
                return Err(CameraError::AlreadyOpen(state));
            }
            reopening = current.handle().device_id() == device_id;
        }
        // Our own previous session may still be releasing the device
        if !reopening && self.registry.is_leased(device_id) {
            return Err(CameraError::DeviceBusy(device_id.to_string()));
        }

        let resolution = device
            .select_resolution(config.resolution)
            .ok_or_else(|| CameraError::DeviceUnavailable(format!("{device_id} has no stream formats")))?;
        let surface = ControlSurface::new(config.control_policy, device.capabilities().clone());
        let controls = surface.initial_state(config.flash, config.torch)?;

        let handle = SessionHandle {
            id: SessionId(self.next_session.fetch_add(1, Ordering::Relaxed)),
            device_id: device_id.to_string(),
        };
        let ctx = Arc::new(Context {
            registry: Arc::clone(&self.registry),
            gate: Arc::clone(&self.gate),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
            hook: self.hook.clone(),
        });
        let (open_pending, open_completer) = pending();
        let pipeline = CapturePipeline::new(
            config.queue_depth,
            device.capabilities().multi_stream,
            config.capture_timeout(),
        );

        let (tx, rx) = mpsc::channel();
        let session = Arc::new(Session::new(
            SessionCore {
                handle: handle.clone(),
                device,
                config,
                resolution,
                state: SessionState::Idle,
                controls,
                surface,
                pipeline,
                open: Some(open_completer),
                ctx: Arc::clone(&ctx),
            },
            tx,
        ));

        tracing::info!(
            session = %handle.id(),
            device = device_id,
            %resolution,
            "Opening camera session"
        );
        if let Some(m) = &self.metrics {
            m.session_opened();
        }
        session.lock().transition(Transition::Open);

        let previous = slot.worker.take();
        let worker_session = Arc::clone(&session);
        let spawned = thread::Builder::new()
            .name(format!("camera-{}", handle.id()))
            .spawn(move || worker::run(worker_session, rx, ctx, previous));
        let join = match spawned {
            Ok(join) => join,
            Err(e) => {
                let err = CameraError::HardwareFault(HardwareError::from(e));
                session.lock().abort(err.clone());
                return Err(err);
            }
        };

        slot.session = Some(session);
        slot.worker = Some(join);
        Ok(open_pending)
    }

    /// Closes the session. Idle, closed and stale handles succeed as no-ops.
    pub fn close(&self, handle: &SessionHandle) -> Result<(), CameraError> {
        let slot = self.slot();
        let Some(session) = slot.session.as_ref().filter(|s| s.handle() == handle) else {
            return Ok(());
        };

        let mut core = session.lock();
        if matches!(core.state, SessionState::Idle | SessionState::Closed) {
            return Ok(());
        }
        core.transition(Transition::Close);
        core.cancel_all();
        drop(core);

        // The worker is gone already if the session failed
        session.send(Message::Close);
        tracing::info!(session = %handle.id(), "Camera session closed");
        Ok(())
    }

    pub fn suspend(&self, handle: &SessionHandle) -> Result<(), CameraError> {
        self.lifecycle(handle, SessionState::Running, Transition::Suspend, Message::Suspend)
    }

    pub fn resume(&self, handle: &SessionHandle) -> Result<(), CameraError> {
        self.lifecycle(handle, SessionState::Suspended, Transition::Resume, Message::Resume)
    }

    fn lifecycle(
        &self,
        handle: &SessionHandle,
        required: SessionState,
        transition: Transition,
        message: Message,
    ) -> Result<(), CameraError> {
        let session = self.session(handle)?;
        let mut core = session.lock();
        match core.state {
            state if state == required => {
                core.transition(transition);
                session.send(message);
                Ok(())
            }
            SessionState::Closed | SessionState::Failed => Err(CameraError::SessionClosed),
            other => Err(CameraError::SessionNotReady(other)),
        }
    }

    fn session(&self, handle: &SessionHandle) -> Result<Arc<Session>, CameraError> {
        self.slot()
            .session
            .as_ref()
            .filter(|s| s.handle() == handle)
            .cloned()
            .ok_or(CameraError::SessionClosed)
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::new(self.next_request.fetch_add(1, Ordering::Relaxed))
    }

    /// Queues a capture; the handle resolves once the device delivered it.
    pub fn capture(
        &self,
        handle: &SessionHandle,
        kind: CaptureKind,
        options: CaptureOptions,
    ) -> Result<(RequestId, Pending<CaptureResult>), CameraError> {
        let session = self.session(handle)?;
        let mut core = session.lock();
        core.ensure_running()?;

        let resolution = match options.resolution {
            Some(r) if !core.device.supports_resolution(r) => {
                return Err(CameraError::invalid_argument(format!(
                    "resolution {r} not supported by {}",
                    core.device.id()
                )))
            }
            Some(r) => r,
            None => core.resolution,
        };
        let format = options.format.unwrap_or_else(|| kind.default_format());
        if !format.suits(kind) {
            return Err(CameraError::invalid_argument(format!(
                "{format:?} cannot hold a {}",
                kind.as_str()
            )));
        }
        let flash = match kind {
            CaptureKind::Photo => core
                .surface
                .resolve_flash(options.flash.unwrap_or(core.controls.flash))?,
            CaptureKind::Video => FlashMode::Off,
        };

        let request = CaptureRequest {
            id: self.next_request_id(),
            kind,
            resolution,
            format,
            flash,
            metadata: options.metadata,
        };
        let id = request.id;
        let pending = core.pipeline.submit(request)?;
        core.progress(id, ProgressInfo::Queued);
        core.update_outstanding();
        drop(core);

        session.send(Message::Dispatch);
        Ok((id, pending))
    }

    /// Stops a recording. Its result arrives on the handle from `capture`.
    pub fn stop_video(&self, handle: &SessionHandle, id: RequestId) -> Result<(), CameraError> {
        let session = self.session(handle)?;
        let mut core = session.lock();
        if matches!(core.state, SessionState::Closed | SessionState::Failed) {
            return Err(CameraError::SessionClosed);
        }

        let outcome = core.pipeline.stop_video(id, Instant::now())?;
        match outcome {
            StopOutcome::Finish => {
                drop(core);
                tracing::debug!(request = %id, "Stopping recording");
                session.send(Message::StopVideo(id));
            }
            StopOutcome::Dequeued(entry) => core.finish(entry, Err(CameraError::Cancelled(id))),
            StopOutcome::AlreadyFinishing => {}
        }
        Ok(())
    }

    /// Cancels a queued capture, which then resolves `Cancelled`.
    pub fn cancel(&self, handle: &SessionHandle, id: RequestId) -> Result<(), CameraError> {
        let session = self.session(handle)?;
        let mut core = session.lock();
        if matches!(core.state, SessionState::Closed | SessionState::Failed) {
            return Err(CameraError::SessionClosed);
        }
        let entry = core.pipeline.cancel(id)?;
        core.finish(entry, Err(CameraError::Cancelled(id)));
        Ok(())
    }

    /// Validates a control change and hands it to the worker.
    pub fn set_control(
        &self,
        handle: &SessionHandle,
        value: ControlValue,
    ) -> Result<Pending<ControlState>, CameraError> {
        let session = self.session(handle)?;
        let core = session.lock();
        core.ensure_running()?;
        let value = core.surface.validate(value)?;
        drop(core);

        let (pending, done) = pending();
        if !session.send(Message::ApplyControls { value, done }) {
            return Err(CameraError::SessionClosed);
        }
        Ok(pending)
    }

    /// Last committed controls.
    pub fn controls(&self, handle: &SessionHandle) -> Result<ControlState, CameraError> {
        Ok(self.session(handle)?.lock().controls.clone())
    }

    /// Closes any open session and waits for its worker to finish.
    pub fn shutdown(&self) {
        let (handle, worker) = {
            let mut slot = self.slot();
            (
                slot.session.as_ref().map(|s| s.handle().clone()),
                slot.worker.take(),
            )
        };
        if let Some(handle) = handle {
            let _ = self.close(&handle);
        }
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::warn!("Session worker panicked");
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
