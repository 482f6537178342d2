//! Public operation surface.

use super::{pending, BridgeEvent, EventBus, Pending};
use crate::control::{ControlState, ControlValue, FocusPoint};
use crate::device::{CameraDevice, DeviceRegistry, FlashMode, FocusMode, HardwareError, TorchMode};
use crate::error::CameraError;
use crate::metrics::MetricsRegistry;
use crate::permission::{Capability, PermissionGate, PermissionService, PermissionStatus};
use crate::pipeline::{CaptureKind, CaptureOptions, CaptureResult, RequestId, ResultHook};
use crate::session::{SessionConfig, SessionHandle, SessionManager, SessionState};
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;

/// One camera module instance, as registered with a host runtime.
///
/// Every operation returns immediately: validation failures come back as
/// `Err`, everything that needs the hardware or the user comes back as a
/// [`Pending`] that resolves exactly once.
pub struct CameraModule {
    registry: Arc<DeviceRegistry>,
    gate: Arc<PermissionGate>,
    events: EventBus,
    defaults: SessionConfig,
    sessions: SessionManager,
    /// Result handles of recordings, kept until `stop_video_capture`
    /// collects them, across sessions.
    recordings: Mutex<HashMap<RequestId, Pending<CaptureResult>>>,
}

impl CameraModule {
    /// Creates a module over `registry`.
    ///
    /// `defaults` is the session configuration used when `open_session` is
    /// given none; it carries the module-wide control policy.
    pub fn new(
        registry: Arc<DeviceRegistry>,
        permissions: Arc<dyn PermissionService>,
        defaults: SessionConfig,
    ) -> Self {
        let gate = Arc::new(PermissionGate::new(permissions));
        let events = EventBus::new();
        let sessions = SessionManager::new(Arc::clone(&registry), Arc::clone(&gate), events.clone());
        Self {
            registry,
            gate,
            events,
            defaults,
            sessions,
            recordings: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.sessions = self.sessions.with_metrics(metrics);
        self
    }

    /// Installs a hook that may rewrite each result before delivery.
    pub fn with_result_hook(
        mut self,
        hook: impl Fn(CaptureResult) -> CaptureResult + Send + Sync + 'static,
    ) -> Self {
        let hook: ResultHook = Arc::new(hook);
        self.sessions = self.sessions.with_result_hook(hook);
        self
    }

    /// Receiver for every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    pub fn default_session_config(&self) -> &SessionConfig {
        &self.defaults
    }

    /// Known devices, ordered back, front, external, then by id.
    pub fn list_devices(&self) -> Vec<CameraDevice> {
        self.registry.devices()
    }

    pub fn refresh_devices(&self) -> Result<Vec<CameraDevice>, CameraError> {
        self.registry.refresh()?;
        Ok(self.registry.devices())
    }

    /// Current authorization, without prompting.
    pub fn check_permission(&self, capability: Capability) -> PermissionStatus {
        self.gate.check(capability)
    }

    /// Prompts if undetermined. The prompt runs on its own thread.
    pub fn request_permission(&self, capability: Capability) -> Pending<PermissionStatus> {
        let (pending, completer) = pending();
        let gate = Arc::clone(&self.gate);
        let spawned = thread::Builder::new()
            .name("camera-permission".into())
            .spawn(move || completer.complete(Ok(gate.request(capability))));
        match spawned {
            Ok(_) => pending,
            Err(e) => Pending::ready(Err(CameraError::HardwareFault(HardwareError::from(e)))),
        }
    }

    /// Opens a session; `config` defaults to the module defaults.
    pub fn open_session(
        &self,
        device_id: &str,
        config: Option<SessionConfig>,
    ) -> Result<Pending<SessionHandle>, CameraError> {
        let config = config.unwrap_or_else(|| self.defaults.clone());
        self.sessions.open(device_id, config)
    }

    pub fn close_session(&self, handle: &SessionHandle) -> Result<(), CameraError> {
        self.sessions.close(handle)
    }

    pub fn suspend_session(&self, handle: &SessionHandle) -> Result<(), CameraError> {
        self.sessions.suspend(handle)
    }

    pub fn resume_session(&self, handle: &SessionHandle) -> Result<(), CameraError> {
        self.sessions.resume(handle)
    }

    pub fn session_state(&self) -> SessionState {
        self.sessions.state()
    }

    pub fn capture_photo(
        &self,
        handle: &SessionHandle,
        options: CaptureOptions,
    ) -> Result<Pending<CaptureResult>, CameraError> {
        let (_, pending) = self.sessions.capture(handle, CaptureKind::Photo, options)?;
        Ok(pending)
    }

    /// Starts recording. The recording is collected by `stop_video_capture`.
    pub fn start_video_capture(
        &self,
        handle: &SessionHandle,
        options: CaptureOptions,
    ) -> Result<RequestId, CameraError> {
        let (id, pending) = self.sessions.capture(handle, CaptureKind::Video, options)?;
        self.recordings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, pending);
        Ok(id)
    }

    /// Stops a recording and returns the handle its result arrives on.
    ///
    /// A recording that already resolved (its session closed, it failed or
    /// timed out) is handed back with that outcome. A stop refused for any
    /// other reason, such as a stale handle for a live recording, returns
    /// the error and keeps the recording collectable.
    pub fn stop_video_capture(
        &self,
        handle: &SessionHandle,
        request_id: RequestId,
    ) -> Result<Pending<CaptureResult>, CameraError> {
        let mut recordings = self.recordings.lock().unwrap_or_else(|e| e.into_inner());
        let Some(pending) = recordings.get_mut(&request_id) else {
            return Err(CameraError::invalid_argument(format!(
                "{request_id} is not a recording started by this module"
            )));
        };

        if let Err(e) = self.sessions.stop_video(handle, request_id) {
            if !pending.is_resolved() {
                return Err(e);
            }
            tracing::debug!(request = %request_id, error = %e, "Recording already resolved");
        }
        recordings
            .remove(&request_id)
            .ok_or_else(|| CameraError::invalid_argument(format!("{request_id} was already collected")))
    }

    pub fn cancel_capture(&self, handle: &SessionHandle, request_id: RequestId) -> Result<(), CameraError> {
        self.sessions.cancel(handle, request_id)
    }

    /// Generic control entry point.
    pub fn set_control(
        &self,
        handle: &SessionHandle,
        value: ControlValue,
    ) -> Result<Pending<ControlState>, CameraError> {
        self.sessions.set_control(handle, value)
    }

    pub fn set_zoom(&self, handle: &SessionHandle, zoom: f64) -> Result<Pending<ControlState>, CameraError> {
        self.set_control(handle, ControlValue::Zoom(zoom))
    }

    pub fn set_focus(
        &self,
        handle: &SessionHandle,
        mode: FocusMode,
        point: Option<FocusPoint>,
    ) -> Result<Pending<ControlState>, CameraError> {
        self.set_control(handle, ControlValue::Focus { mode, point })
    }

    pub fn set_flash(&self, handle: &SessionHandle, mode: FlashMode) -> Result<Pending<ControlState>, CameraError> {
        self.set_control(handle, ControlValue::Flash(mode))
    }

    pub fn set_torch(&self, handle: &SessionHandle, mode: TorchMode) -> Result<Pending<ControlState>, CameraError> {
        self.set_control(handle, ControlValue::Torch(mode))
    }

    pub fn set_exposure_bias(
        &self,
        handle: &SessionHandle,
        bias: f64,
    ) -> Result<Pending<ControlState>, CameraError> {
        self.set_control(handle, ControlValue::ExposureBias(bias))
    }

    /// Controls last accepted by the device.
    pub fn controls(&self, handle: &SessionHandle) -> Result<ControlState, CameraError> {
        self.sessions.controls(handle)
    }
}

impl std::fmt::Debug for CameraModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraModule")
            .field("registry", &self.registry)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
