//! Hardware-interaction worker.
//!
//! Each session runs one worker thread. It owns the device handle, so every
//! hardware command runs here, and it receives both caller commands and
//! device callbacks as [`Message`]s on a single channel. That keeps device
//! access serialized without the device handle ever crossing threads.

use super::shared::{Context, Session};
use super::{SessionState, Transition};
use crate::bridge::{Completer, ProgressInfo};
use crate::control::{ControlState, ControlValue};
use crate::device::{
    DeviceHandle, DeviceLease, HardwareError, HardwareEvent, HardwareEventSink, StreamConfig,
};
use crate::error::CameraError;
use crate::permission::Capability;
use crate::pipeline::{CaptureKind, CaptureResult, RequestId};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Interval at which capture deadlines are checked when nothing arrives.
const TICK: Duration = Duration::from_millis(10);

/// Everything a session worker reacts to.
#[derive(Debug)]
pub(crate) enum Message {
    /// Callback from the device.
    Hardware(HardwareEvent),
    /// New requests were queued.
    Dispatch,
    ApplyControls {
        value: ControlValue,
        done: Completer<ControlState>,
    },
    StopVideo(RequestId),
    Suspend,
    Resume,
    Close,
}

/// Worker entry point.
///
/// `previous` is the worker of the session this one replaces; it is joined
/// first so that its device is released before this one acquires any.
pub(crate) fn run(
    session: Arc<Session>,
    rx: Receiver<Message>,
    ctx: Arc<Context>,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if previous.join().is_err() {
            tracing::warn!("Previous session worker panicked");
        }
    }

    let Some(lease) = acquire(&session, &ctx) else {
        return;
    };

    let sink = {
        let tx = Mutex::new(session.sender());
        HardwareEventSink::new(move |event| {
            tx.lock()
                .map(|tx| tx.send(Message::Hardware(event)).is_ok())
                .unwrap_or(false)
        })
    };

    let mut device = match ctx.registry.connect(&lease, sink) {
        Ok(device) => device,
        Err(e) => {
            session.lock().fail(e);
            return;
        }
    };

    let stream = {
        let core = session.lock();
        StreamConfig {
            resolution: core.resolution,
            record_audio: core.config.record_audio,
        }
    };
    match device.configure(&stream) {
        Ok(()) => {
            tracing::debug!(
                session = %session.handle().id(),
                resolution = %stream.resolution,
                "Stream configured"
            );
            Worker {
                session: &session,
                device: &mut device,
            }
            .event_loop(&rx);
        }
        Err(e) => session.lock().fail(e),
    }

    device.release();
    drop(lease);
    tracing::debug!(session = %session.handle().id(), "Session worker finished");
}

/// Authorizes and leases the device. `None` when the open was refused.
fn acquire(session: &Session, ctx: &Context) -> Option<DeviceLease> {
    let (device_id, record_audio) = {
        let core = session.lock();
        (core.device.id().to_string(), core.config.record_audio)
    };

    ctx.gate.reset();
    let required: &[Capability] = if record_audio {
        &[Capability::Camera, Capability::Microphone]
    } else {
        &[Capability::Camera]
    };
    // May block on a user prompt; the caller's thread is not involved
    if let Err(e) = ctx.gate.authorize(required) {
        session.lock().abort(e);
        return None;
    }

    let mut core = session.lock();
    if core.state != SessionState::Configuring {
        // Closed while waiting for authorization
        return None;
    }
    match ctx.registry.acquire(&device_id) {
        Ok(lease) => Some(lease),
        Err(e) => {
            core.abort(e);
            None
        }
    }
}

struct Worker<'a> {
    session: &'a Session,
    device: &'a mut Box<dyn DeviceHandle>,
}

impl Worker<'_> {
    fn event_loop(&mut self, rx: &Receiver<Message>) {
        loop {
            let keep_going = match rx.recv_timeout(TICK) {
                Ok(Message::Close) => false,
                Ok(message) => self.handle(message),
                Err(RecvTimeoutError::Timeout) => true,
                Err(RecvTimeoutError::Disconnected) => false,
            };
            if !keep_going {
                break;
            }
            self.expire();
        }
    }

    /// Processes one message. Returns `false` once the session is over.
    fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::Hardware(event) => return self.on_hardware(event),
            Message::Dispatch => self.dispatch(),
            Message::ApplyControls { value, done } => self.apply_controls(value, done),
            Message::StopVideo(id) => {
                if let Err(e) = self.device.finish_recording(id) {
                    self.fail_request(id, e);
                }
            }
            Message::Suspend => {
                if let Err(e) = self.device.suspend() {
                    return self.device_error("suspend", e);
                }
            }
            Message::Resume => {
                if let Err(e) = self.device.resume() {
                    return self.device_error("resume", e);
                }
                self.dispatch();
            }
            Message::Close => return false,
        }
        !self.is_over()
    }

    fn is_over(&self) -> bool {
        matches!(
            self.session.state(),
            SessionState::Closed | SessionState::Failed
        )
    }

    fn on_hardware(&mut self, event: HardwareEvent) -> bool {
        match event {
            HardwareEvent::Ready => return self.on_ready(),
            HardwareEvent::Started { request } => {
                let mut core = self.session.lock();
                if core.pipeline.started(request) {
                    core.progress(request, ProgressInfo::Started);
                } else {
                    tracing::trace!(request = %request, "Discarding start of unknown request");
                }
            }
            HardwareEvent::Progress { request, info } => {
                let core = self.session.lock();
                if core.pipeline.is_in_flight(request) && !info.is_terminal() {
                    core.progress(request, info);
                } else {
                    tracing::trace!(request = %request, "Discarding progress of resolved request");
                }
            }
            HardwareEvent::Completed { request, output } => {
                {
                    let mut core = self.session.lock();
                    match core.pipeline.take(request) {
                        Some(entry) => {
                            let result =
                                CaptureResult::from_output(entry.request.clone(), &core.device, output);
                            core.finish(entry, Ok(result));
                        }
                        None => {
                            tracing::trace!(request = %request, "Discarding duplicate completion")
                        }
                    }
                }
                self.dispatch();
            }
            HardwareEvent::Failed { request, error } => {
                let invalidates = error.invalidates_session();
                self.fail_request(request, error.clone());
                if invalidates {
                    self.session.lock().fail(error);
                    return false;
                }
                self.dispatch();
            }
            HardwareEvent::Fault(error) => {
                self.session.lock().fail(error);
                return false;
            }
        }
        !self.is_over()
    }

    fn on_ready(&mut self) -> bool {
        let mut core = self.session.lock();
        if core.state != SessionState::Configuring {
            tracing::trace!(state = %core.state, "Ignoring ready notification");
            return !matches!(core.state, SessionState::Closed | SessionState::Failed);
        }
        if let Err(e) = self.device.apply_controls(&core.controls) {
            core.fail(e);
            return false;
        }
        core.transition(Transition::DeviceReady);
        let handle = core.handle.clone();
        core.resolve_open(Ok(handle));
        true
    }

    fn dispatch(&mut self) {
        let captures: Vec<_> = {
            let mut core = self.session.lock();
            if core.state != SessionState::Running {
                return;
            }
            let now = Instant::now();
            std::iter::from_fn(|| core.pipeline.next_dispatch(now)).collect()
        };

        for capture in captures {
            tracing::debug!(
                request = %capture.id,
                kind = capture.kind.as_str(),
                resolution = %capture.resolution,
                "Dispatching capture"
            );
            if let Err(e) = self.device.submit(&capture) {
                let invalidates = e.invalidates_session();
                self.fail_request(capture.id, e.clone());
                if invalidates {
                    self.session.lock().fail(e);
                    return;
                }
            }
        }
    }

    fn apply_controls(&mut self, value: ControlValue, done: Completer<ControlState>) {
        let next = {
            let core = self.session.lock();
            match core.state {
                SessionState::Running | SessionState::Suspended => core.controls.with(&value),
                SessionState::Closed | SessionState::Failed => {
                    done.complete(Err(CameraError::SessionClosed));
                    return;
                }
                other => {
                    done.complete(Err(CameraError::SessionNotReady(other)));
                    return;
                }
            }
        };

        // Only the worker commits controls, so `next` cannot go stale here
        match self.device.apply_controls(&next) {
            Ok(()) => {
                let mut core = self.session.lock();
                core.controls = next.clone();
                if let Some(m) = &core.ctx.metrics {
                    m.control_changed();
                }
                tracing::debug!(control = %value.kind(), "Control applied");
                done.complete(Ok(next));
            }
            Err(e) => {
                tracing::warn!(control = %value.kind(), error = %e, "Device rejected control change");
                let invalidates = e.invalidates_session();
                done.complete(Err(CameraError::HardwareFault(e.clone())));
                if invalidates {
                    self.session.lock().fail(e);
                }
            }
        }
    }

    fn fail_request(&mut self, id: RequestId, error: HardwareError) {
        let mut core = self.session.lock();
        match core.pipeline.take(id) {
            Some(entry) => {
                tracing::warn!(request = %id, error = %error, "Capture failed on device");
                core.finish(entry, Err(CameraError::HardwareFault(error)));
            }
            None => tracing::trace!(request = %id, "Discarding failure of resolved request"),
        }
    }

    fn device_error(&mut self, operation: &str, error: HardwareError) -> bool {
        tracing::warn!(operation, error = %error, "Device command failed");
        if error.invalidates_session() {
            self.session.lock().fail(error);
            return false;
        }
        true
    }

    fn expire(&mut self) {
        let mut core = self.session.lock();
        let expired = core.pipeline.expire(Instant::now());
        if expired.is_empty() {
            return;
        }
        let after = core.pipeline.timeout();
        let mut abandoned = None;
        for entry in expired {
            let request = entry.request.id;
            tracing::warn!(request = %request, ?after, "Capture timed out");
            if entry.request.kind == CaptureKind::Video {
                abandoned = Some(request);
            }
            core.finish(entry, Err(CameraError::CaptureTimeout { request, after }));
        }
        drop(core);

        // Whatever the device delivers for it later is discarded
        if let Some(request) = abandoned {
            if let Err(e) = self.device.finish_recording(request) {
                tracing::debug!(request = %request, error = %e, "Could not stop timed-out recording");
            }
        }
        self.dispatch();
    }
}
