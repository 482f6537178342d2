//! Simulated camera backend.
//!
//! Produces synthetic photos and recordings without touching any hardware.
//! Callbacks are delivered from a per-device scheduler thread, the same way
//! a platform camera delivers them from its own queue. In manual mode
//! captures only finish when driven through [`SimulatorControl`], which
//! makes the ordering of completions fully deterministic in tests.

use super::{
    CameraBackend, CameraDevice, CameraPosition, DeviceCapabilities, DeviceHandle, FlashMode,
    FocusMode, HardwareCapture, HardwareError, HardwareEvent, HardwareEventSink, HardwareOutput,
    RecordedSegment, Resolution, StreamConfig, TorchMode, ValueRange,
};
use crate::bridge::ProgressInfo;
use crate::control::ControlState;
use crate::pipeline::{CaptureKind, RequestId};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex, MutexGuard,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Upper bound on synthetic image payloads.
const MAX_SYNTHETIC_BYTES: usize = 16 * 1024;

/// How simulated devices behave.
#[derive(Debug, Clone)]
pub struct SimulatedBehavior {
    /// Delay between `configure` and the `Ready` notification.
    pub ready_delay: Duration,
    /// Delay between submitting a photo (or finishing a recording) and its result.
    pub capture_latency: Duration,
    /// When false, captures wait for [`SimulatorControl::complete`].
    pub auto_complete: bool,
    /// Error returned by every `connect`.
    pub connect_error: Option<HardwareError>,
    /// Recordings are accepted but never reported as started.
    pub stall_recordings: bool,
}

impl Default for SimulatedBehavior {
    fn default() -> Self {
        Self {
            ready_delay: Duration::from_millis(2),
            capture_latency: Duration::from_millis(5),
            auto_complete: true,
            connect_error: None,
            stall_recordings: false,
        }
    }
}

impl SimulatedBehavior {
    /// Captures never finish on their own.
    pub fn manual() -> Self {
        Self {
            auto_complete: false,
            ..Default::default()
        }
    }
}

/// Backend serving a fixed set of simulated devices.
pub struct SimulatedBackend {
    devices: Vec<CameraDevice>,
    behavior: SimulatedBehavior,
    control: SimulatorControl,
}

impl SimulatedBackend {
    pub fn new(devices: Vec<CameraDevice>) -> Self {
        Self {
            devices,
            behavior: SimulatedBehavior::default(),
            control: SimulatorControl::default(),
        }
    }

    /// A back, a front and an external camera.
    pub fn with_default_devices() -> Self {
        Self::new(Self::default_devices())
    }

    pub fn default_devices() -> Vec<CameraDevice> {
        let back = DeviceCapabilities {
            resolutions: vec![
                Resolution::new(1280, 720),
                Resolution::new(1920, 1080),
                Resolution::new(3840, 2160),
            ],
            flash_modes: vec![FlashMode::Off, FlashMode::On, FlashMode::Auto],
            torch_modes: vec![TorchMode::Off, TorchMode::On],
            focus_modes: vec![FocusMode::Auto, FocusMode::Continuous, FocusMode::Locked],
            zoom: ValueRange::new(1.0, 10.0),
            exposure_bias: ValueRange::new(-2.0, 2.0),
            focus_point: true,
            multi_stream: false,
        };
        let front = DeviceCapabilities {
            resolutions: vec![Resolution::new(1280, 720), Resolution::new(1920, 1080)],
            flash_modes: vec![FlashMode::Off],
            torch_modes: vec![TorchMode::Off],
            focus_modes: vec![FocusMode::Continuous],
            zoom: ValueRange::new(1.0, 2.0),
            exposure_bias: ValueRange::new(-1.0, 1.0),
            focus_point: false,
            multi_stream: false,
        };
        let external = DeviceCapabilities {
            multi_stream: true,
            ..DeviceCapabilities::default()
        };

        vec![
            CameraDevice::new("external", "USB Camera", CameraPosition::External, external),
            CameraDevice::new("front", "Front Camera", CameraPosition::Front, front),
            CameraDevice::new("back", "Back Camera", CameraPosition::Back, back),
        ]
    }

    pub fn with_behavior(mut self, behavior: SimulatedBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Handle for inspecting and driving connected devices.
    pub fn control(&self) -> SimulatorControl {
        self.control.clone()
    }
}

impl CameraBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn enumerate(&self) -> Result<Vec<CameraDevice>, HardwareError> {
        Ok(self.devices.clone())
    }

    fn connect(
        &self,
        device: &CameraDevice,
        sink: HardwareEventSink,
    ) -> Result<Box<dyn DeviceHandle>, HardwareError> {
        if let Some(err) = &self.behavior.connect_error {
            return Err(err.clone());
        }

        {
            let mut state = self.control.lock();
            let sim = state.entry(device.id().to_string()).or_default();
            sim.connects += 1;
            sim.sink = Some(sink.clone());
            sim.outstanding.clear();
            sim.recording = None;
        }
        tracing::info!(device = device.id(), "Simulated device connected");

        Ok(Box::new(SimulatedDevice::start(
            device.clone(),
            self.behavior.clone(),
            self.control.clone(),
            sink,
        )?))
    }
}

#[derive(Debug)]
struct SimRecording {
    capture: HardwareCapture,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
    segments: usize,
}

impl SimRecording {
    fn new(capture: HardwareCapture) -> Self {
        Self {
            capture,
            started: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
            segments: 1,
        }
    }

    fn output(&self, device: &str) -> HardwareOutput {
        let paused = self.paused_total + self.paused_at.map(|p| p.elapsed()).unwrap_or_default();
        let segments = (0..self.segments)
            .map(|n| RecordedSegment {
                uri: format!("sim://{}/{}-{}.mp4", device, self.capture.id, n),
                rect: None,
            })
            .collect();
        HardwareOutput::Video {
            segments,
            duration: self.started.elapsed().saturating_sub(paused),
            resolution: self.capture.resolution,
        }
    }
}

#[derive(Debug, Default)]
struct DeviceSim {
    connects: usize,
    releases: usize,
    sink: Option<HardwareEventSink>,
    /// Photos submitted but not yet completed (manual mode).
    outstanding: Vec<HardwareCapture>,
    recording: Option<SimRecording>,
    applied: Option<ControlState>,
    fail_next_submit: Option<HardwareError>,
    sequence: u64,
}

/// Inspection and fault-injection handle shared with the backend.
#[derive(Debug, Clone, Default)]
pub struct SimulatorControl {
    inner: Arc<Mutex<HashMap<String, DeviceSim>>>,
}

impl SimulatorControl {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, DeviceSim>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with<T>(&self, device: &str, f: impl FnOnce(&mut DeviceSim) -> T) -> Option<T> {
        self.lock().get_mut(device).map(f)
    }

    /// Times `device` has been connected.
    pub fn connects(&self, device: &str) -> usize {
        self.with(device, |d| d.connects).unwrap_or(0)
    }

    /// Connections to any device.
    pub fn total_connects(&self) -> usize {
        self.lock().values().map(|d| d.connects).sum()
    }

    pub fn releases(&self, device: &str) -> usize {
        self.with(device, |d| d.releases).unwrap_or(0)
    }

    /// Controls most recently applied to `device`.
    pub fn applied_controls(&self, device: &str) -> Option<ControlState> {
        self.with(device, |d| d.applied.clone()).flatten()
    }

    /// Photos waiting for manual completion.
    pub fn outstanding(&self, device: &str) -> Vec<RequestId> {
        self.with(device, |d| d.outstanding.iter().map(|c| c.id).collect())
            .unwrap_or_default()
    }

    /// Request id of the active recording, if any.
    pub fn recording(&self, device: &str) -> Option<RequestId> {
        self.with(device, |d| d.recording.as_ref().map(|r| r.capture.id))
            .flatten()
    }

    /// Makes the next `submit` on `device` fail.
    pub fn fail_next_submit(&self, device: &str, error: HardwareError) {
        self.lock().entry(device.to_string()).or_default().fail_next_submit = Some(error);
    }

    /// Finishes a capture by id. Returns false if it is unknown.
    pub fn complete(&self, device: &str, id: RequestId) -> bool {
        let (sink, output) = {
            let mut state = self.lock();
            let Some(sim) = state.get_mut(device) else {
                return false;
            };
            let output = if let Some(pos) = sim.outstanding.iter().position(|c| c.id == id) {
                let capture = sim.outstanding.remove(pos);
                sim.sequence += 1;
                synthetic_image(&capture, sim.sequence)
            } else if sim.recording.as_ref().map(|r| r.capture.id) == Some(id) {
                match sim.recording.take() {
                    Some(recording) => recording.output(device),
                    None => return false,
                }
            } else {
                return false;
            };
            (sim.sink.clone(), output)
        };

        sink.map(|s| s.emit(HardwareEvent::Completed { request: id, output }))
            .unwrap_or(false)
    }

    /// Waits for a photo to be submitted on `device` and completes it.
    pub fn complete_next(&self, device: &str, timeout: Duration) -> Option<RequestId> {
        let id = self.wait_until(timeout, || self.outstanding(device).first().copied())?;
        self.complete(device, id).then_some(id)
    }

    /// Waits until `device` has at least `count` outstanding photos.
    pub fn wait_for_outstanding(&self, device: &str, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, || (self.outstanding(device).len() >= count).then_some(()))
            .is_some()
    }

    /// Waits until `device` is recording.
    pub fn wait_for_recording(&self, device: &str, timeout: Duration) -> Option<RequestId> {
        self.wait_until(timeout, || self.recording(device))
    }

    /// Pushes an arbitrary notification, as if the platform sent it.
    pub fn emit(&self, device: &str, event: HardwareEvent) -> bool {
        let sink = self.with(device, |d| d.sink.clone()).flatten();
        sink.map(|s| s.emit(event)).unwrap_or(false)
    }

    /// Simulates the device being unplugged.
    pub fn disconnect(&self, device: &str) -> bool {
        self.emit(device, HardwareEvent::Fault(HardwareError::Disconnected))
    }

    fn wait_until<T>(&self, timeout: Duration, mut probe: impl FnMut() -> Option<T>) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(v) = probe() {
                return Some(v);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn synthetic_image(capture: &HardwareCapture, sequence: u64) -> HardwareOutput {
    let len = (capture.resolution.pixel_count() as usize).min(MAX_SYNTHETIC_BYTES);
    // Deterministic pattern mixed with the sequence; stands in for encoded data
    let bytes = (0..len)
        .map(|i| ((i as u64 ^ sequence) % 256) as u8)
        .collect();
    HardwareOutput::Image {
        bytes,
        resolution: capture.resolution,
    }
}

type Scheduled = (Duration, HardwareEvent);

/// Callback-context thread delivering scheduled notifications in order.
struct Scheduler {
    tx: Option<Sender<Scheduled>>,
    released: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl Scheduler {
    fn spawn(device: &str, sink: HardwareEventSink) -> Result<Self, HardwareError> {
        let (tx, rx) = mpsc::channel::<Scheduled>();
        let released = Arc::new(AtomicBool::new(false));
        let released2 = Arc::clone(&released);

        let join = thread::Builder::new()
            .name(format!("sim-callbacks-{device}"))
            .spawn(move || {
                while let Ok((delay, event)) = rx.recv() {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    if released2.load(Ordering::SeqCst) || !sink.emit(event) {
                        break;
                    }
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            released,
            join: Some(join),
        })
    }

    fn schedule(&self, delay: Duration, event: HardwareEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send((delay, event));
        }
    }

    fn stop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
        self.tx = None;
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

struct SimulatedDevice {
    device: CameraDevice,
    behavior: SimulatedBehavior,
    control: SimulatorControl,
    scheduler: Scheduler,
    stream: Option<StreamConfig>,
}

impl SimulatedDevice {
    fn start(
        device: CameraDevice,
        behavior: SimulatedBehavior,
        control: SimulatorControl,
        sink: HardwareEventSink,
    ) -> Result<Self, HardwareError> {
        let scheduler = Scheduler::spawn(device.id(), sink)?;
        Ok(Self {
            device,
            behavior,
            control,
            scheduler,
            stream: None,
        })
    }

    fn id(&self) -> &str {
        self.device.id()
    }
}

impl DeviceHandle for SimulatedDevice {
    fn configure(&mut self, stream: &StreamConfig) -> Result<(), HardwareError> {
        if !self.device.supports_resolution(stream.resolution) {
            return Err(HardwareError::Rejected {
                operation: "configure",
                reason: format!("resolution {} not supported", stream.resolution),
            });
        }
        self.stream = Some(stream.clone());
        self.scheduler
            .schedule(self.behavior.ready_delay, HardwareEvent::Ready);
        Ok(())
    }

    fn apply_controls(&mut self, controls: &ControlState) -> Result<(), HardwareError> {
        let id = self.id().to_string();
        self.control.with(&id, |d| d.applied = Some(controls.clone()));
        Ok(())
    }

    fn submit(&mut self, capture: &HardwareCapture) -> Result<(), HardwareError> {
        let id = self.id().to_string();
        let auto = self.behavior.auto_complete;

        let output = self
            .control
            .with(&id, |d| -> Result<Option<HardwareOutput>, HardwareError> {
                if let Some(err) = d.fail_next_submit.take() {
                    return Err(err);
                }
                match capture.kind {
                    CaptureKind::Photo if auto => {
                        d.sequence += 1;
                        Ok(Some(synthetic_image(capture, d.sequence)))
                    }
                    CaptureKind::Photo => {
                        d.outstanding.push(capture.clone());
                        Ok(None)
                    }
                    CaptureKind::Video => {
                        d.recording = Some(SimRecording::new(capture.clone()));
                        Ok(None)
                    }
                }
            })
            .unwrap_or(Err(HardwareError::Disconnected))?;

        if capture.kind == CaptureKind::Video && self.behavior.stall_recordings {
            return Ok(());
        }
        self.scheduler.schedule(
            Duration::ZERO,
            HardwareEvent::Started {
                request: capture.id,
            },
        );
        let info = match capture.kind {
            CaptureKind::Photo => ProgressInfo::Processing,
            CaptureKind::Video => ProgressInfo::Recording { elapsed_ms: 0 },
        };
        self.scheduler.schedule(
            Duration::ZERO,
            HardwareEvent::Progress {
                request: capture.id,
                info,
            },
        );
        if let Some(output) = output {
            self.scheduler.schedule(
                self.behavior.capture_latency,
                HardwareEvent::Completed {
                    request: capture.id,
                    output,
                },
            );
        }
        Ok(())
    }

    fn finish_recording(&mut self, request: RequestId) -> Result<(), HardwareError> {
        let id = self.id().to_string();
        let auto = self.behavior.auto_complete;
        let stalled = self.behavior.stall_recordings;

        let output = self
            .control
            .with(&id, |d| match d.recording.as_ref() {
                Some(r) if stalled && r.capture.id == request => {
                    d.recording = None;
                    None
                }
                Some(r) if auto && r.capture.id == request => {
                    d.recording.take().map(|r| r.output(&id))
                }
                _ => None,
            })
            .flatten();

        if let Some(output) = output {
            self.scheduler.schedule(
                self.behavior.capture_latency,
                HardwareEvent::Completed { request, output },
            );
        }
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), HardwareError> {
        let id = self.id().to_string();
        self.control.with(&id, |d| {
            if let Some(r) = d.recording.as_mut() {
                r.paused_at.get_or_insert_with(Instant::now);
            }
        });
        Ok(())
    }

    fn resume(&mut self) -> Result<(), HardwareError> {
        let id = self.id().to_string();
        self.control.with(&id, |d| {
            if let Some(r) = d.recording.as_mut() {
                if let Some(paused) = r.paused_at.take() {
                    r.paused_total += paused.elapsed();
                    r.segments += 1;
                }
            }
        });
        Ok(())
    }

    fn release(&mut self) {
        self.scheduler.stop();
        let id = self.id().to_string();
        self.control.with(&id, |d| {
            d.releases += 1;
            d.sink = None;
            d.outstanding.clear();
            d.recording = None;
        });
        tracing::info!(device = %id, "Simulated device released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OutputFormat;

    fn capture(kind: CaptureKind, id: u64) -> HardwareCapture {
        HardwareCapture {
            id: RequestId::new(id),
            kind,
            resolution: Resolution::new(1280, 720),
            format: OutputFormat::Jpeg,
            flash: FlashMode::Off,
        }
    }

    fn connect(behavior: SimulatedBehavior) -> (Box<dyn DeviceHandle>, mpsc::Receiver<HardwareEvent>, SimulatorControl) {
        let backend = SimulatedBackend::with_default_devices().with_behavior(behavior);
        let control = backend.control();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let sink = HardwareEventSink::new(move |ev| {
            tx.lock().map(|tx| tx.send(ev).is_ok()).unwrap_or(false)
        });
        let device = backend.devices[2].clone();
        (backend.connect(&device, sink).unwrap(), rx, control)
    }

    #[test]
    fn test_configure_then_ready() {
        let (mut device, rx, control) = connect(SimulatedBehavior::default());
        device
            .configure(&StreamConfig {
                resolution: Resolution::new(1920, 1080),
                record_audio: false,
            })
            .unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, HardwareEvent::Ready));
        assert_eq!(control.connects("back"), 1);
    }

    #[test]
    fn test_unsupported_resolution_rejected() {
        let (mut device, _rx, _control) = connect(SimulatedBehavior::default());
        let err = device
            .configure(&StreamConfig {
                resolution: Resolution::new(1, 1),
                record_audio: false,
            })
            .unwrap_err();
        assert!(matches!(err, HardwareError::Rejected { .. }));
    }

    #[test]
    fn test_manual_photo_waits_for_control() {
        let (mut device, rx, control) = connect(SimulatedBehavior::manual());
        device.submit(&capture(CaptureKind::Photo, 7)).unwrap();

        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            HardwareEvent::Started { .. }
        ));
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            HardwareEvent::Progress { .. }
        ));
        assert_eq!(control.outstanding("back"), vec![RequestId::new(7)]);

        assert!(control.complete("back", RequestId::new(7)));
        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            HardwareEvent::Completed { request, output } => {
                assert_eq!(request, RequestId::new(7));
                assert!(matches!(output, HardwareOutput::Image { .. }));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!control.complete("back", RequestId::new(7)));
    }

    #[test]
    fn test_recording_segments_follow_resumes() {
        let (mut device, rx, _control) = connect(SimulatedBehavior::default());
        device.submit(&capture(CaptureKind::Video, 3)).unwrap();
        device.suspend().unwrap();
        device.resume().unwrap();
        device.finish_recording(RequestId::new(3)).unwrap();

        let output = loop {
            match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                HardwareEvent::Completed { output, .. } => break output,
                _ => continue,
            }
        };
        match output {
            HardwareOutput::Video { segments, .. } => assert_eq!(segments.len(), 2),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_release_counts() {
        let (mut device, _rx, control) = connect(SimulatedBehavior::default());
        device.release();
        assert_eq!(control.releases("back"), 1);
    }
}
