//! Capability-set interface implemented by device adapters.
//!
//! A [`CameraBackend`] enumerates devices and connects to them; the
//! resulting [`DeviceHandle`] receives commands from exactly one session
//! worker thread. Whatever the platform delivers through its own callbacks
//! comes back as [`HardwareEvent`]s pushed into a [`HardwareEventSink`].

use super::{CameraDevice, FlashMode, Resolution};
use crate::bridge::ProgressInfo;
use crate::control::ControlState;
use crate::pipeline::{CaptureKind, OutputFormat, RequestId, Rect};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by device adapters.
#[derive(Debug, Clone, Error)]
pub enum HardwareError {
    #[error("device disconnected")]
    Disconnected,
    #[error("device rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
    #[error("platform error {code}: {message}")]
    Platform { code: i32, message: String },
    #[error("io error: {0}")]
    Io(String),
}

impl HardwareError {
    /// Whether the fault leaves the session unusable.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, HardwareError::Disconnected)
    }
}

impl From<std::io::Error> for HardwareError {
    fn from(err: std::io::Error) -> Self {
        HardwareError::Io(err.to_string())
    }
}

/// Stream configuration applied when a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub resolution: Resolution,
    pub record_audio: bool,
}

/// A capture as handed to the device.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareCapture {
    pub id: RequestId,
    pub kind: CaptureKind,
    pub resolution: Resolution,
    pub format: OutputFormat,
    pub flash: FlashMode,
}

/// One contiguous piece of a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSegment {
    pub uri: String,
    pub rect: Option<Rect>,
}

/// Raw output produced by the device for a finished capture.
#[derive(Debug, Clone)]
pub enum HardwareOutput {
    Image {
        bytes: Vec<u8>,
        resolution: Resolution,
    },
    Video {
        segments: Vec<RecordedSegment>,
        duration: Duration,
        resolution: Resolution,
    },
}

/// Notifications delivered from the device's callback context.
#[derive(Debug, Clone)]
pub enum HardwareEvent {
    /// Stream configured, frames are flowing.
    Ready,
    /// The device began processing a capture.
    Started { request: RequestId },
    Progress {
        request: RequestId,
        info: ProgressInfo,
    },
    Completed {
        request: RequestId,
        output: HardwareOutput,
    },
    Failed {
        request: RequestId,
        error: HardwareError,
    },
    /// Device-level fault not tied to a request.
    Fault(HardwareError),
}

/// Callback target for hardware notifications.
///
/// Cheap to clone. `emit` returns `false` once nobody is listening anymore.
#[derive(Clone)]
pub struct HardwareEventSink(Arc<dyn Fn(HardwareEvent) -> bool + Send + Sync + 'static>);

impl HardwareEventSink {
    pub fn new(f: impl Fn(HardwareEvent) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[inline]
    pub fn emit(&self, event: HardwareEvent) -> bool {
        (self.0)(event)
    }
}

impl std::fmt::Debug for HardwareEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HardwareEventSink")
    }
}

/// A platform camera facility.
pub trait CameraBackend: Send + Sync {
    /// Backend name, for diagnostics.
    fn name(&self) -> &str;

    /// Lists the devices currently attached.
    fn enumerate(&self) -> Result<Vec<CameraDevice>, HardwareError>;

    /// Opens `device`. Notifications for it go to `sink`.
    fn connect(
        &self,
        device: &CameraDevice,
        sink: HardwareEventSink,
    ) -> Result<Box<dyn DeviceHandle>, HardwareError>;
}

/// An opened device.
///
/// Only ever driven from one session worker thread, so implementations need
/// not be reentrant. Every method returns quickly; completion is reported
/// through the sink.
pub trait DeviceHandle {
    /// Configures the stream; `HardwareEvent::Ready` follows.
    fn configure(&mut self, stream: &StreamConfig) -> Result<(), HardwareError>;

    fn apply_controls(&mut self, controls: &ControlState) -> Result<(), HardwareError>;

    /// Begins a photo, or starts a recording.
    fn submit(&mut self, capture: &HardwareCapture) -> Result<(), HardwareError>;

    /// Ends a recording; its `Completed` event follows.
    fn finish_recording(&mut self, request: RequestId) -> Result<(), HardwareError>;

    fn suspend(&mut self) -> Result<(), HardwareError>;

    fn resume(&mut self) -> Result<(), HardwareError>;

    /// Stops everything and frees the hardware.
    fn release(&mut self);
}
