//! Camera hardware abstraction.
//!
//! Devices are described by [`CameraDevice`] and reached through the
//! [`CameraBackend`] / [`DeviceHandle`] capability-set traits. The
//! [`DeviceRegistry`] is the explicit, per-module list of known devices and
//! hands out exclusive leases. [`SimulatedBackend`] is the adapter used by
//! tests and the demo binary.

mod hardware;
mod registry;
mod simulated;
mod types;

pub use hardware::{
    CameraBackend, DeviceHandle, HardwareCapture, HardwareError, HardwareEvent,
    HardwareEventSink, HardwareOutput, RecordedSegment, StreamConfig,
};
pub use registry::{DeviceLease, DeviceRegistry};
pub use simulated::{SimulatedBackend, SimulatedBehavior, SimulatorControl};
pub use types::{
    CameraDevice, CameraPosition, DeviceCapabilities, FlashMode, FocusMode, Resolution,
    ResolutionPreference, TorchMode, ValueRange,
};
