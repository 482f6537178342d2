//! Camera Bridge Library
//!
//! A camera capture engine that exposes an asynchronous operation/event
//! contract to a host runtime. Hosts call operations on a [`CameraModule`],
//! get back [`Pending`] handles that resolve exactly once, and receive
//! session state changes and capture progress as [`BridgeEvent`]s.
//!
//! # Architecture
//!
//! ```text
//! host ──► bridge ──► session ──► pipeline ──► device
//!             │          │            ▲
//!             │          └─ control ──┘
//!             └─ permission
//! ```
//!
//! - **permission**: authorization checks in front of every hardware access
//! - **session**: lifecycle state machine, one worker thread per session
//! - **control**: validation of zoom, focus, flash, torch and exposure
//! - **pipeline**: bounded capture queue and request bookkeeping
//! - **device**: the hardware seam, with a simulated backend
//! - **bridge**: the operation surface, events and JSON payloads
//!
//! # Example
//!
//! ```no_run
//! use camera_bridge::{
//!     device::{DeviceRegistry, SimulatedBackend},
//!     permission::StaticPermissions,
//!     pipeline::CaptureOptions,
//!     CameraModule, SessionConfig,
//! };
//! use std::sync::Arc;
//!
//! let registry = Arc::new(DeviceRegistry::new(Arc::new(SimulatedBackend::with_default_devices())).unwrap());
//! let module = CameraModule::new(registry, Arc::new(StaticPermissions::authorized()), SessionConfig::default());
//!
//! let handle = module.open_session("back", None).unwrap().wait().unwrap();
//! let photo = module.capture_photo(&handle, CaptureOptions::default()).unwrap().wait().unwrap();
//! println!("{} bytes", photo.artifact.bytes().map_or(0, |b| b.len()));
//! module.close_session(&handle).unwrap();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod control;
pub mod device;
pub mod error;
pub mod metrics;
pub mod permission;
pub mod pipeline;
pub mod session;

// Re-export commonly used types at crate root
pub use bridge::{BridgeEvent, CameraModule, Pending, ProgressInfo};
pub use control::{ControlPolicy, ControlState, ControlValue};
pub use device::{CameraDevice, DeviceRegistry};
pub use error::{CameraError, ErrorKind};
pub use permission::{Capability, PermissionStatus};
pub use pipeline::{CaptureOptions, CaptureResult, RequestId};
pub use session::{FileConfig, SessionConfig, SessionHandle, SessionState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
