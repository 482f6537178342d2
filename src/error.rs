//! Error taxonomy shared by every component.
//!
//! Every failure crossing the bridge is a [`CameraError`]. Callers branch on
//! [`ErrorKind`] (or its stable string [`code`](ErrorKind::code)) without
//! needing to know anything about the platform that produced it.

use crate::{
    control::ControlKind,
    device::HardwareError,
    permission::{Capability, PermissionStatus},
    pipeline::RequestId,
    session::{ConfigError, SessionState},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by camera bridge operations.
#[derive(Debug, Clone, Error)]
pub enum CameraError {
    #[error("camera device not available: {0}")]
    DeviceUnavailable(String),

    #[error("camera device is held by another session: {0}")]
    DeviceBusy(String),

    #[error("{capability} access not granted (status: {status})")]
    PermissionDenied {
        capability: Capability,
        status: PermissionStatus,
    },

    #[error("a session is already open (state: {0})")]
    AlreadyOpen(SessionState),

    #[error("session is not ready (state: {0})")]
    SessionNotReady(SessionState),

    #[error("session closed")]
    SessionClosed,

    #[error("capture queue is full (depth {0})")]
    QueueFull(usize),

    #[error("device does not support concurrent captures")]
    ConcurrentCaptureUnsupported,

    #[error("capture {request} timed out after {after:?}")]
    CaptureTimeout { request: RequestId, after: Duration },

    #[error("capture {0} has already started and cannot be cancelled")]
    NotCancellable(RequestId),

    #[error("unsupported {control} value: {reason}")]
    UnsupportedControlValue { control: ControlKind, reason: String },

    #[error("hardware fault: {0}")]
    HardwareFault(#[from] HardwareError),

    #[error("capture {0} was cancelled")]
    Cancelled(RequestId),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl CameraError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            CameraError::DeviceBusy(_) => ErrorKind::DeviceBusy,
            CameraError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            CameraError::AlreadyOpen(_) => ErrorKind::AlreadyOpen,
            CameraError::SessionNotReady(_) => ErrorKind::SessionNotReady,
            CameraError::SessionClosed => ErrorKind::SessionClosed,
            CameraError::QueueFull(_) => ErrorKind::QueueFull,
            CameraError::ConcurrentCaptureUnsupported => ErrorKind::ConcurrentCaptureUnsupported,
            CameraError::CaptureTimeout { .. } => ErrorKind::CaptureTimeout,
            CameraError::NotCancellable(_) => ErrorKind::NotCancellable,
            CameraError::UnsupportedControlValue { .. } => ErrorKind::UnsupportedControlValue,
            CameraError::HardwareFault(_) => ErrorKind::HardwareFault,
            CameraError::Cancelled(_) => ErrorKind::Cancelled,
            CameraError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CameraError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[inline]
    pub fn unsupported(control: ControlKind, reason: impl Into<String>) -> Self {
        Self::UnsupportedControlValue {
            control,
            reason: reason.into(),
        }
    }
}

/// Discriminant of [`CameraError`], stable across the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DeviceUnavailable,
    DeviceBusy,
    PermissionDenied,
    AlreadyOpen,
    SessionNotReady,
    SessionClosed,
    QueueFull,
    ConcurrentCaptureUnsupported,
    CaptureTimeout,
    NotCancellable,
    UnsupportedControlValue,
    HardwareFault,
    Cancelled,
    InvalidArgument,
    InvalidConfig,
}

impl ErrorKind {
    /// Error code handed to the host runtime when rejecting an operation.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::DeviceUnavailable => "E_DEVICE_UNAVAILABLE",
            ErrorKind::DeviceBusy => "E_DEVICE_BUSY",
            ErrorKind::PermissionDenied => "E_PERMISSION_DENIED",
            ErrorKind::AlreadyOpen => "E_ALREADY_OPEN",
            ErrorKind::SessionNotReady => "E_SESSION_NOT_READY",
            ErrorKind::SessionClosed => "E_SESSION_CLOSED",
            ErrorKind::QueueFull => "E_QUEUE_FULL",
            ErrorKind::ConcurrentCaptureUnsupported => "E_CONCURRENT_CAPTURE_UNSUPPORTED",
            ErrorKind::CaptureTimeout => "E_CAPTURE_TIMEOUT",
            ErrorKind::NotCancellable => "E_NOT_CANCELLABLE",
            ErrorKind::UnsupportedControlValue => "E_UNSUPPORTED_CONTROL_VALUE",
            ErrorKind::HardwareFault => "E_HARDWARE_FAULT",
            ErrorKind::Cancelled => "E_CANCELLED",
            ErrorKind::InvalidArgument => "E_INVALID_ARGUMENT",
            ErrorKind::InvalidConfig => "E_PARSING",
        }
    }

    /// Snake-case label, used for metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::DeviceUnavailable => "device_unavailable",
            ErrorKind::DeviceBusy => "device_busy",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::AlreadyOpen => "already_open",
            ErrorKind::SessionNotReady => "session_not_ready",
            ErrorKind::SessionClosed => "session_closed",
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::ConcurrentCaptureUnsupported => "concurrent_capture_unsupported",
            ErrorKind::CaptureTimeout => "capture_timeout",
            ErrorKind::NotCancellable => "not_cancellable",
            ErrorKind::UnsupportedControlValue => "unsupported_control_value",
            ErrorKind::HardwareFault => "hardware_fault",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::InvalidConfig => "invalid_config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
