//! Camera and microphone authorization.
//!
//! The platform authorization service is an external collaborator modelled
//! by [`PermissionService`]. The [`PermissionGate`] sits in front of it and
//! is consulted by every session open before any hardware is allocated.

mod gate;
mod service;

pub use gate::PermissionGate;
pub use service::{PermissionService, StaticPermissions};

use serde::{Deserialize, Serialize};

/// A capability guarded by user authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Camera,
    Microphone,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Camera => f.write_str("camera"),
            Capability::Microphone => f.write_str("microphone"),
        }
    }
}

/// Authorization status for a single capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// The user has not been asked yet.
    NotDetermined,
    /// The user refused access.
    Denied,
    /// Access granted.
    Authorized,
    /// Access blocked by policy (parental controls, MDM, ...).
    Restricted,
}

impl PermissionStatus {
    #[inline]
    pub fn is_authorized(self) -> bool {
        self == PermissionStatus::Authorized
    }

    /// Denied and Restricted can only be changed from system settings.
    #[inline]
    pub fn is_final_refusal(self) -> bool {
        matches!(self, PermissionStatus::Denied | PermissionStatus::Restricted)
    }
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PermissionStatus::NotDetermined => "not determined",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Authorized => "authorized",
            PermissionStatus::Restricted => "restricted",
        };
        f.write_str(s)
    }
}
