//! Platform authorization service abstraction.

use super::{Capability, PermissionStatus};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// Trait for platform permission services.
///
/// Implementations wrap whatever the host platform offers for querying and
/// prompting camera/microphone access.
pub trait PermissionService: Send + Sync {
    /// Returns the current status without prompting the user.
    fn status(&self, capability: Capability) -> PermissionStatus;

    /// Shows the authorization prompt and blocks until the user decides.
    fn prompt(&self, capability: Capability) -> PermissionStatus;
}

/// Permission service with scripted answers.
///
/// Used by tests and the demo CLI. Statuses start as configured; prompting a
/// `NotDetermined` capability records the scripted decision.
#[derive(Debug)]
pub struct StaticPermissions {
    statuses: Mutex<HashMap<Capability, PermissionStatus>>,
    decisions: HashMap<Capability, PermissionStatus>,
    prompts: AtomicUsize,
}

impl StaticPermissions {
    /// Every capability undetermined; prompts grant access.
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            decisions: HashMap::new(),
            prompts: AtomicUsize::new(0),
        }
    }

    /// Every capability already authorized.
    pub fn authorized() -> Self {
        Self::new()
            .with_status(Capability::Camera, PermissionStatus::Authorized)
            .with_status(Capability::Microphone, PermissionStatus::Authorized)
    }

    pub fn with_status(self, capability: Capability, status: PermissionStatus) -> Self {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(capability, status);
        self
    }

    /// Sets what the "user" answers when prompted for `capability`.
    pub fn with_decision(mut self, capability: Capability, decision: PermissionStatus) -> Self {
        self.decisions.insert(capability, decision);
        self
    }

    /// Number of prompts shown so far.
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl Default for StaticPermissions {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionService for StaticPermissions {
    fn status(&self, capability: Capability) -> PermissionStatus {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&capability)
            .copied()
            .unwrap_or(PermissionStatus::NotDetermined)
    }

    fn prompt(&self, capability: Capability) -> PermissionStatus {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let decision = self
            .decisions
            .get(&capability)
            .copied()
            .unwrap_or(PermissionStatus::Authorized);
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(capability, decision);
        decision
    }
}
