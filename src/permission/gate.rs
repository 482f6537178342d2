//! Authorization gate consulted before any hardware is allocated.

use super::{Capability, PermissionService, PermissionStatus};
use crate::error::CameraError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Checks and acquires capability authorization.
///
/// Statuses are cached for the lifetime of a session; [`reset`](Self::reset)
/// is called at every session start so the platform is asked again.
pub struct PermissionGate {
    service: Arc<dyn PermissionService>,
    cache: Mutex<HashMap<Capability, PermissionStatus>>,
}

impl PermissionGate {
    pub fn new(service: Arc<dyn PermissionService>) -> Self {
        Self {
            service,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current status without prompting.
    pub fn check(&self, capability: Capability) -> PermissionStatus {
        let status = self.service.status(capability);
        self.remember(capability, status);
        status
    }

    /// Resolves the status, prompting only when it is undetermined.
    ///
    /// Denied and Restricted are returned as-is: the user has to be sent to
    /// system settings, the prompt is never shown again.
    pub fn request(&self, capability: Capability) -> PermissionStatus {
        let current = self.check(capability);
        if current != PermissionStatus::NotDetermined {
            if current.is_final_refusal() {
                tracing::debug!(%capability, status = %current, "Not re-prompting refused capability");
            }
            return current;
        }

        tracing::info!(%capability, "Requesting authorization");
        let decided = self.service.prompt(capability);
        self.remember(capability, decided);
        tracing::info!(%capability, status = %decided, "Authorization resolved");
        decided
    }

    /// Requests every capability in order, failing on the first refusal.
    pub fn authorize(&self, capabilities: &[Capability]) -> Result<(), CameraError> {
        for &capability in capabilities {
            let status = self.request(capability);
            if !status.is_authorized() {
                return Err(CameraError::PermissionDenied { capability, status });
            }
        }
        Ok(())
    }

    /// Last status observed for `capability`, if any.
    pub fn cached(&self, capability: Capability) -> Option<PermissionStatus> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&capability)
            .copied()
    }

    /// Forgets cached statuses.
    pub fn reset(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn remember(&self, capability: Capability, status: PermissionStatus) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(capability, status);
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::StaticPermissions;

    #[test]
    fn test_check_never_prompts() {
        let service = Arc::new(StaticPermissions::new());
        let gate = PermissionGate::new(service.clone());

        assert_eq!(gate.check(Capability::Camera), PermissionStatus::NotDetermined);
        assert_eq!(service.prompt_count(), 0);
        assert_eq!(gate.cached(Capability::Camera), Some(PermissionStatus::NotDetermined));
    }

    #[test]
    fn test_request_prompts_once() {
        let service = Arc::new(StaticPermissions::new());
        let gate = PermissionGate::new(service.clone());

        assert_eq!(gate.request(Capability::Camera), PermissionStatus::Authorized);
        assert_eq!(gate.request(Capability::Camera), PermissionStatus::Authorized);
        assert_eq!(service.prompt_count(), 1);
    }

    #[test]
    fn test_denied_is_not_reprompted() {
        let service = Arc::new(
            StaticPermissions::new().with_status(Capability::Camera, PermissionStatus::Denied),
        );
        let gate = PermissionGate::new(service.clone());

        assert_eq!(gate.request(Capability::Camera), PermissionStatus::Denied);
        assert_eq!(service.prompt_count(), 0);
    }

    #[test]
    fn test_authorize_reports_first_refusal() {
        let service = Arc::new(
            StaticPermissions::authorized()
                .with_status(Capability::Microphone, PermissionStatus::Restricted),
        );
        let gate = PermissionGate::new(service);

        let err = gate
            .authorize(&[Capability::Camera, Capability::Microphone])
            .unwrap_err();
        assert!(matches!(
            err,
            CameraError::PermissionDenied {
                capability: Capability::Microphone,
                status: PermissionStatus::Restricted,
            }
        ));
    }

    #[test]
    fn test_reset_clears_cache() {
        let gate = PermissionGate::new(Arc::new(StaticPermissions::authorized()));
        gate.check(Capability::Camera);
        gate.reset();
        assert_eq!(gate.cached(Capability::Camera), None);
    }
}
