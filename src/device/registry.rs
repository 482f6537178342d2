//! Explicit device registry with exclusive leases.

use super::{CameraBackend, CameraDevice, DeviceHandle, HardwareError, HardwareEventSink};
use crate::error::CameraError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

/// Devices known to a backend, and which of them are in use.
///
/// A registry is passed into every module instance that uses it; sharing one
/// registry between instances makes them contend for the same hardware.
pub struct DeviceRegistry {
    backend: Arc<dyn CameraBackend>,
    devices: RwLock<Vec<CameraDevice>>,
    leased: Arc<Mutex<HashSet<String>>>,
}

impl DeviceRegistry {
    /// Creates a registry and enumerates the backend once.
    pub fn new(backend: Arc<dyn CameraBackend>) -> Result<Self, HardwareError> {
        let registry = Self {
            backend,
            devices: RwLock::new(Vec::new()),
            leased: Arc::new(Mutex::new(HashSet::new())),
        };
        registry.refresh()?;
        Ok(registry)
    }

    /// Re-enumerates devices. Returns the number found.
    pub fn refresh(&self) -> Result<usize, HardwareError> {
        let mut found = self.backend.enumerate()?;
        found.sort_by(|a, b| {
            a.position()
                .cmp(&b.position())
                .then_with(|| a.id().cmp(b.id()))
        });
        let count = found.len();

        tracing::info!(backend = self.backend.name(), devices = count, "Enumerated camera devices");
        *self.devices.write().unwrap_or_else(|e| e.into_inner()) = found;
        Ok(count)
    }

    /// All devices, ordered back, front, external, then by id.
    pub fn devices(&self) -> Vec<CameraDevice> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn find(&self, id: &str) -> Option<CameraDevice> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|d| d.id() == id)
            .cloned()
    }

    pub fn is_leased(&self, id: &str) -> bool {
        self.leased
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    /// Takes exclusive hold of a device.
    pub fn acquire(&self, id: &str) -> Result<DeviceLease, CameraError> {
        let device = self
            .find(id)
            .ok_or_else(|| CameraError::DeviceUnavailable(id.to_string()))?;

        let mut leased = self.leased.lock().unwrap_or_else(|e| e.into_inner());
        if !leased.insert(id.to_string()) {
            return Err(CameraError::DeviceBusy(id.to_string()));
        }
        tracing::debug!(device = id, "Device leased");

        Ok(DeviceLease {
            device,
            leased: Arc::clone(&self.leased),
        })
    }

    /// Opens the leased device on the backend.
    pub fn connect(
        &self,
        lease: &DeviceLease,
        sink: HardwareEventSink,
    ) -> Result<Box<dyn DeviceHandle>, HardwareError> {
        self.backend.connect(lease.device(), sink)
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("backend", &self.backend.name())
            .field("devices", &self.devices)
            .finish_non_exhaustive()
    }
}

/// Exclusive hold on a device; released on drop.
#[derive(Debug)]
pub struct DeviceLease {
    device: CameraDevice,
    leased: Arc<Mutex<HashSet<String>>>,
}

impl DeviceLease {
    #[inline]
    pub fn device(&self) -> &CameraDevice {
        &self.device
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.leased
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.device.id());
        tracing::debug!(device = self.device.id(), "Device lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CameraPosition, SimulatedBackend};

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(Arc::new(SimulatedBackend::with_default_devices())).unwrap()
    }

    #[test]
    fn test_devices_ordered_by_position() {
        let positions: Vec<_> = registry().devices().iter().map(|d| d.position()).collect();
        assert_eq!(
            positions,
            vec![CameraPosition::Back, CameraPosition::Front, CameraPosition::External]
        );
    }

    #[test]
    fn test_acquire_is_exclusive() {
        let registry = registry();
        let lease = registry.acquire("back").unwrap();
        assert!(registry.is_leased("back"));
        assert!(matches!(
            registry.acquire("back"),
            Err(CameraError::DeviceBusy(_))
        ));

        drop(lease);
        assert!(!registry.is_leased("back"));
        assert!(registry.acquire("back").is_ok());
    }

    #[test]
    fn test_acquire_unknown_device() {
        assert!(matches!(
            registry().acquire("nope"),
            Err(CameraError::DeviceUnavailable(_))
        ));
    }
}
