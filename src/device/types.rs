//! Camera device description and declared capabilities.

use serde::{Deserialize, Serialize};

/// Where the camera sits relative to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    Back,
    Front,
    External,
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which stream resolution a session should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPreference {
    Lowest,
    Medium,
    #[default]
    Highest,
    /// Closest supported resolution by pixel count.
    Closest(Resolution),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorchMode {
    #[default]
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    Auto,
    #[default]
    Continuous,
    Manual,
    Locked,
}

/// Inclusive numeric range declared by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Nearest value inside the range.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

/// Everything a device declares it can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Supported stream resolutions, ascending by pixel count.
    pub resolutions: Vec<Resolution>,
    pub flash_modes: Vec<FlashMode>,
    pub torch_modes: Vec<TorchMode>,
    pub focus_modes: Vec<FocusMode>,
    pub zoom: ValueRange,
    pub exposure_bias: ValueRange,
    /// Whether a focus point of interest can be set.
    pub focus_point: bool,
    /// Whether stills can be taken while a video is recording.
    pub multi_stream: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            resolutions: vec![
                Resolution::new(640, 480),
                Resolution::new(1280, 720),
                Resolution::new(1920, 1080),
            ],
            flash_modes: vec![FlashMode::Off],
            torch_modes: vec![TorchMode::Off],
            focus_modes: vec![FocusMode::Continuous],
            zoom: ValueRange::new(1.0, 1.0),
            exposure_bias: ValueRange::new(0.0, 0.0),
            focus_point: false,
            multi_stream: false,
        }
    }
}

/// A physical camera, immutable once enumerated.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDevice {
    id: String,
    name: String,
    position: CameraPosition,
    capabilities: DeviceCapabilities,
}

impl CameraDevice {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        position: CameraPosition,
        mut capabilities: DeviceCapabilities,
    ) -> Self {
        capabilities.resolutions.sort_by_key(Resolution::pixel_count);
        capabilities.resolutions.dedup();
        Self {
            id: id.into(),
            name: name.into(),
            position,
            capabilities,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn position(&self) -> CameraPosition {
        self.position
    }

    #[inline]
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    #[inline]
    pub fn supports_resolution(&self, resolution: Resolution) -> bool {
        self.capabilities.resolutions.contains(&resolution)
    }

    /// Picks the supported resolution matching `preference`.
    ///
    /// Returns `None` only when the device declares no resolutions at all.
    pub fn select_resolution(&self, preference: ResolutionPreference) -> Option<Resolution> {
        let all = &self.capabilities.resolutions;
        match preference {
            ResolutionPreference::Lowest => all.first().copied(),
            ResolutionPreference::Highest => all.last().copied(),
            ResolutionPreference::Medium => all.get(all.len() / 2).copied(),
            ResolutionPreference::Closest(target) => all
                .iter()
                .min_by_key(|r| r.pixel_count().abs_diff(target.pixel_count()))
                .copied(),
        }
    }
}

impl std::fmt::Debug for CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraDevice")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("resolutions", &self.capabilities.resolutions.len())
            .finish_non_exhaustive()
    }
}
