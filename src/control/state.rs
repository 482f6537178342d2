//! Control values and the per-session control snapshot.

use crate::device::{FlashMode, FocusMode, TorchMode};
use serde::{Deserialize, Serialize};

/// Normalized point of interest, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusPoint {
    pub x: f64,
    pub y: f64,
}

impl FocusPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    #[inline]
    pub fn clamped(&self) -> Self {
        Self::new(self.x.clamp(0.0, 1.0), self.y.clamp(0.0, 1.0))
    }
}

/// Current control settings of a session.
///
/// Only replaced after the device accepted the new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub zoom: f64,
    pub focus: FocusMode,
    pub focus_point: Option<FocusPoint>,
    pub flash: FlashMode,
    pub torch: TorchMode,
    pub exposure_bias: f64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            focus: FocusMode::Continuous,
            focus_point: None,
            flash: FlashMode::Off,
            torch: TorchMode::Off,
            exposure_bias: 0.0,
        }
    }
}

impl ControlState {
    /// Copy of this state with `value` applied.
    pub fn with(&self, value: &ControlValue) -> Self {
        let mut next = self.clone();
        match *value {
            ControlValue::Zoom(z) => next.zoom = z,
            ControlValue::Focus { mode, point } => {
                next.focus = mode;
                next.focus_point = point;
            }
            ControlValue::Flash(mode) => next.flash = mode,
            ControlValue::Torch(mode) => next.torch = mode,
            ControlValue::ExposureBias(bias) => next.exposure_bias = bias,
        }
        next
    }
}

/// Which control a value addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Zoom,
    Focus,
    Flash,
    Torch,
    ExposureBias,
}

impl ControlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlKind::Zoom => "zoom",
            ControlKind::Focus => "focus",
            ControlKind::Flash => "flash",
            ControlKind::Torch => "torch",
            ControlKind::ExposureBias => "exposure_bias",
        }
    }
}

impl std::fmt::Display for ControlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested change to one control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "control", content = "value", rename_all = "snake_case")]
pub enum ControlValue {
    Zoom(f64),
    Focus {
        mode: FocusMode,
        #[serde(default)]
        point: Option<FocusPoint>,
    },
    Flash(FlashMode),
    Torch(TorchMode),
    ExposureBias(f64),
}

impl ControlValue {
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlValue::Zoom(_) => ControlKind::Zoom,
            ControlValue::Focus { .. } => ControlKind::Focus,
            ControlValue::Flash(_) => ControlKind::Flash,
            ControlValue::Torch(_) => ControlKind::Torch,
            ControlValue::ExposureBias(_) => ControlKind::ExposureBias,
        }
    }
}

/// How out-of-range control values are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPolicy {
    /// Reject with `UnsupportedControlValue`.
    #[default]
    Strict,
    /// Clamp numbers to the nearest bound; fall back to `Off` for modes.
    Permissive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_replaces_single_control() {
        let state = ControlState::default();
        let next = state.with(&ControlValue::Zoom(3.0));
        assert_eq!(next.zoom, 3.0);
        assert_eq!(next.flash, state.flash);

        let next = next.with(&ControlValue::Focus {
            mode: FocusMode::Locked,
            point: Some(FocusPoint::new(0.2, 0.8)),
        });
        assert_eq!(next.zoom, 3.0);
        assert_eq!(next.focus, FocusMode::Locked);
        assert_eq!(next.focus_point, Some(FocusPoint::new(0.2, 0.8)));
    }

    #[test]
    fn test_focus_point_normalization() {
        assert!(FocusPoint::new(0.0, 1.0).is_normalized());
        assert!(!FocusPoint::new(1.2, 0.5).is_normalized());
        assert_eq!(FocusPoint::new(1.2, -0.5).clamped(), FocusPoint::new(1.0, 0.0));
    }

    #[test]
    fn test_control_value_json_shape() {
        let value: ControlValue =
            serde_json::from_str(r#"{"control":"flash","value":"auto"}"#).unwrap();
        assert_eq!(value, ControlValue::Flash(FlashMode::Auto));
        assert_eq!(value.kind(), ControlKind::Flash);

        let focus: ControlValue =
            serde_json::from_str(r#"{"control":"focus","value":{"mode":"auto"}}"#).unwrap();
        assert_eq!(
            focus,
            ControlValue::Focus {
                mode: FocusMode::Auto,
                point: None
            }
        );

        let json = serde_json::to_value(ControlValue::Zoom(2.5)).unwrap();
        assert_eq!(json, serde_json::json!({"control": "zoom", "value": 2.5}));
    }
}
