//! Validation of control changes against device capabilities.

use super::{ControlKind, ControlPolicy, ControlState, ControlValue, FocusPoint};
use crate::device::{DeviceCapabilities, FlashMode, FocusMode, TorchMode, ValueRange};
use crate::error::CameraError;

/// Checks control values against what the active device declares.
///
/// Validation is pure: it never touches the device. A value that passes is
/// the one the session worker hands to the hardware.
#[derive(Debug, Clone)]
pub struct ControlSurface {
    policy: ControlPolicy,
    capabilities: DeviceCapabilities,
}

impl ControlSurface {
    pub fn new(policy: ControlPolicy, capabilities: DeviceCapabilities) -> Self {
        Self {
            policy,
            capabilities,
        }
    }

    #[inline]
    pub fn policy(&self) -> ControlPolicy {
        self.policy
    }

    /// Returns the value to apply, adjusted under the permissive policy.
    pub fn validate(&self, value: ControlValue) -> Result<ControlValue, CameraError> {
        match value {
            ControlValue::Zoom(z) => self
                .numeric(ControlKind::Zoom, z, self.capabilities.zoom)
                .map(ControlValue::Zoom),
            ControlValue::ExposureBias(b) => self
                .numeric(ControlKind::ExposureBias, b, self.capabilities.exposure_bias)
                .map(ControlValue::ExposureBias),
            ControlValue::Flash(mode) => self.flash(mode).map(ControlValue::Flash),
            ControlValue::Torch(mode) => self.torch(mode).map(ControlValue::Torch),
            ControlValue::Focus { mode, point } => {
                let mode = self.focus_mode(mode)?;
                let point = self.focus_point(point)?;
                Ok(ControlValue::Focus { mode, point })
            }
        }
    }

    /// Flash mode to use for a capture.
    pub fn resolve_flash(&self, requested: FlashMode) -> Result<FlashMode, CameraError> {
        self.flash(requested)
    }

    /// Initial control state for a session, validated like any other change.
    pub fn initial_state(
        &self,
        flash: FlashMode,
        torch: TorchMode,
    ) -> Result<ControlState, CameraError> {
        let base = ControlState {
            zoom: self.capabilities.zoom.clamp(1.0),
            focus: self.default_focus(),
            exposure_bias: self.capabilities.exposure_bias.clamp(0.0),
            ..ControlState::default()
        };
        let base = base.with(&self.validate(ControlValue::Flash(flash))?);
        Ok(base.with(&self.validate(ControlValue::Torch(torch))?))
    }

    fn numeric(&self, control: ControlKind, value: f64, range: ValueRange) -> Result<f64, CameraError> {
        if !value.is_finite() {
            return Err(CameraError::unsupported(control, format!("{value} is not a finite number")));
        }
        if range.contains(value) {
            return Ok(value);
        }
        match self.policy {
            ControlPolicy::Strict => Err(CameraError::unsupported(
                control,
                format!("{value} outside [{}, {}]", range.min, range.max),
            )),
            ControlPolicy::Permissive => {
                let clamped = range.clamp(value);
                tracing::debug!(control = %control, requested = value, applied = clamped, "Clamped control value");
                Ok(clamped)
            }
        }
    }

    fn flash(&self, mode: FlashMode) -> Result<FlashMode, CameraError> {
        let supported = &self.capabilities.flash_modes;
        if supported.contains(&mode) {
            return Ok(mode);
        }
        match self.policy {
            ControlPolicy::Permissive if supported.contains(&FlashMode::Off) => Ok(FlashMode::Off),
            _ => Err(CameraError::unsupported(
                ControlKind::Flash,
                format!("{mode:?} not supported by device"),
            )),
        }
    }

    fn torch(&self, mode: TorchMode) -> Result<TorchMode, CameraError> {
        let supported = &self.capabilities.torch_modes;
        if supported.contains(&mode) {
            return Ok(mode);
        }
        match self.policy {
            ControlPolicy::Permissive if supported.contains(&TorchMode::Off) => Ok(TorchMode::Off),
            _ => Err(CameraError::unsupported(
                ControlKind::Torch,
                format!("{mode:?} not supported by device"),
            )),
        }
    }

    fn focus_mode(&self, mode: FocusMode) -> Result<FocusMode, CameraError> {
        if self.capabilities.focus_modes.contains(&mode) {
            return Ok(mode);
        }
        match self.policy {
            // Focus has no off state; the device default stands in for it
            ControlPolicy::Permissive if !self.capabilities.focus_modes.is_empty() => {
                Ok(self.default_focus())
            }
            _ => Err(CameraError::unsupported(
                ControlKind::Focus,
                format!("{mode:?} not supported by device"),
            )),
        }
    }

    fn focus_point(&self, point: Option<FocusPoint>) -> Result<Option<FocusPoint>, CameraError> {
        let Some(point) = point else {
            return Ok(None);
        };
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(CameraError::unsupported(
                ControlKind::Focus,
                "focus point is not finite",
            ));
        }

        match self.policy {
            ControlPolicy::Strict if !self.capabilities.focus_point => Err(CameraError::unsupported(
                ControlKind::Focus,
                "device does not support a focus point",
            )),
            ControlPolicy::Strict if !point.is_normalized() => Err(CameraError::unsupported(
                ControlKind::Focus,
                format!("focus point ({}, {}) outside [0, 1]", point.x, point.y),
            )),
            ControlPolicy::Strict => Ok(Some(point)),
            ControlPolicy::Permissive if !self.capabilities.focus_point => Ok(None),
            ControlPolicy::Permissive => Ok(Some(point.clamped())),
        }
    }

    fn default_focus(&self) -> FocusMode {
        let modes = &self.capabilities.focus_modes;
        if modes.contains(&FocusMode::Continuous) {
            FocusMode::Continuous
        } else {
            modes.first().copied().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn caps() -> DeviceCapabilities {
        DeviceCapabilities {
            flash_modes: vec![FlashMode::Off, FlashMode::On],
            torch_modes: vec![TorchMode::Off],
            focus_modes: vec![FocusMode::Auto, FocusMode::Continuous],
            zoom: ValueRange::new(1.0, 4.0),
            exposure_bias: ValueRange::new(-2.0, 2.0),
            focus_point: true,
            ..Default::default()
        }
    }

    fn strict() -> ControlSurface {
        ControlSurface::new(ControlPolicy::Strict, caps())
    }

    fn permissive() -> ControlSurface {
        ControlSurface::new(ControlPolicy::Permissive, caps())
    }

    #[test]
    fn test_strict_rejects_out_of_range_zoom() {
        let err = strict().validate(ControlValue::Zoom(10.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedControlValue);
        assert_eq!(
            strict().validate(ControlValue::Zoom(2.0)).unwrap(),
            ControlValue::Zoom(2.0)
        );
    }

    #[test]
    fn test_permissive_clamps_zoom() {
        assert_eq!(
            permissive().validate(ControlValue::Zoom(10.0)).unwrap(),
            ControlValue::Zoom(4.0)
        );
        assert_eq!(
            permissive().validate(ControlValue::ExposureBias(-5.0)).unwrap(),
            ControlValue::ExposureBias(-2.0)
        );
    }

    #[test]
    fn test_nan_rejected_under_both_policies() {
        assert!(strict().validate(ControlValue::Zoom(f64::NAN)).is_err());
        assert!(permissive().validate(ControlValue::Zoom(f64::NAN)).is_err());
    }

    #[test]
    fn test_mode_fallback() {
        assert!(strict().validate(ControlValue::Flash(FlashMode::Auto)).is_err());
        assert_eq!(
            permissive().validate(ControlValue::Flash(FlashMode::Auto)).unwrap(),
            ControlValue::Flash(FlashMode::Off)
        );
        assert_eq!(
            permissive().validate(ControlValue::Torch(TorchMode::On)).unwrap(),
            ControlValue::Torch(TorchMode::Off)
        );
    }

    #[test]
    fn test_permissive_without_off_still_rejects() {
        let surface = ControlSurface::new(
            ControlPolicy::Permissive,
            DeviceCapabilities {
                flash_modes: vec![FlashMode::Auto],
                ..caps()
            },
        );
        assert!(surface.validate(ControlValue::Flash(FlashMode::On)).is_err());
    }

    #[test]
    fn test_focus_point_handling() {
        let value = ControlValue::Focus {
            mode: FocusMode::Auto,
            point: Some(FocusPoint::new(1.5, 0.5)),
        };
        assert!(strict().validate(value).is_err());
        assert_eq!(
            permissive().validate(value).unwrap(),
            ControlValue::Focus {
                mode: FocusMode::Auto,
                point: Some(FocusPoint::new(1.0, 0.5)),
            }
        );

        let no_point = ControlSurface::new(
            ControlPolicy::Permissive,
            DeviceCapabilities {
                focus_point: false,
                ..caps()
            },
        );
        assert_eq!(
            no_point.validate(value).unwrap(),
            ControlValue::Focus {
                mode: FocusMode::Auto,
                point: None,
            }
        );
    }

    #[test]
    fn test_initial_state_uses_device_defaults() {
        let state = strict().initial_state(FlashMode::On, TorchMode::Off).unwrap();
        assert_eq!(state.flash, FlashMode::On);
        assert_eq!(state.focus, FocusMode::Continuous);
        assert_eq!(state.zoom, 1.0);

        assert!(strict().initial_state(FlashMode::Auto, TorchMode::Off).is_err());
    }

    proptest! {
        #[test]
        fn prop_permissive_result_within_range(z in -100.0f64..100.0) {
            match permissive().validate(ControlValue::Zoom(z)).unwrap() {
                ControlValue::Zoom(applied) => {
                    prop_assert!(caps().zoom.contains(applied));
                    if caps().zoom.contains(z) {
                        prop_assert_eq!(applied, z);
                    }
                }
                other => prop_assert!(false, "unexpected value {:?}", other),
            }
        }

        #[test]
        fn prop_strict_accepts_exactly_the_range(b in -10.0f64..10.0) {
            let accepted = strict().validate(ControlValue::ExposureBias(b)).is_ok();
            prop_assert_eq!(accepted, caps().exposure_bias.contains(b));
        }
    }
}
