//! Runtime camera controls.
//!
//! Zoom, focus, flash, torch and exposure bias are modelled individually as
//! [`ControlValue`]s. A [`ControlSurface`] checks each value against the
//! active device under the session's [`ControlPolicy`]; the resulting intent
//! is applied by the session worker and committed to the session's
//! [`ControlState`] only once the device accepted it.

mod state;
mod surface;

pub use state::{ControlKind, ControlPolicy, ControlState, ControlValue, FocusPoint};
pub use surface::ControlSurface;
