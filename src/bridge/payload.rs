//! JSON payloads exchanged with the host runtime.
//!
//! Requests arrive as loosely typed maps and are parsed here; results,
//! events and failures leave as `serde_json` values.

use super::BridgeEvent;
use crate::control::ControlValue;
use crate::device::CameraDevice;
use crate::error::{CameraError, ErrorKind};
use crate::pipeline::CaptureOptions;
use crate::session::{ConfigError, SessionConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured rejection handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeFailure {
    /// Stable code such as `E_DEVICE_BUSY`.
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CameraError> for BridgeFailure {
    fn from(err: &CameraError) -> Self {
        let kind = err.kind();
        Self {
            code: kind.code().to_string(),
            kind,
            message: err.to_string(),
        }
    }
}

impl From<CameraError> for BridgeFailure {
    fn from(err: CameraError) -> Self {
        Self::from(&err)
    }
}

/// Serializes any payload type.
pub fn to_payload<T: Serialize>(value: &T) -> Result<Value, BridgeFailure> {
    serde_json::to_value(value).map_err(|e| BridgeFailure {
        code: ErrorKind::InvalidArgument.code().to_string(),
        kind: ErrorKind::InvalidArgument,
        message: format!("payload not serializable: {e}"),
    })
}

/// Settles an operation the way the host expects: a value to resolve
/// with, or a failure to reject with. Cancellation resolves with `null`.
pub fn settle<T: Serialize>(result: Result<T, CameraError>) -> Result<Value, BridgeFailure> {
    match result {
        Ok(value) => to_payload(&value),
        Err(CameraError::Cancelled(_)) => Ok(Value::Null),
        Err(e) => Err(BridgeFailure::from(e)),
    }
}

/// Event name and body for the host's event emitter.
pub fn event_payload(event: &BridgeEvent) -> Result<(&'static str, Value), BridgeFailure> {
    Ok((event.name(), to_payload(event)?))
}

pub fn devices_payload(devices: &[CameraDevice]) -> Result<Value, BridgeFailure> {
    to_payload(&devices)
}

/// Parses session options, filling omitted keys from `defaults`.
pub fn parse_session_config(
    value: &Value,
    defaults: &SessionConfig,
) -> Result<SessionConfig, CameraError> {
    let parse_error = |msg: String| CameraError::InvalidConfig(ConfigError::ParseError(msg));

    let overrides = match value {
        Value::Null => return Ok(defaults.clone()),
        Value::Object(map) => map,
        other => return Err(parse_error(format!("expected an object, got {other}"))),
    };
    let mut merged = match serde_json::to_value(defaults) {
        Ok(Value::Object(map)) => map,
        Ok(_) => serde_json::Map::new(),
        Err(e) => return Err(parse_error(e.to_string())),
    };
    for (key, v) in overrides {
        merged.insert(key.clone(), v.clone());
    }

    let config: SessionConfig =
        serde_json::from_value(Value::Object(merged)).map_err(|e| parse_error(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

pub fn parse_capture_options(value: &Value) -> Result<CaptureOptions, CameraError> {
    match value {
        Value::Null => Ok(CaptureOptions::default()),
        other => serde_json::from_value(other.clone())
            .map_err(|e| CameraError::invalid_argument(format!("capture options: {e}"))),
    }
}

pub fn parse_control(value: &Value) -> Result<ControlValue, CameraError> {
    serde_json::from_value(value.clone())
        .map_err(|e| CameraError::invalid_argument(format!("control value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlPolicy;
    use crate::device::FlashMode;
    use crate::pipeline::RequestId;
    use serde_json::json;

    #[test]
    fn test_failure_shape() {
        let failure = BridgeFailure::from(CameraError::DeviceBusy("back".into()));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["code"], "E_DEVICE_BUSY");
        assert_eq!(json["kind"], "device_busy");
        assert!(json["message"].as_str().unwrap().contains("back"));
    }

    #[test]
    fn test_cancelled_resolves_null() {
        let settled = settle::<u32>(Err(CameraError::Cancelled(RequestId::new(1))));
        assert_eq!(settled.unwrap(), Value::Null);

        let rejected = settle::<u32>(Err(CameraError::SessionClosed)).unwrap_err();
        assert_eq!(rejected.code, "E_SESSION_CLOSED");
    }

    #[test]
    fn test_session_config_merges_defaults() {
        let defaults = SessionConfig::default().with_policy(ControlPolicy::Permissive);
        let config = parse_session_config(&json!({ "queueDepth": 9, "queue_depth": 2, "flash": "on" }), &defaults)
            .unwrap();
        assert_eq!(config.queue_depth, 2);
        assert_eq!(config.flash, FlashMode::On);
        assert_eq!(config.control_policy, ControlPolicy::Permissive);

        assert_eq!(parse_session_config(&Value::Null, &defaults).unwrap(), defaults);
    }

    #[test]
    fn test_bad_session_config_is_parsing_error() {
        let defaults = SessionConfig::default();
        let err = parse_session_config(&json!("fast"), &defaults).unwrap_err();
        assert_eq!(err.kind().code(), "E_PARSING");

        let err = parse_session_config(&json!({ "queue_depth": 0 }), &defaults).unwrap_err();
        assert_eq!(err.kind().code(), "E_PARSING");
    }

    #[test]
    fn test_capture_options_and_controls() {
        let options = parse_capture_options(&json!({ "flash": "auto", "metadata": { "k": 1 } })).unwrap();
        assert_eq!(options.flash, Some(FlashMode::Auto));
        assert_eq!(options.metadata["k"], 1);

        let err = parse_capture_options(&json!({ "flash": "blinding" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert_eq!(
            parse_control(&json!({ "control": "zoom", "value": 2.0 })).unwrap(),
            ControlValue::Zoom(2.0)
        );
        assert!(parse_control(&json!({ "control": "warp" })).is_err());
    }
}
