//! Capture requests.

use crate::device::{FlashMode, Resolution};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a capture request, unique within a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    Photo,
    Video,
}

impl CaptureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureKind::Photo => "photo",
            CaptureKind::Video => "video",
        }
    }

    /// Output format used when the caller does not name one.
    pub fn default_format(self) -> OutputFormat {
        match self {
            CaptureKind::Photo => OutputFormat::Jpeg,
            CaptureKind::Video => OutputFormat::Mp4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Jpeg,
    Heic,
    Raw,
    Mp4,
    Mov,
}

impl OutputFormat {
    /// Whether the format can hold a `kind` capture.
    pub fn suits(self, kind: CaptureKind) -> bool {
        match kind {
            CaptureKind::Photo => matches!(self, OutputFormat::Jpeg | OutputFormat::Heic | OutputFormat::Raw),
            CaptureKind::Video => matches!(self, OutputFormat::Mp4 | OutputFormat::Mov),
        }
    }
}

/// Per-capture options supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Defaults to the session's stream resolution.
    pub resolution: Option<Resolution>,
    pub format: Option<OutputFormat>,
    /// Defaults to the session's flash mode.
    pub flash: Option<FlashMode>,
    /// Opaque caller data, returned untouched with the result.
    pub metadata: Map<String, Value>,
}

impl CaptureOptions {
    pub fn with_flash(mut self, flash: FlashMode) -> Self {
        self.flash = Some(flash);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A validated capture intent, owned by the pipeline until it resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub id: RequestId,
    pub kind: CaptureKind,
    pub resolution: Resolution,
    pub format: OutputFormat,
    pub flash: FlashMode,
    pub metadata: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::new(12).to_string(), "req-12");
        assert_eq!(serde_json::to_string(&RequestId::new(12)).unwrap(), "12");
    }

    #[test]
    fn test_format_suits_kind() {
        assert!(OutputFormat::Heic.suits(CaptureKind::Photo));
        assert!(!OutputFormat::Mp4.suits(CaptureKind::Photo));
        assert!(CaptureKind::Video.default_format().suits(CaptureKind::Video));
    }

    #[test]
    fn test_options_from_json() {
        let options: CaptureOptions = serde_json::from_value(serde_json::json!({
            "flash": "on",
            "resolution": { "width": 1280, "height": 720 },
            "metadata": { "tag": "receipt" }
        }))
        .unwrap();
        assert_eq!(options.flash, Some(FlashMode::On));
        assert_eq!(options.resolution, Some(Resolution::new(1280, 720)));
        assert_eq!(options.format, None);
        assert_eq!(options.metadata["tag"], "receipt");
    }
}
