//! Capture results as delivered to the caller.

use super::{CaptureKind, CaptureRequest, OutputFormat, RequestId};
use crate::device::{CameraDevice, CameraPosition, FlashMode, HardwareOutput, RecordedSegment};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Rewrites results before they are delivered.
pub type ResultHook = Arc<dyn Fn(CaptureResult) -> CaptureResult + Send + Sync>;

/// Region of the frame covered by a video segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSegment {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
}

impl From<RecordedSegment> for VideoSegment {
    fn from(segment: RecordedSegment) -> Self {
        Self {
            uri: segment.uri,
            rect: segment.rect,
        }
    }
}

/// A finished recording, possibly split into segments by suspend/resume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recording {
    pub videos: Vec<VideoSegment>,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// What the capture produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Image {
        format: OutputFormat,
        #[serde(skip)]
        bytes: Vec<u8>,
        byte_len: usize,
        /// BLAKE3 of `bytes`, hex encoded.
        digest: String,
    },
    Recording(Recording),
}

impl Artifact {
    pub fn image(format: OutputFormat, bytes: Vec<u8>) -> Self {
        let digest = blake3::hash(&bytes).to_hex().to_string();
        Artifact::Image {
            format,
            byte_len: bytes.len(),
            bytes,
            digest,
        }
    }

    /// Encoded image bytes, if this is an image.
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Artifact::Image { bytes, .. } => Some(bytes),
            Artifact::Recording(_) => None,
        }
    }

    pub fn recording(&self) -> Option<&Recording> {
        match self {
            Artifact::Recording(r) => Some(r),
            Artifact::Image { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub device_id: String,
    pub position: CameraPosition,
    pub flash: FlashMode,
    /// Caller metadata from the capture options.
    pub extra: Map<String, Value>,
}

/// Outcome of a successful capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub request_id: RequestId,
    pub kind: CaptureKind,
    pub artifact: Artifact,
    pub metadata: CaptureMetadata,
}

impl CaptureResult {
    /// Builds the result for `request` from raw device output.
    pub fn from_output(request: CaptureRequest, device: &CameraDevice, output: HardwareOutput) -> Self {
        let (artifact, resolution) = match output {
            HardwareOutput::Image { bytes, resolution } => {
                (Artifact::image(request.format, bytes), resolution)
            }
            HardwareOutput::Video {
                segments,
                duration,
                resolution,
            } => (
                Artifact::Recording(Recording {
                    videos: segments.into_iter().map(VideoSegment::from).collect(),
                    duration,
                }),
                resolution,
            ),
        };

        Self {
            request_id: request.id,
            kind: request.kind,
            artifact,
            metadata: CaptureMetadata {
                captured_at: Utc::now(),
                width: resolution.width,
                height: resolution.height,
                device_id: device.id().to_string(),
                position: device.position(),
                flash: request.flash,
                extra: request.metadata,
            },
        }
    }
}
