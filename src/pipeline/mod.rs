//! Capture pipeline.
//!
//! Tracks every capture request of a session from submission until it
//! resolves. Requests wait in a bounded FIFO ([`CaptureQueue`]) until the
//! session worker dispatches them to the device. The pipeline only keeps
//! book: resolving completers, emitting events and touching hardware are
//! left to the session, which drives it under its lock.

mod queue;
mod request;
mod result;

pub use queue::CaptureQueue;
pub use request::{CaptureKind, CaptureOptions, CaptureRequest, OutputFormat, RequestId};
pub use result::{Artifact, CaptureMetadata, CaptureResult, Rect, Recording, ResultHook, VideoSegment};

use crate::bridge::{pending, Completer, Pending};
use crate::device::HardwareCapture;
use crate::error::CameraError;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// A request together with the handle its caller waits on.
#[derive(Debug)]
pub(crate) struct Entry {
    pub request: CaptureRequest,
    pub completer: Completer<CaptureResult>,
    deadline: Option<Instant>,
}

impl Entry {
    fn new(request: CaptureRequest, completer: Completer<CaptureResult>) -> Self {
        Self {
            request,
            completer,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoPhase {
    /// Submitted to the device, no `Started` seen yet.
    Starting,
    Recording,
    /// Stop requested, waiting for the device to hand over the recording.
    Finishing,
}

#[derive(Debug)]
struct ActiveVideo {
    entry: Entry,
    phase: VideoPhase,
}

/// What stopping a recording requires from the worker.
#[derive(Debug)]
pub(crate) enum StopOutcome {
    /// Ask the device to finish the recording.
    Finish,
    /// The video never reached the device; it was removed from the queue.
    Dequeued(Entry),
    /// A stop is already under way.
    AlreadyFinishing,
}

/// Request bookkeeping for one session.
#[derive(Debug)]
pub(crate) struct CapturePipeline {
    depth: usize,
    multi_stream: bool,
    timeout: Duration,
    queue: CaptureQueue<Entry>,
    /// Dispatched photos, in dispatch order.
    photos: BTreeMap<RequestId, Entry>,
    video: Option<ActiveVideo>,
    highest_seen: Option<RequestId>,
}

impl CapturePipeline {
    pub fn new(depth: usize, multi_stream: bool, timeout: Duration) -> Self {
        Self {
            depth,
            multi_stream,
            timeout,
            queue: CaptureQueue::new(depth),
            photos: BTreeMap::new(),
            video: None,
            highest_seen: None,
        }
    }

    /// Queued requests plus dispatched photos.
    pub fn outstanding(&self) -> usize {
        self.queue.len() + self.photos.len()
    }

    fn video_pending(&self) -> bool {
        self.video.is_some()
            || self
                .queue
                .iter()
                .any(|e| e.request.kind == CaptureKind::Video)
    }

    /// Enqueues a request; the newest submission is the one refused.
    pub fn submit(&mut self, request: CaptureRequest) -> Result<Pending<CaptureResult>, CameraError> {
        match request.kind {
            CaptureKind::Video if self.video_pending() => {
                return Err(CameraError::ConcurrentCaptureUnsupported)
            }
            CaptureKind::Photo if self.video_pending() && !self.multi_stream => {
                return Err(CameraError::ConcurrentCaptureUnsupported)
            }
            _ => {}
        }
        if self.outstanding() >= self.depth {
            return Err(CameraError::QueueFull(self.depth));
        }

        let id = request.id;
        let (pending, completer) = pending();
        self.queue
            .push(Entry::new(request, completer))
            .map_err(|_| CameraError::QueueFull(self.depth))?;
        self.highest_seen = self.highest_seen.max(Some(id));
        Ok(pending)
    }

    /// Next queued request the device may take, moved to the in-flight set.
    pub fn next_dispatch(&mut self, now: Instant) -> Option<HardwareCapture> {
        let front = self.queue.front()?;
        let allowed = match front.request.kind {
            CaptureKind::Photo => self.video.is_none() || self.multi_stream,
            CaptureKind::Video => {
                self.video.is_none() && (self.photos.is_empty() || self.multi_stream)
            }
        };
        if !allowed {
            return None;
        }

        let mut entry = self.queue.pop_front()?;
        let r = &entry.request;
        let capture = HardwareCapture {
            id: r.id,
            kind: r.kind,
            resolution: r.resolution,
            format: r.format,
            flash: r.flash,
        };

        match capture.kind {
            CaptureKind::Photo => {
                entry.deadline = Some(now + self.timeout);
                self.photos.insert(capture.id, entry);
            }
            // Bounded until the device reports the recording started; after
            // that it runs until stopped, and the deadline restarts with the stop
            CaptureKind::Video => {
                entry.deadline = Some(now + self.timeout);
                self.video = Some(ActiveVideo {
                    entry,
                    phase: VideoPhase::Starting,
                });
            }
        }
        Some(capture)
    }

    /// Records that the device began working on `id`.
    pub fn started(&mut self, id: RequestId) -> bool {
        match self.video.as_mut() {
            Some(v) if v.entry.request.id == id && v.phase == VideoPhase::Starting => {
                v.phase = VideoPhase::Recording;
                v.entry.deadline = None;
                true
            }
            _ => self.photos.contains_key(&id),
        }
    }

    /// Whether `id` is dispatched and not yet resolved.
    pub fn is_in_flight(&self, id: RequestId) -> bool {
        self.photos.contains_key(&id)
            || self
                .video
                .as_ref()
                .is_some_and(|v| v.entry.request.id == id)
    }

    /// Removes a queued request. Dispatched requests cannot be cancelled.
    pub fn cancel(&mut self, id: RequestId) -> Result<Entry, CameraError> {
        if let Some(entry) = self.queue.remove_where(|e| e.request.id == id) {
            return Ok(entry);
        }
        if self.is_in_flight(id) || self.highest_seen.is_some_and(|h| id <= h) {
            return Err(CameraError::NotCancellable(id));
        }
        Err(CameraError::invalid_argument(format!("unknown capture request {id}")))
    }

    /// Starts stopping the recording `id`.
    pub fn stop_video(&mut self, id: RequestId, now: Instant) -> Result<StopOutcome, CameraError> {
        if let Some(v) = self.video.as_mut().filter(|v| v.entry.request.id == id) {
            if v.phase == VideoPhase::Finishing {
                return Ok(StopOutcome::AlreadyFinishing);
            }
            v.phase = VideoPhase::Finishing;
            v.entry.deadline = Some(now + self.timeout);
            return Ok(StopOutcome::Finish);
        }
        self.queue
            .remove_where(|e| e.request.id == id && e.request.kind == CaptureKind::Video)
            .map(StopOutcome::Dequeued)
            .ok_or_else(|| CameraError::invalid_argument(format!("{id} is not an active recording")))
    }

    /// Takes a dispatched request for resolution.
    ///
    /// `None` means the request already resolved; late or duplicate
    /// notifications land here.
    pub fn take(&mut self, id: RequestId) -> Option<Entry> {
        if let Some(entry) = self.photos.remove(&id) {
            return Some(entry);
        }
        match self.video.take() {
            Some(v) if v.entry.request.id == id => Some(v.entry),
            other => {
                self.video = other;
                None
            }
        }
    }

    /// Dispatched requests whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<Entry> {
        let overdue: Vec<RequestId> = self
            .photos
            .iter()
            .filter(|(_, e)| e.deadline.is_some_and(|d| d <= now))
            .map(|(id, _)| *id)
            .collect();
        let mut expired: Vec<Entry> = overdue
            .into_iter()
            .filter_map(|id| self.photos.remove(&id))
            .collect();

        let video_overdue = self
            .video
            .as_ref()
            .and_then(|v| v.entry.deadline)
            .is_some_and(|d| d <= now);
        if video_overdue {
            expired.extend(self.video.take().map(|v| v.entry));
        }
        expired
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Empties the pipeline: `(dispatched, queued)`, each in order.
    pub fn drain(&mut self) -> (Vec<Entry>, Vec<Entry>) {
        let mut dispatched: Vec<Entry> = std::mem::take(&mut self.photos).into_values().collect();
        dispatched.extend(self.video.take().map(|v| v.entry));
        let queued = self.queue.drain().collect();
        (dispatched, queued)
    }
}
