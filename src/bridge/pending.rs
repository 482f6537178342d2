//! One-shot handles for operations that resolve later.

use crate::error::CameraError;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::time::Duration;

/// Creates a connected pending handle and its completer.
pub(crate) fn pending<T>() -> (Pending<T>, Completer<T>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (
        Pending {
            rx,
            held: None,
            done: false,
        },
        Completer { tx },
    )
}

/// Result of an operation that completes on another thread.
///
/// Resolves exactly once. If the producing side goes away without
/// resolving, the handle yields [`CameraError::SessionClosed`].
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<Result<T, CameraError>>,
    /// Result received by `is_resolved` but not yet handed out.
    held: Option<Result<T, CameraError>>,
    done: bool,
}

impl<T> Pending<T> {
    /// A handle that is already resolved.
    pub fn ready(result: Result<T, CameraError>) -> Self {
        let (pending, completer) = pending();
        completer.complete(result);
        pending
    }

    /// Blocks until the operation resolves.
    pub fn wait(self) -> Result<T, CameraError> {
        match self.held {
            Some(result) => result,
            None => self.rx.recv().unwrap_or(Err(CameraError::SessionClosed)),
        }
    }

    /// Whether the result is available, without taking it.
    pub fn is_resolved(&mut self) -> bool {
        if self.done || self.held.is_some() {
            return true;
        }
        self.held = match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(CameraError::SessionClosed)),
        };
        self.held.is_some()
    }

    /// Waits up to `timeout`. Returns `None` while unresolved, and after the
    /// result has already been taken.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<T, CameraError>> {
        if self.done {
            return None;
        }
        if let Some(result) = self.held.take() {
            self.done = true;
            return Some(result);
        }
        let result = match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Err(CameraError::SessionClosed),
        };
        self.done = true;
        Some(result)
    }

    /// Non-blocking variant of [`wait_timeout`](Self::wait_timeout).
    pub fn try_wait(&mut self) -> Option<Result<T, CameraError>> {
        if self.done {
            return None;
        }
        if let Some(result) = self.held.take() {
            self.done = true;
            return Some(result);
        }
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(CameraError::SessionClosed),
        };
        self.done = true;
        Some(result)
    }
}

/// Producer half of a [`Pending`]. Consumed by `complete`.
#[derive(Debug)]
pub(crate) struct Completer<T> {
    tx: SyncSender<Result<T, CameraError>>,
}

impl<T> Completer<T> {
    pub fn complete(self, result: Result<T, CameraError>) {
        // Capacity 1 and a single send; fails only if the caller dropped the handle
        let _ = self.tx.try_send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_resolves_across_threads() {
        let (pending, completer) = pending::<u32>();
        thread::spawn(move || completer.complete(Ok(7)));
        assert_eq!(pending.wait().unwrap(), 7);
    }

    #[test]
    fn test_dropped_completer_means_closed() {
        let (mut pending, completer) = pending::<u32>();
        assert!(pending.try_wait().is_none());
        drop(completer);
        assert!(matches!(
            pending.try_wait(),
            Some(Err(CameraError::SessionClosed))
        ));
        assert!(pending.try_wait().is_none());
    }

    #[test]
    fn test_ready_and_timeout() {
        let mut pending = Pending::ready(Ok("done"));
        assert_eq!(pending.wait_timeout(Duration::from_millis(1)).unwrap().unwrap(), "done");

        let (mut pending, _completer) = super::pending::<u8>();
        assert!(pending.wait_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_is_resolved_keeps_result() {
        let (mut pending, completer) = pending::<u32>();
        assert!(!pending.is_resolved());
        completer.complete(Ok(3));
        assert!(pending.is_resolved());
        assert!(pending.is_resolved());
        assert_eq!(pending.try_wait().unwrap().unwrap(), 3);
        assert!(pending.try_wait().is_none());

        let mut held = Pending::ready(Ok(9u32));
        assert!(held.is_resolved());
        assert_eq!(held.wait().unwrap(), 9);
    }
}
