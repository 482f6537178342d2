//! Session lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been opened yet.
    #[default]
    Idle,
    /// Waiting for authorization and for the device to come up.
    Configuring,
    Running,
    Suspended,
    Closed,
    /// The device faulted; only `close` is accepted.
    Failed,
}

/// Inputs driving the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Open,
    DeviceReady,
    Suspend,
    Resume,
    Close,
    /// Open rejected before any hardware was allocated.
    Abort,
    HardwareFault,
}

impl SessionState {
    /// Next state for `transition`, or `None` when it is not allowed.
    pub fn apply(self, transition: Transition) -> Option<SessionState> {
        use SessionState::*;
        use Transition as T;

        match (self, transition) {
            (Idle | Closed, T::Open) => Some(Configuring),
            (Configuring, T::DeviceReady) => Some(Running),
            (Configuring, T::Abort) => Some(Idle),
            (Running, T::Suspend) => Some(Suspended),
            (Suspended, T::Resume) => Some(Running),
            (Configuring | Running | Suspended | Failed, T::Close) => Some(Closed),
            // Idle and closed sessions hold no hardware that could fault
            (Configuring | Running | Suspended, T::HardwareFault) => Some(Failed),
            _ => None,
        }
    }

    /// Whether `open` is accepted in this state.
    #[inline]
    pub fn accepts_open(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Closed)
    }

    /// Whether the session holds (or is acquiring) hardware.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Configuring | SessionState::Running | SessionState::Suspended
        )
    }

    /// Numeric encoding for gauges.
    pub fn as_gauge(self) -> i64 {
        match self {
            SessionState::Idle => 0,
            SessionState::Configuring => 1,
            SessionState::Running => 2,
            SessionState::Suspended => 3,
            SessionState::Closed => 4,
            SessionState::Failed => 5,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Configuring => "configuring",
            SessionState::Running => "running",
            SessionState::Suspended => "suspended",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_STATES: [SessionState; 6] = [
        SessionState::Idle,
        SessionState::Configuring,
        SessionState::Running,
        SessionState::Suspended,
        SessionState::Closed,
        SessionState::Failed,
    ];

    fn transition_strategy() -> impl Strategy<Value = Transition> {
        prop_oneof![
            Just(Transition::Open),
            Just(Transition::DeviceReady),
            Just(Transition::Suspend),
            Just(Transition::Resume),
            Just(Transition::Close),
            Just(Transition::Abort),
            Just(Transition::HardwareFault),
        ]
    }

    #[test]
    fn test_happy_path() {
        let s = SessionState::Idle;
        let s = s.apply(Transition::Open).unwrap();
        assert_eq!(s, SessionState::Configuring);
        let s = s.apply(Transition::DeviceReady).unwrap();
        assert_eq!(s, SessionState::Running);
        let s = s.apply(Transition::Suspend).unwrap();
        let s = s.apply(Transition::Resume).unwrap();
        assert_eq!(s, SessionState::Running);
        assert_eq!(s.apply(Transition::Close), Some(SessionState::Closed));
    }

    #[test]
    fn test_failed_requires_close_before_reopen() {
        let failed = SessionState::Running
            .apply(Transition::HardwareFault)
            .unwrap();
        assert_eq!(failed, SessionState::Failed);
        assert_eq!(failed.apply(Transition::Open), None);
        let closed = failed.apply(Transition::Close).unwrap();
        assert_eq!(closed.apply(Transition::Open), Some(SessionState::Configuring));
    }

    #[test]
    fn test_close_on_idle_or_closed_is_not_a_transition() {
        assert_eq!(SessionState::Idle.apply(Transition::Close), None);
        assert_eq!(SessionState::Closed.apply(Transition::Close), None);
    }

    proptest! {
        #[test]
        fn prop_transitions_stay_defined(seq in proptest::collection::vec(transition_strategy(), 0..64)) {
            let mut state = SessionState::Idle;
            for t in seq {
                if let Some(next) = state.apply(t) {
                    prop_assert!(ALL_STATES.contains(&next));
                    // Nothing but close leaves Failed
                    if state == SessionState::Failed {
                        prop_assert_eq!(next, SessionState::Closed);
                    }
                    state = next;
                }
            }
        }

        #[test]
        fn prop_only_open_leaves_closed(t in transition_strategy()) {
            match SessionState::Closed.apply(t) {
                Some(next) => {
                    prop_assert_eq!(t, Transition::Open);
                    prop_assert_eq!(next, SessionState::Configuring);
                }
                None => prop_assert_ne!(t, Transition::Open),
            }
        }
    }
}
