//! Per-session protocol state machine.
//!
//! ```text
//! Unconfigured ──handshake──► Ready ──reset──► AwaitingResetData ──payload+token──► Ready
//!                               │
//!                               └──step──► AwaitingStepData ──payload──► Ready
//!
//! any awaiting state ──transport error / desync──► Faulted (terminal)
//! ```

/// Where a session is in its command cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, dimensions not yet known.
    Unconfigured,
    /// Idle; accepts reset or step.
    Ready,
    /// Reset request sent, payload and sync token pending.
    AwaitingResetData,
    /// Step request sent, per-slot results pending.
    AwaitingStepData,
    /// A fatal error occurred; the session must be closed.
    Faulted,
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    HandshakeComplete,
    ResetSent,
    ResetReceived,
    StepSent,
    StepReceived,
    Fault,
}

impl SessionState {
    /// Apply `event`, returning the next state or `None` if the event is
    /// illegal here.
    pub fn on(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (S::Faulted, _) => None,
            (_, E::Fault) => Some(S::Faulted),
            (S::Unconfigured, E::HandshakeComplete) => Some(S::Ready),
            (S::Ready, E::ResetSent) => Some(S::AwaitingResetData),
            (S::AwaitingResetData, E::ResetReceived) => Some(S::Ready),
            (S::Ready, E::StepSent) => Some(S::AwaitingStepData),
            (S::AwaitingStepData, E::StepReceived) => Some(S::Ready),
            _ => None,
        }
    }

    /// Whether the session is waiting for peer data.
    #[inline]
    pub fn is_awaiting_data(self) -> bool {
        matches!(
            self,
            SessionState::AwaitingResetData | SessionState::AwaitingStepData
        )
    }

    /// Short name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Unconfigured => "unconfigured",
            SessionState::Ready => "ready",
            SessionState::AwaitingResetData => "awaiting_reset_data",
            SessionState::AwaitingStepData => "awaiting_step_data",
            SessionState::Faulted => "faulted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_cycle() {
        let s = SessionState::Unconfigured;
        let s = s.on(SessionEvent::HandshakeComplete).unwrap();
        assert_eq!(s, SessionState::Ready);

        let s = s.on(SessionEvent::ResetSent).unwrap();
        assert!(s.is_awaiting_data());
        let s = s.on(SessionEvent::ResetReceived).unwrap();
        assert_eq!(s, SessionState::Ready);

        let s = s.on(SessionEvent::StepSent).unwrap();
        assert_eq!(s, SessionState::AwaitingStepData);
        let s = s.on(SessionEvent::StepReceived).unwrap();
        assert_eq!(s, SessionState::Ready);
    }

    #[test]
    fn test_commands_require_ready() {
        assert!(SessionState::Unconfigured
            .on(SessionEvent::ResetSent)
            .is_none());
        assert!(SessionState::AwaitingResetData
            .on(SessionEvent::StepSent)
            .is_none());
        assert!(SessionState::AwaitingStepData
            .on(SessionEvent::ResetReceived)
            .is_none());
    }

    #[test]
    fn test_faulted_is_terminal() {
        let s = SessionState::AwaitingResetData
            .on(SessionEvent::Fault)
            .unwrap();
        assert_eq!(s, SessionState::Faulted);

        for event in [
            SessionEvent::HandshakeComplete,
            SessionEvent::ResetSent,
            SessionEvent::StepSent,
            SessionEvent::Fault,
        ] {
            assert!(s.on(event).is_none());
        }
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SessionState::Ready.as_str(), "ready");
        assert_eq!(SessionState::Faulted.as_str(), "faulted");
    }
}
