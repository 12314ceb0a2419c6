use crate::settings_test::protocol::{Feature, FeatureState};
use crate::token::CorrelationToken;

/// The one in-flight feature test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSession {
    /// Host endpoint the result is addressed to.
    pub host_endpoint_id: u16,
    pub feature: Feature,
    pub desired_state: FeatureState,
    pub token: CorrelationToken,
}

/// Single-slot session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Pending(TestSession),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn pending(&self) -> Option<&TestSession> {
        match self {
            SessionState::Idle => None,
            SessionState::Pending(session) => Some(session),
        }
    }
}
