//! Session gate between the login screen and the shelves.

/// Authentication state reported by the session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Authenticated,
    Unauthenticated { reason: Option<String> },
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Unauthenticated { reason: None }
    }
}

/// What the UI may render for a given session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Loading,
    Login,
    Ready,
}

impl SessionState {
    pub fn gate(&self) -> Gate {
        match self {
            SessionState::Loading => Gate::Loading,
            SessionState::Authenticated => Gate::Ready,
            SessionState::Unauthenticated { .. } => Gate::Login,
        }
    }
}
