//! Events emitted by the session manager.

use serde::Serialize;
use std::sync::Arc;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    LoggedOut,
    RefreshFailed,
    BootstrapFailed,
}

/// Authentication transitions the presentation layer reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A token became active (login, register, refresh or bootstrap).
    Authenticated { user_id: Option<String> },
    /// Credentials were cleared; route to the sign-in entry point.
    SessionEnded { reason: EndReason },
    /// The cached user record changed.
    UserUpdated { user_id: String },
}

pub(crate) type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&SessionEvent::SessionEnded {
            reason: EndReason::RefreshFailed,
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"session_ended","reason":"refresh_failed"}"#);
    }
}
