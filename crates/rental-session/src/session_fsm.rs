//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Bootstrapping  │ (initial)
//! └────────┬────────┘
//!          │ NoSession ──────────────────────────► Unauthenticated
//!          │ TokenActivated ─────────────────────► Authenticated
//!          │ RefreshStarted ─────────────────────► Refreshing
//!          ▼
//! ┌─────────────────┐   RefreshStarted   ┌─────────────────┐
//! │  Authenticated  │ ─────────────────► │   Refreshing    │
//! └────────┬────────┘ ◄───────────────── └────────┬────────┘
//!          │            TokenActivated            │
//!          │ SessionEnded                         │ SessionEnded
//!          ▼                                      ▼
//! ┌─────────────────┐
//! │ Unauthenticated │ ── TokenActivated (login/register) ──► Authenticated
//! └─────────────────┘
//! ```
//!
//! `SessionEnded` is accepted everywhere so teardown can never be refused.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Bootstrapping)

    Bootstrapping => {
        NoSession => Unauthenticated,
        TokenActivated => Authenticated,
        RefreshStarted => Refreshing,
        SessionEnded => Unauthenticated
    },
    Unauthenticated => {
        TokenActivated => Authenticated,
        RefreshStarted => Refreshing,
        SessionEnded => Unauthenticated
    },
    Authenticated => {
        TokenActivated => Authenticated,
        RefreshStarted => Refreshing,
        SessionEnded => Unauthenticated
    },
    Refreshing => {
        TokenActivated => Authenticated,
        SessionEnded => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Stored credentials have not been examined yet.
    Bootstrapping,
    Unauthenticated,
    Authenticated,
    /// Exchanging the refresh token for a new pair.
    Refreshing,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// Returns true while the state will resolve without user input.
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionState::Bootstrapping | SessionState::Refreshing)
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Bootstrapping => SessionState::Bootstrapping,
            SessionMachineState::Unauthenticated => SessionState::Unauthenticated,
            SessionMachineState::Authenticated => SessionState::Authenticated,
            SessionMachineState::Refreshing => SessionState::Refreshing,
        }
    }
}
