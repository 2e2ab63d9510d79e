//! Session core for the rental client.
//!
//! This crate provides:
//! - Access token decoding and expiry checks
//! - [`SessionManager`], an FSM-backed owner of the authentication state
//! - [`FavoriteToggleCoordinator`], optimistic favorite toggling with rollback
//! - Session events for the presentation layer

mod error;
mod events;
mod favorites;
mod session;
mod session_fsm;
pub mod token;

pub use error::{SessionError, SessionResult};
pub use events::{EndReason, SessionEvent};
pub use favorites::{FavoriteSet, FavoriteToggleCoordinator, MembershipStore, SessionFavorites, ToggleOutcome};
pub use session::{SessionConfig, SessionCredentials, SessionManager, SessionSnapshot};
pub use session_fsm::session_machine;
pub use session_fsm::{SessionMachine, SessionMachineInput, SessionMachineState, SessionState};
pub use token::{DecodeError, TokenClaims, DEFAULT_EXPIRY_SKEW_MS};

#[cfg(test)]
mod tests;
