//! Command handlers.
//!
//! Each handler prints its result as JSON on stdout. Failures are returned
//! with the user-facing message so `main` can report them.

pub mod auth;
pub mod favorites;
pub mod profile;

use crate::app::CliError;
use rental_session::SessionError;

/// Convert a session error into its user-facing message.
pub(crate) fn user_facing(error: SessionError) -> CliError {
    error.user_message().into()
}

pub(crate) fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
