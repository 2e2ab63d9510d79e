//! Login, registration, logout and status.

use super::{print_json, user_facing};
use crate::app::{App, CliResult};
use chrono::{DateTime, Utc};
use rental_session::{token, SessionSnapshot};
use serde_json::{json, Value};
use tracing::info;

pub async fn login(app: &App, email: &str, password: &str) -> CliResult<()> {
    app.session
        .login(email, password)
        .await
        .map_err(user_facing)?;
    info!("Signed in");
    print_json(&status_json(&app.session.snapshot()))
}

pub async fn register(app: &App, name: &str, email: &str, password: &str) -> CliResult<()> {
    app.session
        .register(name, email, password)
        .await
        .map_err(user_facing)?;
    info!("Account created");
    print_json(&status_json(&app.session.snapshot()))
}

pub async fn logout(app: &App) -> CliResult<()> {
    app.session.logout().await;
    print_json(&json!({ "status": "logged_out" }))
}

pub fn status(app: &App) -> CliResult<()> {
    print_json(&status_json(&app.session.snapshot()))
}

/// Session summary. Never includes the token itself.
pub(crate) fn status_json(snapshot: &SessionSnapshot) -> Value {
    let expires_at = snapshot
        .token
        .as_deref()
        .and_then(|token| token::decode(token).ok())
        .and_then(|claims| DateTime::<Utc>::from_timestamp_millis(claims.expires_at_ms))
        .map(|at| at.to_rfc3339());

    json!({
        "authenticated": snapshot.is_authenticated,
        "state": snapshot.state,
        "user_id": snapshot.user.as_ref().map(|user| &user.id),
        "email": snapshot.user.as_ref().map(|user| &user.email),
        "favorites": snapshot.user.as_ref().map(|user| user.favorites.len()).unwrap_or(0),
        "expires_at": expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rental_api::User;
    use rental_session::SessionState;

    #[test]
    fn test_signed_out_status() {
        let snapshot = SessionSnapshot {
            state: SessionState::Unauthenticated,
            is_authenticated: false,
            user: None,
            token: None,
            bootstrapping: false,
            auth_operation_in_flight: false,
        };

        let status = status_json(&snapshot);
        assert_eq!(status["authenticated"], false);
        assert_eq!(status["state"], "unauthenticated");
        assert!(status["user_id"].is_null());
        assert!(status["expires_at"].is_null());
    }

    #[test]
    fn test_status_reports_user_without_token() {
        let snapshot = SessionSnapshot {
            state: SessionState::Authenticated,
            is_authenticated: true,
            user: Some(User {
                id: "u1".to_string(),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                avatar: None,
                favorites: vec!["L1".to_string(), "L2".to_string()],
                provider: None,
            }),
            token: Some("opaque-token".to_string()),
            bootstrapping: false,
            auth_operation_in_flight: false,
        };

        let status = status_json(&snapshot);
        assert_eq!(status["user_id"], "u1");
        assert_eq!(status["favorites"], 2);
        assert!(status["expires_at"].is_null());
        assert!(!status.to_string().contains("opaque-token"));
    }
}
