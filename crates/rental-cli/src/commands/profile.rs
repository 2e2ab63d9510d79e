//! Profile lookup.

use super::{print_json, user_facing};
use crate::app::{App, CliResult};
use rental_api::ProfileApi;
use rental_session::SessionError;

/// Fetch the profile of the signed-in user and refresh the cached record.
pub async fn show(app: &App) -> CliResult<()> {
    let access_token = app.session.ensure_fresh_token().await.map_err(user_facing)?;
    let credentials = app
        .session
        .credentials()
        .ok_or_else(|| user_facing(SessionError::NotAuthenticated))?;

    let profile = app
        .api
        .get_user_profile(&credentials.user_id, &access_token)
        .await
        .map_err(|e| e.user_message("Failed to fetch profile"))?;

    app.session.replace_user(profile.clone()).map_err(user_facing)?;
    print_json(&serde_json::to_value(&profile)?)
}
