//! Favorite listings.

use super::{print_json, user_facing};
use crate::app::{App, CliResult};
use rental_session::{FavoriteSet, FavoriteToggleCoordinator, SessionError, SessionFavorites, ToggleOutcome};
use serde_json::json;
use std::sync::Arc;

pub async fn list(app: &App) -> CliResult<()> {
    let favorites = FavoriteToggleCoordinator::new(
        app.session.clone(),
        app.api.clone(),
        Arc::new(FavoriteSet::new()),
    );
    favorites.reload().await.map_err(user_facing)?;

    let listings = favorites.membership().listings();
    print_json(&json!({
        "count": listings.len(),
        "listings": listings
            .iter()
            .map(|listing| json!({
                "id": listing.id,
                "title": listing.title,
                "location": listing.location,
                "price": listing.price,
                "rating": listing.rating,
            }))
            .collect::<Vec<_>>(),
    }))
}

/// Toggle `listing_id` on the signed-in user's favorites.
pub async fn toggle(app: &App, listing_id: &str) -> CliResult<()> {
    let favorites = FavoriteToggleCoordinator::new(
        app.session.clone(),
        app.api.clone(),
        Arc::new(SessionFavorites::new(app.session.clone())),
    );

    match favorites.toggle_observed(listing_id).await {
        ToggleOutcome::Skipped => Err(user_facing(SessionError::NotAuthenticated)),
        ToggleOutcome::RolledBack => Err("Failed to update favorites".into()),
        ToggleOutcome::Confirmed => {
            let favorited = app
                .session
                .snapshot()
                .user
                .map(|user| user.is_favorite(listing_id))
                .unwrap_or(false);
            print_json(&json!({ "listing_id": listing_id, "favorited": favorited }))
        }
    }
}
