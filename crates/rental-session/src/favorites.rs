//! Optimistic favorite toggling.
//!
//! Every surface that shows favorites (listing feed, favorites screen, the
//! session user's own list) goes through [`FavoriteToggleCoordinator`]. The
//! coordinator mutates its [`MembershipStore`] before the remote call starts
//! and, if the call fails, restores the membership the call observed. A
//! rollback sets membership for the listing to its earlier value instead of
//! flipping it, so a later toggle on the same id is never undone by an
//! earlier one's failure.

use crate::session::SessionManager;
use crate::{SessionError, SessionResult};
use rental_api::{FavoriteListing, FavoritesApi};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Container of "is favorited" flags mutated by a coordinator.
pub trait MembershipStore: Send + Sync {
    fn is_member(&self, listing_id: &str) -> bool;

    fn set_member(&self, listing_id: &str, member: bool);
}

#[derive(Debug, Default)]
struct FavoriteSetState {
    ids: HashSet<String>,
    listings: Vec<FavoriteListing>,
}

/// Per-surface favorites set, plus the listing details last fetched for it.
#[derive(Debug, Default)]
pub struct FavoriteSet {
    state: Mutex<FavoriteSetState>,
}

impl FavoriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = Self::default();
        set.lock().ids = ids.into_iter().map(Into::into).collect();
        set
    }

    fn lock(&self) -> MutexGuard<'_, FavoriteSetState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sorted copy of the favorited ids.
    pub fn ids(&self) -> BTreeSet<String> {
        self.lock().ids.iter().cloned().collect()
    }

    pub fn contains(&self, listing_id: &str) -> bool {
        self.lock().ids.contains(listing_id)
    }

    pub fn len(&self) -> usize {
        self.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ids.is_empty()
    }

    /// Replace the contents with a fresh server listing.
    pub fn replace(&self, listings: Vec<FavoriteListing>) {
        let mut state = self.lock();
        state.ids = listings.iter().map(|listing| listing.id.clone()).collect();
        state.listings = listings;
    }

    /// Fetched listings that are still favorited, in server order.
    pub fn listings(&self) -> Vec<FavoriteListing> {
        let state = self.lock();
        state
            .listings
            .iter()
            .filter(|listing| state.ids.contains(&listing.id))
            .cloned()
            .collect()
    }
}

impl MembershipStore for FavoriteSet {
    fn is_member(&self, listing_id: &str) -> bool {
        self.contains(listing_id)
    }

    fn set_member(&self, listing_id: &str, member: bool) {
        let mut state = self.lock();
        if member {
            state.ids.insert(listing_id.to_string());
        } else {
            state.ids.remove(listing_id);
        }
    }
}

/// The signed-in user's `favorites`, persisted with the cached user record.
pub struct SessionFavorites {
    session: Arc<SessionManager>,
}

impl SessionFavorites {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

impl MembershipStore for SessionFavorites {
    fn is_member(&self, listing_id: &str) -> bool {
        self.session
            .snapshot()
            .user
            .map(|user| user.is_favorite(listing_id))
            .unwrap_or(false)
    }

    fn set_member(&self, listing_id: &str, member: bool) {
        if self
            .session
            .update_user(|user| user.set_favorite(listing_id, member))
            .is_none()
        {
            debug!(listing_id = %listing_id, "No user loaded, favorite not recorded");
        }
    }
}

/// Result of a toggle. Failures are reported here, never as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// No active session; nothing changed.
    Skipped,
    /// The service accepted the change.
    Confirmed,
    /// The service call failed and the local change was undone.
    RolledBack,
}

/// Applies favorite toggles to one membership container.
pub struct FavoriteToggleCoordinator<M: MembershipStore> {
    session: Arc<SessionManager>,
    api: Arc<dyn FavoritesApi>,
    membership: Arc<M>,
}

impl<M: MembershipStore> FavoriteToggleCoordinator<M> {
    pub fn new(session: Arc<SessionManager>, api: Arc<dyn FavoritesApi>, membership: Arc<M>) -> Self {
        Self {
            session,
            api,
            membership,
        }
    }

    pub fn membership(&self) -> &Arc<M> {
        &self.membership
    }

    /// Toggle `listing_id` given the membership the caller rendered.
    ///
    /// The local change is applied before the remote call is issued and is
    /// visible to readers while the call is in flight.
    pub async fn toggle(&self, listing_id: &str, currently_favorited: bool) -> ToggleOutcome {
        let Some(credentials) = self.session.credentials() else {
            debug!(listing_id = %listing_id, "No active session, ignoring favorite toggle");
            return ToggleOutcome::Skipped;
        };

        let was_favorited = currently_favorited;
        self.membership.set_member(listing_id, !was_favorited);

        let result = if was_favorited {
            self.api
                .remove_favorite(&credentials.user_id, listing_id, &credentials.access_token)
                .await
        } else {
            self.api
                .add_favorite(&credentials.user_id, listing_id, &credentials.access_token)
                .await
        };

        match result {
            Ok(()) => {
                debug!(listing_id = %listing_id, favorited = !was_favorited, "Favorite change confirmed");
                ToggleOutcome::Confirmed
            }
            Err(e) => {
                warn!(listing_id = %listing_id, error = %e, "Favorite change failed, rolling back");
                self.membership.set_member(listing_id, was_favorited);
                ToggleOutcome::RolledBack
            }
        }
    }

    /// Toggle using the membership currently held by the container.
    pub async fn toggle_observed(&self, listing_id: &str) -> ToggleOutcome {
        let currently_favorited = self.membership.is_member(listing_id);
        self.toggle(listing_id, currently_favorited).await
    }
}

impl FavoriteToggleCoordinator<FavoriteSet> {
    /// Re-query the service and replace the set. Returns the listing count.
    pub async fn reload(&self) -> SessionResult<usize> {
        let credentials = self
            .session
            .credentials()
            .ok_or(SessionError::NotAuthenticated)?;

        let listings = self
            .api
            .get_favorites(&credentials.user_id, &credentials.access_token)
            .await
            .map_err(|e| SessionError::from_api(e, "Failed to load favorites"))?;

        let count = listings.len();
        self.membership.replace(listings);
        debug!(count, "Favorites reloaded");
        Ok(count)
    }
}
