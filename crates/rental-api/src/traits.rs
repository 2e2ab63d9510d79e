//! Service seams consumed by the session core.

use crate::{ApiResult, AuthSession, FavoriteListing, User};
use async_trait::async_trait;

/// Authentication endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /api/auth/login`
    async fn login(&self, email: &str, password: &str) -> ApiResult<AuthSession>;

    /// `POST /api/auth/register`
    async fn register(&self, name: &str, email: &str, password: &str) -> ApiResult<AuthSession>;

    /// `GET /api/auth/me`
    async fn current_user(&self, access_token: &str) -> ApiResult<User>;

    /// `POST /api/auth/logout`
    async fn logout(&self, access_token: &str) -> ApiResult<()>;

    /// `POST /api/auth/refresh`
    async fn refresh(&self, refresh_token: &str) -> ApiResult<AuthSession>;
}

/// Per-user favorites endpoints.
#[async_trait]
pub trait FavoritesApi: Send + Sync {
    async fn get_favorites(&self, user_id: &str, access_token: &str) -> ApiResult<Vec<FavoriteListing>>;

    async fn add_favorite(&self, user_id: &str, listing_id: &str, access_token: &str) -> ApiResult<()>;

    async fn remove_favorite(&self, user_id: &str, listing_id: &str, access_token: &str) -> ApiResult<()>;
}

/// Profile lookup.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// `GET /api/users/{user_id}`
    async fn get_user_profile(&self, user_id: &str, access_token: &str) -> ApiResult<User>;
}
