//! HTTP client for the rental listing API.
//!
//! This crate provides:
//! - Wire models for users, auth sessions and favorite listings
//! - [`AuthApi`], [`FavoritesApi`] and [`ProfileApi`], the seams the session
//!   core depends on
//! - [`RentalApiClient`], the reqwest implementation of all three

mod client;
mod error;
mod models;
mod traits;

pub use client::RentalApiClient;
pub use error::{ApiError, ApiResult, NETWORK_ERROR_MESSAGE};
pub use models::{AuthProvider, AuthSession, FavoriteListing, User};
pub use traits::{AuthApi, FavoritesApi, ProfileApi};
