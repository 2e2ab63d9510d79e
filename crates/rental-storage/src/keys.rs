//! Storage key constants.

/// Keys written by the session core.
pub struct StorageKeys;

impl StorageKeys {
    /// Current access token
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Current refresh token
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Cached user record (JSON)
    pub const USER_DATA: &'static str = "userData";

    /// Every key owned by the session, in deletion order.
    pub const ALL: [&'static str; 3] = [Self::ACCESS_TOKEN, Self::REFRESH_TOKEN, Self::USER_DATA];
}
