//! Persisted key names.

/// Keys the session layer persists.
pub struct StorageKeys;

impl StorageKeys {
    /// Access token
    pub const ACCESS_TOKEN: &'static str = "auth_token";

    /// Refresh token
    pub const REFRESH_TOKEN: &'static str = "auth_refresh_token";

    /// Cached user profile (JSON)
    pub const USER: &'static str = "user";

    /// Every key owned by a session, cleared together on sign-out.
    pub const SESSION_KEYS: [&'static str; 3] = [Self::ACCESS_TOKEN, Self::REFRESH_TOKEN, Self::USER];
}
