//! Best-effort credential facade used by the session layer.

use crate::{SecureStorage, StorageKeys};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Access token plus the refresh token that can replace it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Credential store over any [`SecureStorage`] backend.
///
/// Reads never fail: a backend error is logged and reported as `None`.
/// Writes and removals are best-effort and return whether they landed, so
/// callers may log but never have to branch on storage health.
pub struct CredentialStore {
    backend: Box<dyn SecureStorage>,
}

impl CredentialStore {
    pub fn new(backend: Box<dyn SecureStorage>) -> Self {
        Self { backend }
    }

    /// Read `key`, treating any backend failure as absence.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, backend = self.backend.backend_name(), error = %e, "credential read failed, treating as absent");
                None
            }
        }
    }

    /// Write `key`. Returns false if the backend rejected the write.
    pub fn set(&self, key: &str, value: &str) -> bool {
        match self.backend.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, backend = self.backend.backend_name(), error = %e, "credential write failed");
                false
            }
        }
    }

    /// Remove every key in `keys`. Returns false if the backend reported a failure.
    pub fn remove(&self, keys: &[&str]) -> bool {
        match self.backend.delete_many(keys) {
            Ok(()) => true,
            Err(e) => {
                warn!(?keys, backend = self.backend.backend_name(), error = %e, "credential removal failed");
                false
            }
        }
    }

    /// The stored pair, or `None` unless both halves are present.
    ///
    /// A lone half is a broken invariant left behind by an interrupted
    /// backend; it is cleared here so later readers see a clean absence.
    pub fn token_pair(&self) -> Option<TokenPair> {
        let values = match self
            .backend
            .get_many(&[StorageKeys::ACCESS_TOKEN, StorageKeys::REFRESH_TOKEN])
        {
            Ok(values) => values,
            Err(e) => {
                warn!(backend = self.backend.backend_name(), error = %e, "token pair read failed, treating as absent");
                return None;
            }
        };

        let mut values = values.into_iter();
        match (values.next().flatten(), values.next().flatten()) {
            (Some(access_token), Some(refresh_token)) => Some(TokenPair {
                access_token,
                refresh_token,
            }),
            (None, None) => None,
            _ => {
                warn!("found half of a token pair, clearing it");
                self.clear_token_pair();
                None
            }
        }
    }

    /// Current access token, only if its refresh token is also present.
    pub fn access_token(&self) -> Option<String> {
        self.token_pair().map(|pair| pair.access_token)
    }

    /// Current refresh token, only if its access token is also present.
    pub fn refresh_token(&self) -> Option<String> {
        self.token_pair().map(|pair| pair.refresh_token)
    }

    /// Persist both tokens as one unit.
    pub fn set_token_pair(&self, pair: &TokenPair) -> bool {
        let entries = [
            (StorageKeys::ACCESS_TOKEN, pair.access_token.as_str()),
            (StorageKeys::REFRESH_TOKEN, pair.refresh_token.as_str()),
        ];
        match self.backend.set_many(&entries) {
            Ok(()) => {
                debug!(backend = self.backend.backend_name(), "token pair stored");
                true
            }
            Err(e) => {
                warn!(backend = self.backend.backend_name(), error = %e, "token pair write failed");
                // Never leave one half behind.
                self.clear_token_pair();
                false
            }
        }
    }

    /// Remove both tokens.
    pub fn clear_token_pair(&self) -> bool {
        self.remove(&[StorageKeys::ACCESS_TOKEN, StorageKeys::REFRESH_TOKEN])
    }

    /// Cached profile, if present and decodable.
    pub fn cached_user<T: DeserializeOwned>(&self) -> Option<T> {
        let raw = self.get(StorageKeys::USER)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "cached user profile is unreadable, dropping it");
                self.remove(&[StorageKeys::USER]);
                None
            }
        }
    }

    /// Cache the serialized profile.
    pub fn set_cached_user<T: Serialize>(&self, user: &T) -> bool {
        match serde_json::to_string(user) {
            Ok(raw) => self.set(StorageKeys::USER, &raw),
            Err(e) => {
                warn!(error = %e, "user profile could not be serialized");
                false
            }
        }
    }

    /// Remove every session key (tokens and cached profile).
    pub fn clear_session(&self) -> bool {
        self.remove(&StorageKeys::SESSION_KEYS)
    }

    /// True when nothing session-related remains.
    pub fn is_empty(&self) -> bool {
        StorageKeys::SESSION_KEYS
            .iter()
            .all(|key| self.get(key).is_none())
    }
}
