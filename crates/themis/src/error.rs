//! Authentication error types.

use thiserror::Error;

/// Why a token refresh did not produce a new pair.
///
/// Cloneable because every caller waiting on the shared refresh receives the
/// same value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Nothing to refresh with
    #[error("No refresh token stored")]
    MissingRefreshToken,

    /// The server refused the refresh token
    #[error("Refresh token rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The refresh endpoint failed on its side
    #[error("Refresh endpoint unavailable (HTTP {status})")]
    Server { status: u16 },

    /// Transport failure before a response arrived
    #[error("Refresh request failed: {0}")]
    Network(String),

    /// 2xx response that did not carry a token pair
    #[error("Malformed refresh response: {0}")]
    InvalidResponse(String),

    /// The session was cleared while the refresh was in flight
    #[error("Session ended during refresh")]
    SessionEnded,
}

impl RefreshError {
    /// True when the stored credentials can no longer be used.
    ///
    /// Server and transport failures leave the refresh token intact, so the
    /// session survives them and a later request may refresh again.
    pub fn invalidates_session(&self) -> bool {
        !matches!(self, RefreshError::Server { .. } | RefreshError::Network(_))
    }
}

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Local input problem, never sent to the network
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credentials rejected, or a request still unauthorized after refresh
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// Transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Non-2xx response other than 401
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::Timeout
        } else if e.is_decode() {
            AuthError::InvalidResponse(e.to_string())
        } else {
            AuthError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::InvalidResponse(e.to_string())
    }
}

impl From<expediente_config::CoreError> for AuthError {
    fn from(e: expediente_config::CoreError) -> Self {
        AuthError::Config(e.to_string())
    }
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Transport failures and timeouts
    /// - HTTP errors with 5xx status codes
    /// - Refresh failures that left the session intact
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(_) | AuthError::Timeout => true,
            AuthError::Api { status, .. } => *status >= 500,
            AuthError::Refresh(e) => !e.invalidates_session(),
            _ => false,
        }
    }

    /// Short text suitable for `Session::error`.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(message) | AuthError::Authentication(message) => {
                message.clone()
            }
            AuthError::Refresh(_) => "Your session has expired. Please sign in again.".to_string(),
            AuthError::Network(_) | AuthError::Timeout => {
                "Could not reach the server. Check your connection.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
