//! Credential persistence for the Expediente client.
//!
//! Backends implement [`SecureStorage`]; the session layer talks to them only
//! through [`CredentialStore`], which turns every backend failure into a
//! logged "absent" result so storage problems can never wedge the auth flow.
//!
//! - [`MemoryStorage`]: process memory, used in tests and ephemeral runs
//! - [`FileStorage`]: a single JSON document with owner-only permissions
//! - [`MirroredStorage`]: primary plus secondary, reads fall back on absence

mod file;
mod keys;
mod memory;
mod mirrored;
mod store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use mirrored::MirroredStorage;
pub use store::{CredentialStore, TokenPair};
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored value could not be decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Both halves of a mirrored operation failed
    #[error("Mirrored storage failed on both backends: primary: {primary}; secondary: {secondary}")]
    MirrorFailed { primary: String, secondary: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Encoding(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
