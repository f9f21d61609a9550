//! CLI command implementations.

mod api;
mod auth;

pub use api::request;
pub use auth::{can, login, logout, status};

use anyhow::Result;
use credential_store::{
    CredentialStore, FileStorage, MemoryStorage, MirroredStorage, SecureStorage,
};
use expediente_config::{Config, Paths, StorageBackendKind};
use std::sync::Arc;
use themis::SessionManager;
use tracing::debug;

/// Credential backend selected by `config.storage`.
pub fn storage_backend(config: &Config, paths: &Paths) -> Box<dyn SecureStorage> {
    match config.storage {
        StorageBackendKind::File => Box::new(FileStorage::new(paths.credentials_file())),
        StorageBackendKind::Memory => Box::new(MemoryStorage::new()),
        StorageBackendKind::Mirrored => Box::new(MirroredStorage::new(
            Box::new(FileStorage::new(paths.credentials_file())),
            Box::new(FileStorage::new(paths.credentials_mirror_file())),
        )),
    }
}

/// Build the session service and restore any stored session.
pub async fn open_session(config: &Config, paths: &Paths) -> Result<SessionManager> {
    let store = Arc::new(CredentialStore::new(storage_backend(config, paths)));
    let session = SessionManager::from_config(config, store)?;

    let snapshot = session.bootstrap().await;
    debug!(status = ?snapshot.status, backend = ?config.storage, "Session bootstrapped");
    Ok(session)
}
