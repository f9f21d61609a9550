//! JSON file backend.
//!
//! All keys live in one JSON object. Every mutation rewrites the document
//! through a temp file and a rename, so a crash mid-write leaves either the
//! old or the new document, never a torn one.

use crate::{SecureStorage, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Owner read/write only.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

type Document = BTreeMap<String, String>;

/// Credential file on local disk.
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create a backend over `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_document(&self) -> StorageResult<Document> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Document::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StorageError::Encoding(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Document to base a mutation on, and whether the file on disk was
    /// unreadable. A corrupt file is replaced rather than blocking every
    /// later write and removal.
    fn read_for_write(&self) -> StorageResult<(Document, bool)> {
        match self.read_document() {
            Ok(document) => Ok((document, false)),
            Err(StorageError::Encoding(e)) => {
                warn!(path = %self.path.display(), error = %e, "credential file is corrupt, overwriting it");
                Ok((Document::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn write_document(&self, document: &Document) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let content = serde_json::to_vec_pretty(document)?;

        {
            let mut file = open_private(&tmp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), keys = document.len(), "credential file written");
        Ok(())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> T) -> StorageResult<T> {
        let _guard = self.guard();
        let (mut document, _) = self.read_for_write()?;
        let result = f(&mut document);
        self.write_document(&document)?;
        Ok(result)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(FILE_MODE)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl SecureStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.mutate(|doc| {
            doc.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_document()?.remove(key))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.guard();
        let (mut document, corrupt) = self.read_for_write()?;
        let existed = document.remove(key).is_some();
        if existed || corrupt {
            self.write_document(&document)?;
        }
        Ok(existed)
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        self.mutate(|doc| {
            for (key, value) in entries {
                doc.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        let document = self.read_document()?;
        Ok(keys.iter().map(|key| document.get(*key).cloned()).collect())
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        let _guard = self.guard();
        let (mut document, corrupt) = self.read_for_write()?;
        let before = document.len();
        for key in keys {
            document.remove(*key);
        }
        if corrupt || document.len() != before {
            self.write_document(&document)?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
