//! Primary/secondary mirrored backend.

use crate::{SecureStorage, StorageError, StorageResult};
use tracing::warn;

/// Writes and deletes go to both backends; reads prefer the primary.
///
/// A read falls through to the secondary only when the primary reports the
/// key absent or fails. A write that lands on one side only is logged and
/// reported as success; it fails only when both sides fail.
pub struct MirroredStorage {
    primary: Box<dyn SecureStorage>,
    secondary: Box<dyn SecureStorage>,
}

impl MirroredStorage {
    pub fn new(primary: Box<dyn SecureStorage>, secondary: Box<dyn SecureStorage>) -> Self {
        Self { primary, secondary }
    }

    fn mirror<T>(
        &self,
        op: &'static str,
        f: impl Fn(&dyn SecureStorage) -> StorageResult<T>,
    ) -> StorageResult<T> {
        match (f(self.primary.as_ref()), f(self.secondary.as_ref())) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(value), Err(e)) => {
                warn!(op, backend = self.secondary.backend_name(), error = %e, "secondary storage write failed");
                Ok(value)
            }
            (Err(e), Ok(value)) => {
                warn!(op, backend = self.primary.backend_name(), error = %e, "primary storage write failed");
                Ok(value)
            }
            (Err(primary), Err(secondary)) => Err(StorageError::MirrorFailed {
                primary: primary.to_string(),
                secondary: secondary.to_string(),
            }),
        }
    }
}

impl SecureStorage for MirroredStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.mirror("set", |backend| backend.set(key, value))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.primary.get(key) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) => {
                warn!(key, backend = self.primary.backend_name(), error = %e, "primary storage read failed, trying secondary");
            }
        }
        self.secondary.get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let primary = self.primary.delete(key);
        let secondary = self.secondary.delete(key);
        match (primary, secondary) {
            (Ok(a), Ok(b)) => Ok(a || b),
            (Ok(existed), Err(e)) | (Err(e), Ok(existed)) => {
                warn!(key, error = %e, "mirrored delete only reached one backend");
                Ok(existed)
            }
            (Err(primary), Err(secondary)) => Err(StorageError::MirrorFailed {
                primary: primary.to_string(),
                secondary: secondary.to_string(),
            }),
        }
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        self.mirror("set_many", |backend| backend.set_many(entries))
    }

    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        // Fall back as a whole so a token pair is never stitched together
        // from two different backends. A partial primary only yields to a
        // complete secondary.
        let partial = match self.primary.get_many(keys) {
            Ok(values) if values.iter().all(Option::is_some) => return Ok(values),
            Ok(values) if values.iter().any(Option::is_some) => values,
            Ok(_) => return self.secondary.get_many(keys),
            Err(e) => {
                warn!(backend = self.primary.backend_name(), error = %e, "primary storage read failed, trying secondary");
                return self.secondary.get_many(keys);
            }
        };

        match self.secondary.get_many(keys) {
            Ok(values) if values.iter().all(Option::is_some) => {
                warn!(backend = self.primary.backend_name(), "primary storage holds a partial entry, using secondary");
                Ok(values)
            }
            Ok(_) => Ok(partial),
            Err(e) => {
                warn!(backend = self.secondary.backend_name(), error = %e, "secondary storage read failed");
                Ok(partial)
            }
        }
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        self.mirror("delete_many", |backend| backend.delete_many(keys))
    }

    fn backend_name(&self) -> &'static str {
        "mirrored"
    }
}
