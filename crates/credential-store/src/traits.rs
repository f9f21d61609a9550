//! Storage backend trait.

use crate::StorageResult;

/// A key/value backend able to hold credentials.
///
/// Backends are synchronous and cheap to call from async code; the file
/// backend touches a single small JSON document.
pub trait SecureStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Store several values as one unit.
    ///
    /// The default writes sequentially and rolls back the keys it managed to
    /// write if a later one fails. Backends that can commit atomically
    /// override this.
    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        for (index, (key, value)) in entries.iter().enumerate() {
            if let Err(e) = self.set(key, value) {
                for (written, _) in &entries[..index] {
                    let _ = self.delete(written);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Read several values in one pass.
    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Delete several keys. Every key is attempted; the first error is returned.
    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.delete(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Short label used in log lines.
    fn backend_name(&self) -> &'static str;
}
