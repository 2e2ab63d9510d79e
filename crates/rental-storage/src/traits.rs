//! Storage trait definitions.

use crate::StorageResult;

/// Trait for durable key/value backends.
///
/// Each call is atomic for its key. No guarantee spans several keys.
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
}

impl<S: SecureStorage + ?Sized> SecureStorage for std::sync::Arc<S> {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        (**self).delete(key)
    }
}
