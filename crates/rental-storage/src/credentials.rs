//! Typed accessors for the session credentials.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use serde::{de::DeserializeOwned, Serialize};

/// High-level API over the three credential keys.
///
/// Only the session layer writes the token keys. The user record is a cache
/// of the remote profile and may also be rewritten by favorite toggles.
pub struct CredentialStore {
    storage: Box<dyn SecureStorage>,
}

impl CredentialStore {
    /// Create a credential store on top of the given backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    // ==========================================
    // Tokens
    // ==========================================

    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::ACCESS_TOKEN, token)
    }

    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::REFRESH_TOKEN, token)
    }

    /// Replace the active token pair.
    ///
    /// The refresh token is written first and only when one is supplied; an
    /// absent refresh token keeps the stored one. The access token goes last,
    /// so a reader that sees the new access token also sees its refresh token.
    /// If the access token cannot be written, the previous refresh token is
    /// put back so the stored pair stays consistent.
    pub fn set_token_pair(&self, access_token: &str, refresh_token: Option<&str>) -> StorageResult<()> {
        let Some(refresh) = refresh_token else {
            return self.set_access_token(access_token);
        };

        let previous_refresh = self.get_refresh_token()?;
        self.set_refresh_token(refresh)?;

        if let Err(e) = self.set_access_token(access_token) {
            self.restore_refresh_token(previous_refresh.as_deref());
            return Err(e);
        }
        Ok(())
    }

    /// Install a token pair from a fresh sign-in.
    ///
    /// Unlike [`CredentialStore::set_token_pair`], an absent refresh token
    /// removes the stored one, since it belongs to an earlier sign-in. The
    /// removal is undone if the access token cannot be written.
    pub fn replace_token_pair(&self, access_token: &str, refresh_token: Option<&str>) -> StorageResult<()> {
        if refresh_token.is_some() {
            return self.set_token_pair(access_token, refresh_token);
        }

        let previous_refresh = self.get_refresh_token()?;
        self.storage.delete(StorageKeys::REFRESH_TOKEN)?;

        if let Err(e) = self.set_access_token(access_token) {
            self.restore_refresh_token(previous_refresh.as_deref());
            return Err(e);
        }
        Ok(())
    }

    fn restore_refresh_token(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(previous) => self.set_refresh_token(previous),
            None => self.storage.delete(StorageKeys::REFRESH_TOKEN).map(|_| ()),
        };
        if let Err(e) = restored {
            tracing::error!(error = %e, "Failed to restore previous refresh token");
        }
    }

    // ==========================================
    // Cached user record
    // ==========================================

    /// Store the cached user record as JSON
    pub fn set_user<T: Serialize>(&self, user: &T) -> StorageResult<()> {
        let json = serde_json::to_string(user).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::USER_DATA, &json)
    }

    /// Retrieve the cached user record
    pub fn get_user<T: DeserializeOwned>(&self) -> StorageResult<Option<T>> {
        match self.storage.get(StorageKeys::USER_DATA)? {
            Some(json) => {
                let user = serde_json::from_str(&json).map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    // ==========================================
    // Clear All
    // ==========================================

    /// Delete every credential key.
    ///
    /// All deletes are attempted even if one fails; the first failure is
    /// returned afterwards.
    pub fn clear_all(&self) -> StorageResult<()> {
        let mut first_error = None;
        for key in StorageKeys::ALL {
            if let Err(e) = self.storage.delete(key) {
                tracing::warn!(key = %key, error = %e, "Failed to delete credential");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use serde::Deserialize;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct CachedUser {
        id: String,
        favorites: Vec<String>,
    }

    /// Backend that records write order and can refuse writes or deletes of one key.
    #[derive(Default)]
    struct RecordingStorage {
        inner: MemoryStorage,
        writes: Mutex<Vec<String>>,
        fail_set: Option<&'static str>,
        fail_delete: Option<&'static str>,
    }

    impl SecureStorage for RecordingStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            if self.fail_set == Some(key) {
                return Err(StorageError::Backend("write refused".to_string()));
            }
            self.writes.lock().unwrap().push(key.to_string());
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            if self.fail_delete == Some(key) {
                return Err(StorageError::Backend("delete refused".to_string()));
            }
            self.inner.delete(key)
        }
    }

    #[test]
    fn test_token_pair_writes_refresh_before_access() {
        let storage = Arc::new(RecordingStorage::default());
        let store = CredentialStore::new(Box::new(storage.clone()));

        store.set_token_pair("access-1", Some("refresh-1")).unwrap();

        assert_eq!(
            *storage.writes.lock().unwrap(),
            vec![StorageKeys::REFRESH_TOKEN.to_string(), StorageKeys::ACCESS_TOKEN.to_string()]
        );
        assert_eq!(store.get_access_token().unwrap(), Some("access-1".to_string()));
        assert_eq!(store.get_refresh_token().unwrap(), Some("refresh-1".to_string()));
    }

    #[test]
    fn test_failed_access_write_restores_previous_refresh() {
        let storage = Arc::new(RecordingStorage {
            fail_set: Some(StorageKeys::ACCESS_TOKEN),
            ..Default::default()
        });
        storage.inner.set(StorageKeys::ACCESS_TOKEN, "access-0").unwrap();
        storage.inner.set(StorageKeys::REFRESH_TOKEN, "refresh-0").unwrap();
        let store = CredentialStore::new(Box::new(storage.clone()));

        assert!(store.set_token_pair("access-1", Some("refresh-1")).is_err());

        assert_eq!(store.get_access_token().unwrap(), Some("access-0".to_string()));
        assert_eq!(store.get_refresh_token().unwrap(), Some("refresh-0".to_string()));
    }

    #[test]
    fn test_token_pair_without_refresh_keeps_previous() {
        let store = CredentialStore::new(Box::new(MemoryStorage::new()));
        store.set_token_pair("access-1", Some("refresh-1")).unwrap();

        store.set_token_pair("access-2", None).unwrap();

        assert_eq!(store.get_access_token().unwrap(), Some("access-2".to_string()));
        assert_eq!(store.get_refresh_token().unwrap(), Some("refresh-1".to_string()));
    }

    #[test]
    fn test_replace_token_pair_without_refresh_drops_stored_one() {
        let store = CredentialStore::new(Box::new(MemoryStorage::new()));
        store.set_token_pair("access-1", Some("refresh-1")).unwrap();

        store.replace_token_pair("access-2", None).unwrap();

        assert_eq!(store.get_access_token().unwrap(), Some("access-2".to_string()));
        assert_eq!(store.get_refresh_token().unwrap(), None);
    }

    #[test]
    fn test_replace_token_pair_restores_refresh_when_access_write_fails() {
        let storage = Arc::new(RecordingStorage {
            fail_set: Some(StorageKeys::ACCESS_TOKEN),
            ..Default::default()
        });
        storage.inner.set(StorageKeys::ACCESS_TOKEN, "access-0").unwrap();
        storage.inner.set(StorageKeys::REFRESH_TOKEN, "refresh-0").unwrap();
        let store = CredentialStore::new(Box::new(storage.clone()));

        assert!(store.replace_token_pair("access-1", None).is_err());

        assert_eq!(store.get_access_token().unwrap(), Some("access-0".to_string()));
        assert_eq!(store.get_refresh_token().unwrap(), Some("refresh-0".to_string()));
    }

    #[test]
    fn test_user_record_roundtrip() {
        let store = CredentialStore::new(Box::new(MemoryStorage::new()));
        assert_eq!(store.get_user::<CachedUser>().unwrap(), None);

        let user = CachedUser {
            id: "u1".to_string(),
            favorites: vec!["L1".to_string()],
        };
        store.set_user(&user).unwrap();

        assert_eq!(store.get_user::<CachedUser>().unwrap(), Some(user));
    }

    #[test]
    fn test_corrupt_user_record_is_encoding_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(StorageKeys::USER_DATA, "{not json").unwrap();
        let store = CredentialStore::new(Box::new(storage));

        assert!(matches!(
            store.get_user::<CachedUser>(),
            Err(StorageError::Encoding(_))
        ));
    }

    #[test]
    fn test_clear_all_attempts_every_key() {
        let storage = Arc::new(RecordingStorage {
            fail_delete: Some(StorageKeys::ACCESS_TOKEN),
            ..Default::default()
        });
        let store = CredentialStore::new(Box::new(storage.clone()));
        store.set_token_pair("access", Some("refresh")).unwrap();
        store
            .set_user(&CachedUser {
                id: "u1".to_string(),
                favorites: vec![],
            })
            .unwrap();

        assert!(matches!(store.clear_all(), Err(StorageError::Backend(_))));
        assert!(!storage.has(StorageKeys::REFRESH_TOKEN).unwrap());
        assert!(!storage.has(StorageKeys::USER_DATA).unwrap());
    }
}
