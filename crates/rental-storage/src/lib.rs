//! Durable credential storage for the rental client.
//!
//! The session core only needs an opaque key/value store with atomic
//! per-key get/set/delete. This crate provides:
//! - [`SecureStorage`], the backend trait
//! - [`MemoryStorage`] for ephemeral sessions and tests
//! - [`FileStorage`], a JSON file written atomically through a temp file
//! - [`CredentialStore`], typed accessors for the three credential keys

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

pub use credentials::CredentialStore;
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
