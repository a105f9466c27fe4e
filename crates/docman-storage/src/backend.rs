//! Storage backend trait

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::error::StorageError;

/// Type alias for a boxed stream of bytes
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Result of a completed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Where the object landed, for metadata tracking
    pub path: String,
    pub size: u64,
    /// Hex-encoded SHA-256 of the content
    pub checksum: String,
}

/// Storage backend trait
///
/// Objects are addressed by an opaque key (the document id). Writes
/// and renames replace any existing object under the target key atomically.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get the size of an object
    async fn size(&self, key: &str) -> Result<u64, StorageError>;

    /// Stream an object
    async fn stream(&self, key: &str) -> Result<ByteStream, StorageError>;

    /// Write an object from a stream, hashing as it goes
    async fn write_stream(&self, key: &str, stream: ByteStream)
    -> Result<StoredObject, StorageError>;

    /// Move the object at `from` onto `to`, replacing whatever `to` held
    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Delete an object; `false` if it did not exist
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Keys become file names, so only ASCII alphanumerics and `-` are allowed
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.len() < 2 || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
