//! Local disk storage backend

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{ByteStream, StorageBackend, StoredObject, validate_key};
use crate::error::StorageError;

/// Local disk storage backend
///
/// Stores files in a sharded directory structure:
/// `<base_path>/documents/<first 2 chars>/<key>`
pub struct LocalStorage {
    base_path: PathBuf,
    uploads_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        let uploads_path = base_path.join("uploads");

        fs::create_dir_all(&uploads_path).await?;
        fs::create_dir_all(base_path.join("documents")).await?;

        info!("Initialized local storage at {:?}", base_path);

        Ok(Self {
            base_path,
            uploads_path,
        })
    }

    /// Get the file path for a key
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;

        let shard = &key[..2];
        Ok(self.base_path.join("documents").join(shard).join(key))
    }

    /// Fresh temp file path; concurrent writes to one key never share it
    fn temp_path(&self) -> PathBuf {
        self.uploads_path.join(format!("{}.tmp", Uuid::new_v4()))
    }

    async fn open(&self, key: &str) -> Result<File, StorageError> {
        let path = self.object_path(key)?;
        File::open(&path).await.map_err(|e| not_found_or_io(e, key))
    }

    /// Move a finished temp file into place
    async fn commit(&self, temp_path: &Path, key: &str) -> Result<PathBuf, StorageError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(temp_path, &path).await {
            discard(temp_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(path)
    }
}

fn not_found_or_io(e: std::io::Error, key: &str) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(e)
    }
}

async fn discard(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        warn!("Failed to remove temp file {:?}: {}", temp_path, e);
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn size(&self, key: &str) -> Result<u64, StorageError> {
        let path = self.object_path(key)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(e, key))?;
        Ok(metadata.len())
    }

    async fn stream(&self, key: &str) -> Result<ByteStream, StorageError> {
        let file = self.open(key).await?;
        debug!("Streaming document file {}", key);

        let stream = tokio_util::io::ReaderStream::new(BufReader::new(file));
        Ok(Box::pin(stream.map(|result| result.map_err(StorageError::Io))))
    }

    async fn write_stream(
        &self,
        key: &str,
        mut stream: ByteStream,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;

        let temp_path = self.temp_path();
        let mut file = File::create(&temp_path).await?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    discard(&temp_path).await;
                    return Err(e);
                }
            };
            hasher.update(&chunk);
            size += chunk.len() as u64;
            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                discard(&temp_path).await;
                return Err(StorageError::Io(e));
            }
        }

        file.flush().await?;
        drop(file);

        let path = self.commit(&temp_path, key).await?;
        debug!("Streamed {} bytes to {:?}", size, path);

        Ok(StoredObject {
            path: path.to_string_lossy().to_string(),
            size,
            checksum: hex::encode(hasher.finalize()),
        })
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = self.object_path(from)?;
        let target = self.object_path(to)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&source, &target)
            .await
            .map_err(|e| not_found_or_io(e, from))?;
        debug!("Moved {:?} to {:?}", source, target);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(key)?;
        debug!("Deleting document file at {:?}", path);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
