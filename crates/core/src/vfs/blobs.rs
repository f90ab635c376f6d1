use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::node::{BlobId, BlobRef};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(BlobId),
    #[error("blob store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Storage collaborator for raw file content.
///
/// The node store never inspects blob bytes; it only keeps [`BlobRef`]s
/// and asks the store to duplicate or drop them as nodes are copied and
/// deleted. Physical layout is the implementation's concern.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store a blob and return a reference carrying its byte length.
    async fn put(&self, data: Bytes) -> Result<BlobRef, BlobError>;

    async fn get(&self, id: BlobId) -> Result<Bytes, BlobError>;

    async fn delete(&self, id: BlobId) -> Result<(), BlobError>;

    /// Duplicate blob content under a fresh id.
    ///
    /// Copy-on-paste must duplicate bytes, not share references, so a
    /// later delete of the source cannot orphan the copy.
    async fn duplicate(&self, id: BlobId) -> Result<BlobRef, BlobError> {
        let data = self.get(id).await?;
        self.put(data).await
    }
}

/// In-memory blob store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobs {
    inner: Arc<RwLock<HashMap<BlobId, Bytes>>>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_err(e: impl std::fmt::Display) -> BlobError {
    BlobError::Backend(anyhow::anyhow!("failed to acquire lock: {}", e))
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(&self, data: Bytes) -> Result<BlobRef, BlobError> {
        let id = BlobId::generate();
        let len = data.len() as u64;
        let mut inner = self.inner.write().map_err(lock_err)?;
        inner.insert(id, data);
        tracing::debug!("stored blob {} ({} bytes)", id, len);
        Ok(BlobRef { id, len })
    }

    async fn get(&self, id: BlobId) -> Result<Bytes, BlobError> {
        let inner = self.inner.read().map_err(lock_err)?;
        inner.get(&id).cloned().ok_or(BlobError::NotFound(id))
    }

    async fn delete(&self, id: BlobId) -> Result<(), BlobError> {
        let mut inner = self.inner.write().map_err(lock_err)?;
        inner.remove(&id).ok_or(BlobError::NotFound(id))?;
        Ok(())
    }
}
