use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use lapse_types::ObjectId;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::backend::ObjectBackend;
use crate::error::{StoreError, StoreResult};

/// In-memory backend.
///
/// Intended for tests and embedding. Blobs and metadata documents live in two
/// maps behind `RwLock`s; entries are inserted only after the content has
/// been fully read, so a partial write is never visible.
pub struct InMemoryBackend {
    blobs: RwLock<HashMap<ObjectId, Bytes>>,
    metadata: RwLock<HashMap<ObjectId, Vec<u8>>>,
    fail_metadata_writes: AtomicBool,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            fail_metadata_writes: AtomicBool::new(false),
        }
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Number of stored metadata documents.
    pub fn metadata_count(&self) -> usize {
        self.metadata.read().expect("lock poisoned").len()
    }

    /// Make every subsequent `write_metadata` fail with an I/O error.
    pub fn set_fail_metadata_writes(&self, fail: bool) {
        self.fail_metadata_writes.store(fail, Ordering::SeqCst);
    }

    /// Store a raw metadata document, bypassing the store. Used to plant
    /// corrupt or hand-crafted records.
    pub fn insert_raw_metadata(&self, id: ObjectId, document: impl Into<Vec<u8>>) {
        self.metadata
            .write()
            .expect("lock poisoned")
            .insert(id, document.into());
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("blobs", &self.blob_count())
            .field("metadata", &self.metadata_count())
            .finish()
    }
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write_blob(
        &self,
        id: &ObjectId,
        content: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<u64> {
        let mut buf = Vec::new();
        content
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StoreError::io("reading upload content", e))?;
        let len = buf.len() as u64;
        self.blobs
            .write()
            .expect("lock poisoned")
            .insert(*id, Bytes::from(buf));
        Ok(len)
    }

    async fn read_blob(&self, id: &ObjectId) -> StoreResult<Option<Bytes>> {
        Ok(self.blobs.read().expect("lock poisoned").get(id).cloned())
    }

    async fn remove_blob(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.blobs.write().expect("lock poisoned").remove(id).is_some())
    }

    async fn write_metadata(&self, id: &ObjectId, document: &[u8]) -> StoreResult<()> {
        if self.fail_metadata_writes.load(Ordering::SeqCst) {
            return Err(StoreError::io(
                "writing metadata",
                std::io::Error::other("injected metadata write failure"),
            ));
        }
        self.insert_raw_metadata(*id, document);
        Ok(())
    }

    async fn read_metadata(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.metadata.read().expect("lock poisoned").get(id).cloned())
    }

    async fn remove_metadata(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.metadata.write().expect("lock poisoned").remove(id).is_some())
    }

    async fn list_metadata(&self) -> StoreResult<Vec<ObjectId>> {
        let map = self.metadata.read().expect("lock poisoned");
        let mut ids: Vec<ObjectId> = map.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
