use async_trait::async_trait;
use bytes::Bytes;
use lapse_types::ObjectId;
use tokio::io::AsyncRead;

use crate::error::StoreResult;

/// Raw persistence for object content and metadata documents.
///
/// A backend knows nothing about expiry. It stores two independent entries
/// per object, an opaque content blob and a metadata document, and the
/// [`EphemeralStore`](crate::EphemeralStore) layered on top decides what they
/// mean.
///
/// Implementations must satisfy:
/// - A completed `write_*` is visible in full to every later `read_*`; a
///   partially written entry is never observable.
/// - `read_*` returns `Ok(None)` for a missing entry and reserves `Err` for
///   real failures.
/// - `remove_*` on a missing entry succeeds and returns `false`.
#[async_trait]
pub trait ObjectBackend: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Drain `content` into the blob for `id` and return the byte count.
    async fn write_blob(
        &self,
        id: &ObjectId,
        content: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<u64>;

    /// Read the whole blob for `id`.
    async fn read_blob(&self, id: &ObjectId) -> StoreResult<Option<Bytes>>;

    /// Remove the blob for `id`. Returns `true` if it existed.
    async fn remove_blob(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Write the metadata document for `id`.
    async fn write_metadata(&self, id: &ObjectId, document: &[u8]) -> StoreResult<()>;

    /// Read the metadata document for `id`.
    async fn read_metadata(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>>;

    /// Remove the metadata document for `id`. Returns `true` if it existed.
    async fn remove_metadata(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Every id that currently has a metadata document, in ascending order.
    async fn list_metadata(&self) -> StoreResult<Vec<ObjectId>>;
}
