use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use lapse_types::{Clock, ObjectId, ObjectRecord, SystemClock};
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::ObjectBackend;
use crate::config::{StoreConfig, DEFAULT_TTL};
use crate::error::{StoreError, StoreResult};
use crate::fs::FsBackend;
use crate::reaper::{spawn_reaper, SweepReport};

/// Object store in which every object expires.
///
/// Cheap to clone; clones share the backend, the clock and the background
/// reclamation task.
///
/// Expiry is enforced two ways. A read of an expired object fails with
/// [`StoreError::Expired`] and schedules its removal; independently, a
/// background loop sweeps all metadata every `sweep_interval` and removes
/// whatever has expired. An object is expired once `now >= expires_at`.
#[derive(Clone)]
pub struct EphemeralStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    backend: Arc<dyn ObjectBackend>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    /// Serializes deletions so a sweep and an explicit delete of the same
    /// object never interleave their two removals.
    delete_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

/// Builder for [`EphemeralStore`].
pub struct StoreBuilder {
    backend: Arc<dyn ObjectBackend>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    sweep_interval: Option<Duration>,
}

impl StoreBuilder {
    /// Read time from `clock` instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// TTL applied when a create omits one.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Run background reclamation every `interval`. A zero interval leaves
    /// reclamation off.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval).filter(|d| !d.is_zero());
        self
    }

    /// Build the store. Spawns the reclamation task if an interval was set,
    /// which requires a Tokio runtime.
    pub fn build(self) -> EphemeralStore {
        let inner = Arc::new(StoreInner {
            backend: self.backend,
            clock: self.clock,
            default_ttl: self.default_ttl,
            delete_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            reaper: Mutex::new(None),
        });

        if let Some(interval) = self.sweep_interval {
            let handle = spawn_reaper(Arc::downgrade(&inner), inner.cancel.clone(), interval);
            *inner.reaper.lock().expect("lock poisoned") = Some(handle);
        }

        EphemeralStore { inner }
    }
}

impl EphemeralStore {
    /// Start building a store over `backend`.
    pub fn builder(backend: Arc<dyn ObjectBackend>) -> StoreBuilder {
        StoreBuilder {
            backend,
            clock: Arc::new(SystemClock),
            default_ttl: DEFAULT_TTL,
            sweep_interval: None,
        }
    }

    /// Open a filesystem-backed store and start background reclamation.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let backend = FsBackend::new(&config.root).await?;
        info!(
            root = %config.root.display(),
            default_ttl = ?config.default_ttl,
            sweep_interval = ?config.sweep_interval,
            "store opened"
        );
        Ok(Self::builder(Arc::new(backend))
            .default_ttl(config.default_ttl)
            .sweep_interval(config.sweep_interval)
            .build())
    }

    /// Open a filesystem-backed store at `root` with default timings.
    pub async fn open_at(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(&StoreConfig::with_root(root.as_ref())).await
    }

    /// The TTL applied when a create omits one.
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    // ------------------------------------------------------------------
    // Object operations
    // ------------------------------------------------------------------

    /// Store `content` under a fresh identifier.
    ///
    /// `ttl` of `None` or zero means the default TTL. The content is drained
    /// before the metadata is written; if writing the metadata fails the blob
    /// is removed again, so a failed create leaves nothing behind.
    pub async fn create<R>(
        &self,
        mut content: R,
        name: &str,
        content_type: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<ObjectRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let ttl = ttl.filter(|t| !t.is_zero()).unwrap_or(self.inner.default_ttl);
        let ttl_delta = chrono::Duration::from_std(ttl).map_err(|_| StoreError::InvalidTtl(ttl))?;

        let id = ObjectId::generate();
        let size = self.inner.backend.write_blob(&id, &mut content).await?;

        let result = async {
            let upload_time = self.inner.clock.now();
            let record = ObjectRecord::new(id, name, size, content_type, upload_time, ttl_delta)
                .map_err(|_| StoreError::InvalidTtl(ttl))?;
            self.inner.backend.write_metadata(&id, &record.to_json()?).await?;
            Ok::<_, StoreError>(record)
        }
        .await;

        match result {
            Ok(record) => {
                debug!(id = %id, size, ttl = ?ttl, "object created");
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = self.inner.backend.remove_blob(&id).await {
                    warn!(id = %id, error = %cleanup, "failed to roll back blob after failed create");
                }
                Err(e)
            }
        }
    }

    /// Store an in-memory buffer.
    pub async fn create_bytes(
        &self,
        content: &[u8],
        name: &str,
        content_type: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<ObjectRecord> {
        self.create(content, name, content_type, ttl).await
    }

    /// Fetch metadata and content.
    ///
    /// An expired object yields [`StoreError::Expired`] and its removal is
    /// scheduled in the background; the caller does not wait for it.
    pub async fn get(&self, id: &ObjectId) -> StoreResult<(ObjectRecord, Bytes)> {
        let record = self.inner.load_record(id).await?;
        if record.is_expired_at(self.inner.clock.now()) {
            self.schedule_delete(*id);
            return Err(StoreError::Expired(*id));
        }

        // Metadata can outlive its blob by an instant during a concurrent
        // delete.
        match self.inner.backend.read_blob(id).await? {
            Some(content) => Ok((record, content)),
            None => Err(StoreError::NotFound(*id)),
        }
    }

    /// Fetch metadata only. Does not trigger removal of an expired object.
    pub async fn get_metadata(&self, id: &ObjectId) -> StoreResult<ObjectRecord> {
        let record = self.inner.load_record(id).await?;
        if record.is_expired_at(self.inner.clock.now()) {
            return Err(StoreError::Expired(*id));
        }
        Ok(record)
    }

    /// Remove an object. Idempotent: deleting a missing object succeeds.
    pub async fn delete(&self, id: &ObjectId) -> StoreResult<()> {
        self.inner.delete(id).await
    }

    /// Returns `true` if the object exists and has not expired.
    pub async fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        match self.get_metadata(id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) | Err(StoreError::Expired(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All live records, ordered by id. Unreadable and expired records are
    /// omitted.
    pub async fn list(&self) -> StoreResult<Vec<ObjectRecord>> {
        let now = self.inner.clock.now();
        let mut records = Vec::new();
        for id in self.inner.backend.list_metadata().await? {
            match self.inner.load_record(&id).await {
                Ok(record) if !record.is_expired_at(now) => records.push(record),
                Ok(_) | Err(StoreError::NotFound(_)) => {}
                Err(e) => debug!(id = %id, error = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Reclamation
    // ------------------------------------------------------------------

    /// Run one reclamation pass now.
    pub async fn sweep_once(&self) -> StoreResult<SweepReport> {
        self.inner.sweep_once().await
    }

    /// Ask the reclamation task to stop. Idempotent; returns immediately.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Stop the reclamation task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.inner.reaper.lock().expect("lock poisoned").take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "reclamation task ended abnormally");
            }
        }
    }

    /// Returns `true` while the reclamation task is alive.
    pub fn is_reclaiming(&self) -> bool {
        self.inner
            .reaper
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn schedule_delete(&self, id: ObjectId) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.delete(&id).await {
                warn!(id = %id, error = %e, "failed to remove expired object");
            }
        });
    }
}

impl std::fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralStore")
            .field("backend", &self.inner.backend.name())
            .field("default_ttl", &self.inner.default_ttl)
            .finish()
    }
}

impl StoreInner {
    async fn load_record(&self, id: &ObjectId) -> StoreResult<ObjectRecord> {
        let document = self
            .backend
            .read_metadata(id)
            .await?
            .ok_or(StoreError::NotFound(*id))?;
        let record = ObjectRecord::from_json(&document)?;
        if record.id != *id {
            return Err(StoreError::Serialization(format!(
                "metadata stored under {id} names {}",
                record.id
            )));
        }
        Ok(record)
    }

    /// Metadata goes first so the object stops being visible before its
    /// content disappears. A missing metadata document is not an error, nor
    /// is a failure to remove it; a missing blob is swallowed.
    async fn delete(&self, id: &ObjectId) -> StoreResult<()> {
        let _guard = self.delete_lock.lock().await;
        if let Err(e) = self.backend.remove_metadata(id).await {
            warn!(id = %id, error = %e, "failed to remove metadata");
        }
        let had_blob = self.backend.remove_blob(id).await?;
        debug!(id = %id, had_blob, "object deleted");
        Ok(())
    }

    pub(crate) async fn sweep_once(&self) -> StoreResult<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for id in self.backend.list_metadata().await? {
            report.scanned += 1;
            let record = match self.load_record(&id).await {
                Ok(record) => record,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => {
                    debug!(id = %id, error = %e, "sweep skipping unreadable record");
                    report.skipped += 1;
                    continue;
                }
            };
            if !record.is_expired_at(now) {
                continue;
            }
            match self.delete(&id).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(id = %id, error = %e, "sweep failed to remove expired object");
                    report.skipped += 1;
                }
            }
        }

        if report.removed > 0 {
            info!(
                scanned = report.scanned,
                removed = report.removed,
                skipped = report.skipped,
                "sweep removed expired objects"
            );
        } else {
            debug!(scanned = report.scanned, skipped = report.skipped, "sweep found nothing to remove");
        }
        Ok(report)
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
