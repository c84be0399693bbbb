use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use lapse_types::ObjectId;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::backend::ObjectBackend;
use crate::error::{StoreError, StoreResult};

const METADATA_DIR: &str = "metadata";
const FILES_DIR: &str = "files";
const METADATA_EXT: &str = "json";

/// Filesystem backend.
///
/// Layout under `root`:
///
/// ```text
/// metadata/<id>.json   metadata document
/// files/<id>           content blob
/// ```
///
/// Paths are derived only from the hex form of an [`ObjectId`], so no
/// caller-supplied string ever reaches the filesystem. Every write goes to a
/// dot-prefixed temporary file in the same directory and is renamed into
/// place, so readers and the sweep never see a partial entry.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    metadata_dir: PathBuf,
    files_dir: PathBuf,
}

impl FsBackend {
    /// Open (creating if needed) a backend rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let metadata_dir = root.join(METADATA_DIR);
        let files_dir = root.join(FILES_DIR);
        for dir in [&metadata_dir, &files_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io(format!("creating {}", dir.display()), e))?;
        }
        debug!(root = %root.display(), "filesystem backend opened");
        Ok(Self {
            root,
            metadata_dir,
            files_dir,
        })
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self, id: &ObjectId) -> PathBuf {
        self.metadata_dir.join(format!("{}.{METADATA_EXT}", id.to_hex()))
    }

    fn blob_path(&self, id: &ObjectId) -> PathBuf {
        self.files_dir.join(id.to_hex())
    }
}

/// Sibling path for an in-progress write. The leading dot and the suffix keep
/// it out of `list_metadata`.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp.{}", Uuid::now_v7()))
}

async fn remove_if_present(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(format!("removing {}", path.display()), e)),
    }
}

async fn read_if_present(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(format!("reading {}", path.display()), e)),
    }
}

/// Write via temp file, fsync, rename. The temp file is removed on failure.
async fn write_atomic(
    path: &Path,
    content: &mut (dyn AsyncRead + Unpin + Send),
) -> StoreResult<u64> {
    let temp = temp_path_for(path);
    let result = async {
        let mut file = fs::File::create(&temp).await?;
        let written = tokio::io::copy(&mut *content, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp, path).await?;
        Ok::<_, std::io::Error>(written)
    }
    .await;

    match result {
        Ok(written) => Ok(written),
        Err(e) => {
            let _ = fs::remove_file(&temp).await;
            Err(StoreError::io(format!("writing {}", path.display()), e))
        }
    }
}

#[async_trait]
impl ObjectBackend for FsBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self, content), fields(backend = "filesystem"))]
    async fn write_blob(
        &self,
        id: &ObjectId,
        content: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<u64> {
        write_atomic(&self.blob_path(id), content).await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn read_blob(&self, id: &ObjectId) -> StoreResult<Option<Bytes>> {
        Ok(read_if_present(&self.blob_path(id)).await?.map(Bytes::from))
    }

    async fn remove_blob(&self, id: &ObjectId) -> StoreResult<bool> {
        remove_if_present(&self.blob_path(id)).await
    }

    #[instrument(skip(self, document), fields(backend = "filesystem", len = document.len()))]
    async fn write_metadata(&self, id: &ObjectId, document: &[u8]) -> StoreResult<()> {
        let mut reader = document;
        write_atomic(&self.metadata_path(id), &mut reader).await?;
        Ok(())
    }

    async fn read_metadata(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>> {
        read_if_present(&self.metadata_path(id)).await
    }

    async fn remove_metadata(&self, id: &ObjectId) -> StoreResult<bool> {
        remove_if_present(&self.metadata_path(id)).await
    }

    async fn list_metadata(&self) -> StoreResult<Vec<ObjectId>> {
        let mut entries = fs::read_dir(&self.metadata_dir)
            .await
            .map_err(|e| StoreError::io("listing metadata directory", e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("listing metadata directory", e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            match ObjectId::from_hex(stem) {
                Ok(id) => ids.push(id),
                Err(_) => debug!(file = name, "ignoring foreign file in metadata directory"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
