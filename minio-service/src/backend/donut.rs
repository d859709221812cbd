//! Multi-path persistent backend.
//!
//! A donut spreads over one or more directories ("disks"). Every object is mirrored to all disks:
//! the payload is streamed into a temporary file on the first disk, copied to the others, synced
//! and then renamed into place. Reads are served from the first disk holding the object.
//!
//! Renames are not atomic across disks. While committing, a replaced object is parked next to the
//! temporary files, and if any disk fails, the disks committed so far are restored. Mirrors only
//! diverge if that restore fails as well, which is logged.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::{ReaderStream, StreamReader};

use super::common::{Backend, GetResponse, ObjectInfo};
use crate::PayloadStream;
use crate::error::{Result, ServiceError};
use crate::path::ObjectPath;

/// Directory below each disk that holds in-flight uploads.
///
/// Buckets cannot start with a `.`, so this never collides with object data.
const TMP_DIR: &str = ".minio.sys/tmp";

static NEXT_UPLOAD: AtomicU64 = AtomicU64::new(0);

/// A [`Backend`] mirroring objects across one or more directories.
#[derive(Debug)]
pub struct DonutBackend {
    disks: Vec<PathBuf>,
}

impl DonutBackend {
    /// Opens a donut over the given paths, creating missing directories.
    ///
    /// Repeated paths are collapsed into a single disk. At least one path is required.
    pub async fn open(paths: &[PathBuf]) -> Result<Self> {
        if paths.is_empty() {
            return Err(no_disks());
        }

        let mut disks: Vec<PathBuf> = Vec::with_capacity(paths.len());
        for path in paths {
            if disks.contains(path) {
                tracing::warn!(path = %path.display(), "ignoring duplicate donut path");
                continue;
            }

            tokio::fs::create_dir_all(path.join(TMP_DIR)).await?;
            tracing::info!(path = %path.display(), "opened donut disk");
            disks.push(path.clone());
        }

        Ok(Self { disks })
    }

    /// The distinct disks backing this donut, in configuration order.
    pub fn disks(&self) -> &[PathBuf] {
        &self.disks
    }

    fn tmp_path(disk: &Path, upload: u64, suffix: &str) -> PathBuf {
        disk.join(TMP_DIR)
            .join(format!("{}-{upload}{suffix}", std::process::id()))
    }
}

/// One disk's copy of an object being committed.
#[derive(Debug)]
struct Staged {
    tmp: PathBuf,
    /// Where the replaced object is parked until the commit completes.
    backup: PathBuf,
    target: PathBuf,
    backed_up: bool,
    committed: bool,
}

impl Staged {
    async fn commit(&mut self) -> Result<()> {
        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.backed_up = rename_if_exists(&self.target, &self.backup).await?;
        tokio::fs::rename(&self.tmp, &self.target).await?;
        self.committed = true;
        Ok(())
    }

    async fn roll_back(&self) {
        if self.committed {
            if let Err(error) = remove_if_exists(&self.target).await {
                tracing::warn!(path = %self.target.display(), %error, "failed to roll back object");
            }
        }
        if self.backed_up {
            if let Err(error) = tokio::fs::rename(&self.backup, &self.target).await {
                tracing::warn!(path = %self.target.display(), %error, "failed to restore object");
            }
        }
    }
}

fn no_disks() -> ServiceError {
    std::io::Error::new(ErrorKind::InvalidInput, "donut requires at least one path").into()
}

async fn write_stream(path: &Path, stream: PayloadStream) -> Result<u64> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let mut reader = pin!(StreamReader::new(stream));
    let mut writer = BufWriter::new(file);

    let size = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.flush().await?;
    writer.into_inner().sync_data().await?;

    Ok(size)
}

async fn copy_synced(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::copy(from, to).await?;
    File::open(to).await?.sync_data().await?;
    Ok(())
}

/// Commits every staged copy, or none of them.
async fn commit_all(staged: &mut [Staged]) -> Result<()> {
    for index in 0..staged.len() {
        if let Err(error) = staged[index].commit().await {
            for entry in staged[..=index].iter().rev() {
                entry.roll_back().await;
            }
            return Err(error);
        }
    }

    for entry in staged.iter() {
        remove_if_exists(&entry.backup).await.ok();
    }
    Ok(())
}

/// Renames `from` to `to`, returning `false` if `from` does not exist.
async fn rename_if_exists(from: &Path, to: &Path) -> std::io::Result<bool> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

#[async_trait::async_trait]
impl Backend for DonutBackend {
    fn name(&self) -> &'static str {
        "donut"
    }

    async fn put_object(&self, path: &ObjectPath, stream: PayloadStream) -> Result<ObjectInfo> {
        let upload = NEXT_UPLOAD.fetch_add(1, Ordering::Relaxed);
        let relative = path.to_relative_path();
        let mut staged: Vec<_> = self
            .disks
            .iter()
            .map(|disk| Staged {
                tmp: Self::tmp_path(disk, upload, ""),
                backup: Self::tmp_path(disk, upload, ".old"),
                target: disk.join(&relative),
                backed_up: false,
                committed: false,
            })
            .collect();

        let result = async {
            let (first, rest) = staged.split_first().ok_or_else(no_disks)?;
            let size = write_stream(&first.tmp, stream).await?;
            for entry in rest {
                copy_synced(&first.tmp, &entry.tmp).await?;
            }
            commit_all(&mut staged).await?;
            Ok::<_, ServiceError>(size)
        }
        .await;

        if result.is_err() {
            for entry in &staged {
                remove_if_exists(&entry.tmp).await.ok();
            }
        }

        let size = result?;
        tracing::debug!(%path, size, disks = self.disks.len(), "stored object");
        Ok(ObjectInfo { size })
    }

    async fn get_object(&self, path: &ObjectPath) -> Result<GetResponse> {
        let relative = path.to_relative_path();

        for disk in &self.disks {
            let file = match File::open(disk.join(&relative)).await {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            let metadata = file.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let info = ObjectInfo {
                size: metadata.len(),
            };
            return Ok(Some((info, ReaderStream::new(file).boxed())));
        }

        Ok(None)
    }

    async fn delete_object(&self, path: &ObjectPath) -> Result<()> {
        let relative = path.to_relative_path();
        for disk in &self.disks {
            remove_if_exists(&disk.join(&relative)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream;

    fn path(key: &str) -> ObjectPath {
        ObjectPath::new("testing", key).unwrap()
    }

    #[tokio::test]
    async fn mirrors_objects_to_every_disk() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let backend = DonutBackend::open(&[first.path().into(), second.path().into()])
            .await
            .unwrap();

        let info = backend
            .put_object(&path("nested/key"), stream::from_bytes(&b"oh hai!"[..]))
            .await
            .unwrap();
        assert_eq!(info.size, 7);

        for disk in [first.path(), second.path()] {
            let contents = std::fs::read(disk.join("testing/nested/key")).unwrap();
            assert_eq!(contents, b"oh hai!");
        }
    }

    #[tokio::test]
    async fn reads_from_any_disk_holding_the_object() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let backend = DonutBackend::open(&[first.path().into(), second.path().into()])
            .await
            .unwrap();

        backend
            .put_object(&path("key"), stream::from_bytes(&b"oh hai!"[..]))
            .await
            .unwrap();
        std::fs::remove_file(first.path().join("testing/key")).unwrap();

        let (info, payload) = backend.get_object(&path("key")).await.unwrap().unwrap();
        assert_eq!(info.size, 7);
        assert_eq!(stream::collect(payload).await.unwrap().as_ref(), b"oh hai!");
    }

    #[tokio::test]
    async fn collapses_duplicate_paths() {
        let disk = tempfile::tempdir().unwrap();
        let backend = DonutBackend::open(&[disk.path().into(), disk.path().into()])
            .await
            .unwrap();

        assert_eq!(backend.disks(), &[disk.path().to_path_buf()]);

        backend
            .put_object(&path("key"), stream::from_bytes(&b"once"[..]))
            .await
            .unwrap();
        assert!(backend.get_object(&path("key")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn overwrites_and_deletes() {
        let disk = tempfile::tempdir().unwrap();
        let backend = DonutBackend::open(&[disk.path().into()]).await.unwrap();

        backend
            .put_object(&path("key"), stream::from_bytes(&b"first"[..]))
            .await
            .unwrap();
        backend
            .put_object(&path("key"), stream::from_bytes(&b"second"[..]))
            .await
            .unwrap();

        let (_, payload) = backend.get_object(&path("key")).await.unwrap().unwrap();
        assert_eq!(stream::collect(payload).await.unwrap().as_ref(), b"second");

        backend.delete_object(&path("key")).await.unwrap();
        assert!(backend.get_object(&path("key")).await.unwrap().is_none());

        // Deleting again is not an error.
        backend.delete_object(&path("key")).await.unwrap();
    }

    #[tokio::test]
    async fn failed_commit_restores_previous_objects() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let backend = DonutBackend::open(&[first.path().into(), second.path().into()])
            .await
            .unwrap();

        backend
            .put_object(&path("nested/key"), stream::from_bytes(&b"old"[..]))
            .await
            .unwrap();

        // A file in place of the parent directory makes the second disk fail to commit.
        std::fs::remove_dir_all(second.path().join("testing/nested")).unwrap();
        std::fs::write(second.path().join("testing/nested"), b"blocker").unwrap();

        let result = backend
            .put_object(&path("nested/key"), stream::from_bytes(&b"new"[..]))
            .await;
        assert!(result.is_err());

        let contents = std::fs::read(first.path().join("testing/nested/key")).unwrap();
        assert_eq!(contents, b"old");

        for disk in [first.path(), second.path()] {
            let leftovers = std::fs::read_dir(disk.join(TMP_DIR)).unwrap().count();
            assert_eq!(leftovers, 0, "{}", disk.display());
        }
    }

    #[tokio::test]
    async fn requires_a_path() {
        assert!(DonutBackend::open(&[]).await.is_err());
    }

    #[tokio::test]
    async fn missing_objects_are_none() {
        let disk = tempfile::tempdir().unwrap();
        let backend = DonutBackend::open(&[disk.path().into()]).await.unwrap();

        assert!(backend.get_object(&path("nope")).await.unwrap().is_none());
    }
}
