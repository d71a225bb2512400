use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::fs::{create_dir_all, metadata, read_to_string, remove_file, rename, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::error::Result;

const RECORD_SUFFIX: &str = ".launcher.json";

/// Bookkeeping stored next to every cached file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub repository_id: String,
    pub source: String,
    /// hex, of the content as it was written
    pub sha1: String,
    /// last time the file was downloaded or confirmed unchanged by the repository
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug)]
pub struct StoredFile {
    pub path: PathBuf,
    pub size: u64,
    pub sha1: [u8; 20],
    /// true if a previously cached file was replaced
    pub replaced: bool,
}

/// Local file cache, laid out like a Maven repository (i.e. keyed by canonical artifact path).
///
/// Files are written to a temporary file in the target directory and renamed into place once they
///  are complete, so a concurrent reader never observes a partially written file.
pub struct LocalCache {
    root: PathBuf,
}
impl LocalCache {
    pub fn new(root: PathBuf) -> LocalCache {
        LocalCache {
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, canonical_path: &str) -> PathBuf {
        self.root.join(canonical_path)
    }

    /// local copy of a repository's metadata file: "maven-metadata.xml" from repository "central"
    ///  becomes "maven-metadata-central.xml"
    pub fn metadata_path_for(&self, metadata_path: &str, repository_id: &str) -> PathBuf {
        let local = match metadata_path.strip_suffix(".xml") {
            Some(base) => format!("{}-{}.xml", base, repository_id),
            None => format!("{}-{}", metadata_path, repository_id),
        };
        self.root.join(local)
    }

    /// size of the cached file, None if there is none
    pub async fn file_size(&self, canonical_path: &str) -> Result<Option<u64>> {
        match metadata(self.path_for(canonical_path)).await {
            Ok(m) if m.is_file() => Ok(Some(m.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn modified(&self, path: &Path) -> Option<SystemTime> {
        metadata(path).await
            .and_then(|m| m.modified())
            .ok()
    }

    /// The record is advisory: a missing or unreadable record is treated as absent
    pub async fn read_record(&self, canonical_path: &str) -> Option<CacheRecord> {
        let path = record_path(&self.path_for(canonical_path));
        let json = read_to_string(&path).await.ok()?;
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("ignoring unreadable cache record {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn write_record(&self, canonical_path: &str, record: &CacheRecord) -> Result<()> {
        let path = record_path(&self.path_for(canonical_path));
        let json = serde_json::to_vec_pretty(record)?;
        self.write_atomically(&path, futures::stream::iter([Ok(Bytes::from(json))])).await?;
        Ok(())
    }

    /// Stores `data` at the canonical path. If the stream yields an error (e.g. because of a
    ///  checksum mismatch detected at its end), nothing is stored and an existing file is left
    ///  untouched.
    pub async fn store(&self, canonical_path: &str, data: impl Stream<Item = Result<Bytes>> + Send) -> Result<StoredFile> {
        let path = self.path_for(canonical_path);
        let replaced = metadata(&path).await.is_ok();
        let (size, sha1) = self.write_atomically(&path, data).await?;
        Ok(StoredFile {
            path,
            size,
            sha1,
            replaced,
        })
    }

    /// used for small files like metadata
    pub async fn store_bytes(&self, path: &Path, data: Vec<u8>) -> Result<()> {
        self.write_atomically(path, futures::stream::iter([Ok(Bytes::from(data))])).await?;
        Ok(())
    }

    pub async fn remove(&self, canonical_path: &str) -> Result<()> {
        let path = self.path_for(canonical_path);
        for p in [record_path(&path), path] {
            match remove_file(&p).await {
                Ok(_) => trace!("removed {}", p.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn write_atomically(&self, path: &Path, data: impl Stream<Item = Result<Bytes>> + Send) -> Result<(u64, [u8; 20])> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }

        // NB: the temp file name is unique, so concurrent writers of the same path never share it
        let mut temp_path = path.as_os_str().to_owned();
        temp_path.push(format!(".{}.part", Uuid::new_v4().as_hyphenated()));
        let temp_path = PathBuf::from(temp_path);

        trace!("writing {} via {}", path.display(), temp_path.display());

        match Self::do_write(&temp_path, data).await {
            Ok(result) => {
                rename(&temp_path, path).await?;
                Ok(result)
            }
            Err(e) => {
                if let Err(cleanup) = remove_file(&temp_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        error!("error cleaning up {} after failed write: {}", temp_path.display(), cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn do_write(temp_path: &Path, data: impl Stream<Item = Result<Bytes>> + Send) -> Result<(u64, [u8; 20])> {
        let mut data = Box::pin(data);

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(temp_path)
            .await?;

        let mut hasher: Sha1 = Default::default();
        let mut size = 0u64;

        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok((size, hasher.finalize().into()))
    }
}

fn record_path(file: &Path) -> PathBuf {
    let mut result = file.as_os_str().to_owned();
    result.push(RECORD_SUFFIX);
    PathBuf::from(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn chunks(data: Vec<Result<Bytes>>) -> impl Stream<Item = Result<Bytes>> + Send {
        futures::stream::iter(data)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut result: Vec<String> = std::fs::read_dir(dir).unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        result.sort();
        result
    }

    #[tokio::test]
    async fn test_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().to_path_buf());

        let stored = cache.store("g/a/1.0/a-1.0.jar", chunks(vec![Ok(Bytes::from_static(b"hel")), Ok(Bytes::from_static(b"lo"))])).await.unwrap();
        assert_eq!(stored.size, 5);
        assert_eq!(hex::encode(stored.sha1), HELLO_SHA1);
        assert!(!stored.replaced);
        assert_eq!(std::fs::read(dir.path().join("g/a/1.0/a-1.0.jar")).unwrap(), b"hello");
        assert_eq!(cache.file_size("g/a/1.0/a-1.0.jar").await.unwrap(), Some(5));

        let again = cache.store("g/a/1.0/a-1.0.jar", chunks(vec![Ok(Bytes::from_static(b"hello!"))])).await.unwrap();
        assert!(again.replaced);
        assert_eq!(files_in(&dir.path().join("g/a/1.0")), vec!["a-1.0.jar"]);
    }

    #[tokio::test]
    async fn test_failed_store_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().to_path_buf());

        let result = cache.store("g/a/1.0/a-1.0.jar", chunks(vec![
            Ok(Bytes::from_static(b"hullo")),
            Err(Error::ChecksumMismatch {
                artifact: "g:a:1.0:jar (SHA1)".to_string(),
                expected: HELLO_SHA1.to_string(),
                actual: "00".to_string(),
            }),
        ])).await;

        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        assert_eq!(cache.file_size("g/a/1.0/a-1.0.jar").await.unwrap(), None);
        assert!(files_in(&dir.path().join("g/a/1.0")).is_empty());
    }

    #[tokio::test]
    async fn test_failed_store_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().to_path_buf());
        cache.store("a.jar", chunks(vec![Ok(Bytes::from_static(b"hello"))])).await.unwrap();

        let result = cache.store("a.jar", chunks(vec![Err(Error::unavailable("central", "connection reset"))])).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(dir.path().join("a.jar")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_records() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().to_path_buf());
        assert_eq!(cache.read_record("g/a/1.0/a-1.0.jar").await, None);

        let record = CacheRecord {
            repository_id: "central".to_string(),
            source: "https://repo1.maven.org/maven2/g/a/1.0/a-1.0.jar".to_string(),
            sha1: HELLO_SHA1.to_string(),
            last_checked: Utc::now(),
        };
        cache.write_record("g/a/1.0/a-1.0.jar", &record).await.unwrap();
        assert!(dir.path().join("g/a/1.0/a-1.0.jar.launcher.json").is_file());
        assert_eq!(cache.read_record("g/a/1.0/a-1.0.jar").await, Some(record));

        std::fs::write(dir.path().join("g/a/1.0/a-1.0.jar.launcher.json"), b"{").unwrap();
        assert_eq!(cache.read_record("g/a/1.0/a-1.0.jar").await, None);

        cache.remove("g/a/1.0/a-1.0.jar").await.unwrap();
        assert!(!dir.path().join("g/a/1.0/a-1.0.jar.launcher.json").exists());
    }

    #[test]
    fn test_metadata_path() {
        let cache = LocalCache::new(PathBuf::from("/cache"));
        assert_eq!(
            cache.metadata_path_for("g/a/1.0-SNAPSHOT/maven-metadata.xml", "central"),
            PathBuf::from("/cache/g/a/1.0-SNAPSHOT/maven-metadata-central.xml"),
        );
    }
}
