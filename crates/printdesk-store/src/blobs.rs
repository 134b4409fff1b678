// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blob store for uploaded documents, plus SHA-256 fingerprints used to
// detect a document that changed between upload and print.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use printdesk_core::error::{PrintdeskError, Result};

/// Path-keyed document storage.
///
/// Written only by the upload path (`put`) and the retention sweeper
/// (`remove`); print agents only read.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`.  Fails if the path is already taken.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String>;

    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Remove the given paths, returning how many existed.  A missing path
    /// counts as already removed, not as an error.
    async fn remove(&self, paths: &[String]) -> Result<usize>;
}

/// [`BlobStore`] on the local filesystem: `<data dir>/<bucket>/<path>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create the bucket directory if needed.
    pub fn open(data_dir: impl AsRef<Path>, bucket: &str) -> Result<Self> {
        let root = data_dir.as_ref().join(bucket);
        std::fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "blob bucket ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a blob path to a file inside the bucket.  Only plain relative
    /// components are allowed.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let plain = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(PrintdeskError::Blob(format!("invalid blob path: {path:?}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => PrintdeskError::Blob(format!("blob already exists: {path}")),
                _ => PrintdeskError::Blob(format!("create {path}: {e}")),
            })?;
        file.write_all(&bytes)
            .await
            .map_err(|e| PrintdeskError::Blob(format!("write {path}: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| PrintdeskError::Blob(format!("sync {path}: {e}")))?;

        debug!("blob stored");
        Ok(path.to_owned())
    }

    #[instrument(skip(self))]
    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PrintdeskError::Blob(format!("blob not found: {path}")),
            _ => PrintdeskError::Blob(format!("read {path}: {e}")),
        })
    }

    #[instrument(skip(self, paths), fields(count = paths.len()))]
    async fn remove(&self, paths: &[String]) -> Result<usize> {
        let mut removed = 0;
        for path in paths {
            let target = self.resolve(path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(path = %path, "blob already gone");
                }
                Err(e) => return Err(PrintdeskError::Blob(format!("remove {path}: {e}"))),
            }
        }
        debug!(removed, "blobs removed");
        Ok(removed)
    }
}

/// Storage path for a new upload: `jobs/<unix millis>-<8 hex>-<name>` with
/// every character outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn build_storage_path(original_name: &str, now: DateTime<Utc>) -> String {
    let safe: String = original_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.is_empty() || safe.chars().all(|c| c == '.') {
        "document".to_owned()
    } else {
        safe
    };
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("jobs/{}-{}-{}", now.timestamp_millis(), &nonce[..8], safe)
}

/// SHA-256 of `data` as lowercase hex.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against the digest recorded at upload.
pub fn verify_content(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = content_hash(data);
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(PrintdeskError::Integrity {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::open(dir.path(), "print-files").expect("open bucket");
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_remove() {
        let (_dir, store) = bucket();
        store.put("jobs/1-a.pdf", b"%PDF-1.7".to_vec()).await.expect("put");
        assert_eq!(store.get("jobs/1-a.pdf").await.expect("get"), b"%PDF-1.7");

        let removed = store
            .remove(&["jobs/1-a.pdf".to_owned(), "jobs/missing.pdf".to_owned()])
            .await
            .expect("remove");
        assert_eq!(removed, 1);
        assert!(store.get("jobs/1-a.pdf").await.is_err());
    }

    #[tokio::test]
    async fn put_refuses_to_overwrite() {
        let (_dir, store) = bucket();
        store.put("jobs/x.pdf", vec![1]).await.expect("first put");
        assert!(store.put("jobs/x.pdf", vec![2]).await.is_err());
        assert_eq!(store.get("jobs/x.pdf").await.expect("get"), vec![1]);
    }

    #[tokio::test]
    async fn escaping_paths_are_rejected() {
        let (_dir, store) = bucket();
        for bad in ["../secret", "/etc/passwd", "jobs/../../x", ""] {
            assert!(store.put(bad, vec![0]).await.is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn storage_path_is_sanitised() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).expect("timestamp");
        let path = build_storage_path("my report (final).pdf", now);
        assert!(path.starts_with("jobs/1700000000000-"));
        assert!(path.ends_with("-my_report__final_.pdf"));
        assert!(!path.contains(' '));
        assert!(build_storage_path("..", now).ends_with("-document"));
    }

    #[test]
    fn content_hash_known_value() {
        assert_eq!(
            content_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(verify_content(b"hello", &content_hash(b"hello")).is_ok());
        assert!(matches!(
            verify_content(b"hello", "0000"),
            Err(PrintdeskError::Integrity { .. })
        ));
    }
}
