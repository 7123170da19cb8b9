//! Blob storage behind a narrow collaborator trait
//!
//! Stored objects are immutable and publicly readable; the canonical URL is
//! derived from the bucket name and object path and stays stable for the
//! lifetime of the object.

use loft_core::{ContentHash, LoftError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata returned for a stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Object path within the bucket, namespaced by owner and category
    pub path: String,
    /// Canonical public URL
    pub url: String,
    /// Content type recorded at write time
    pub content_type: String,
    /// Hash of the stored bytes
    pub hash: ContentHash,
}

/// Durable blob storage: put/get/delete keyed by path.
pub trait BlobStore: Send + Sync {
    /// Store bytes at `path`, overwriting any existing object, and return
    /// its canonical public URL and metadata.
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject>;

    /// Fetch an object's bytes. A missing object is `Ok(None)`, not an error.
    fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Delete an object. Returns `false` if it was already absent.
    fn delete(&self, path: &str) -> Result<bool>;

    /// The canonical public URL for `path`, whether or not it exists yet.
    fn public_url(&self, path: &str) -> String;
}

/// Filesystem-backed blob store.
///
/// Lays objects out under a root directory mirroring their bucket paths,
/// with URLs of the `{base_url}/{bucket}/{path}` shape.
pub struct FsBlobStore {
    root: PathBuf,
    bucket: String,
    base_url: String,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, bucket: &str, base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            bucket: bucket.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject> {
        let dest = self.object_path(path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, bytes)?;

        Ok(StoredObject {
            path: path.to_string(),
            url: self.public_url(path),
            content_type: content_type.to_string(),
            hash: ContentHash::from_bytes(bytes),
        })
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let src = self.object_path(path);
        match fs::read(&src) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LoftError::Storage(format!(
                "Failed to read {}: {}",
                path, e
            ))),
        }
    }

    fn delete(&self, path: &str) -> Result<bool> {
        let target = self.object_path(path);
        match fs::remove_file(&target) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LoftError::Storage(format!(
                "Failed to delete {}: {}",
                path, e
            ))),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, path)
    }
}
