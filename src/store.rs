//! Remote object-store contract.
//!
//! The upload pipeline only needs four things from storage: put bytes at a
//! path, turn that path into a download URL, delete a path, and recover the
//! path from a URL it handed out earlier. Records persist URLs, not paths,
//! so deleting an old variant always starts from a URL.
//!
//! Download URLs follow the object-store convention
//! `{base}/o/{percent-encoded path}?{query}`: the storage path is the single
//! percent-encoded segment after the `/o/` marker.
//!
//! [`LocalStore`] implements the contract on a local directory, for the CLI
//! and for integration tests.

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid storage path: {0}")]
    InvalidKey(String),
    #[error("not a download URL: {0}")]
    InvalidUrl(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Characters kept verbatim in the encoded path segment. Everything else,
/// `/` included, is percent-encoded.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Marker that precedes the encoded storage path in a download URL.
const OBJECT_MARKER: &str = "/o/";

/// Remote object store used by the upload pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` at `path`, replacing any existing object.
    async fn put(&self, path: &str, data: Vec<u8>, content_type: &str) -> StoreResult<()>;

    /// Download URL for an existing object.
    async fn download_url(&self, path: &str) -> StoreResult<String>;

    /// Delete the object at `path`.
    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// Store `data` and return its download URL.
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> StoreResult<String> {
        self.put(path, data, content_type).await?;
        self.download_url(path).await
    }

    /// Delete the object a download URL points at.
    async fn delete_by_url(&self, url: &str) -> StoreResult<()> {
        let path = extract_path(url).ok_or_else(|| StoreError::InvalidUrl(url.to_string()))?;
        self.delete(&path).await
    }
}

/// Build a download URL for `path` under `base_url`.
pub fn object_url(base_url: &str, path: &str) -> String {
    format!(
        "{}{OBJECT_MARKER}{}?alt=media",
        base_url.trim_end_matches('/'),
        utf8_percent_encode(path, PATH_SEGMENT)
    )
}

/// Recover the storage path from a download URL.
///
/// Query string and fragment are ignored; the segment after the last `/o/`
/// marker is percent-decoded.
///
/// # Returns
/// * `None` when there is no marker, the segment is empty, or it does not
///   decode to UTF-8
pub fn extract_path(url: &str) -> Option<String> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let (_, encoded) = url[..end].rsplit_once(OBJECT_MARKER)?;
    if encoded.is_empty() {
        return None;
    }
    let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
    Some(decoded.into_owned())
}

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalStore {
    /// # Arguments
    /// * `base_dir` - Root directory for stored objects (created if missing)
    /// * `base_url` - Prefix of the download URLs this store hands out
    pub async fn new(base_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self {
            base_dir,
            base_url: base_url.into(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a storage path to a file, rejecting paths that could escape the
    /// base directory.
    fn object_path(&self, path: &str) -> StoreResult<PathBuf> {
        if path.is_empty()
            || path.starts_with('/')
            || path.contains('\\')
            || path.split('/').any(|segment| segment == ".." || segment.is_empty())
        {
            return Err(StoreError::InvalidKey(path.to_string()));
        }
        Ok(self.base_dir.join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, path: &str, data: Vec<u8>, _content_type: &str) -> StoreResult<()> {
        let file = self.object_path(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        let size = data.len();
        fs::write(&file, data).await.map_err(|e| {
            StoreError::UploadFailed(format!("failed to write {}: {e}", file.display()))
        })?;
        info!(path, size_bytes = size, "local store put");
        Ok(())
    }

    async fn download_url(&self, path: &str) -> StoreResult<String> {
        let file = self.object_path(path)?;
        if !fs::try_exists(&file).await.unwrap_or(false) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(object_url(&self.base_url, path))
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let file = self.object_path(path)?;
        match fs::remove_file(&file).await {
            Ok(()) => {
                info!(path, "local store delete");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(StoreError::DeleteFailed(format!(
                "failed to remove {}: {e}",
                file.display()
            ))),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory store that records every call.
    ///
    /// Puts to any path containing `fail_puts_containing` fail, which lets a
    /// test break exactly one variant of a pair.
    #[derive(Default)]
    pub struct RecordingStore {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
        pub calls: Mutex<Vec<StoreCall>>,
        pub fail_puts_containing: Option<String>,
        pub fail_deletes: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum StoreCall {
        Put(String),
        DownloadUrl(String),
        Delete(String),
    }

    pub const MEMORY_BASE_URL: &str = "mem://bucket";

    impl RecordingStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_puts(pattern: &str) -> Self {
            Self {
                fail_puts_containing: Some(pattern.to_string()),
                ..Self::default()
            }
        }

        pub fn failing_deletes() -> Self {
            Self {
                fail_deletes: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<StoreCall> {
            self.calls.lock().clone()
        }

        pub fn object(&self, path: &str) -> Option<Vec<u8>> {
            self.objects.lock().get(path).cloned()
        }

        pub fn paths(&self) -> Vec<String> {
            let mut paths: Vec<String> = self.objects.lock().keys().cloned().collect();
            paths.sort();
            paths
        }

        pub fn insert(&self, path: &str, data: &[u8]) {
            self.objects.lock().insert(path.to_string(), data.to_vec());
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put(&self, path: &str, data: Vec<u8>, _content_type: &str) -> StoreResult<()> {
            self.calls.lock().push(StoreCall::Put(path.to_string()));
            tokio::task::yield_now().await;
            if let Some(pattern) = &self.fail_puts_containing
                && path.contains(pattern.as_str())
            {
                return Err(StoreError::UploadFailed(format!("refused {path}")));
            }
            self.objects.lock().insert(path.to_string(), data);
            Ok(())
        }

        async fn download_url(&self, path: &str) -> StoreResult<String> {
            self.calls.lock().push(StoreCall::DownloadUrl(path.to_string()));
            if !self.objects.lock().contains_key(path) {
                return Err(StoreError::NotFound(path.to_string()));
            }
            Ok(object_url(MEMORY_BASE_URL, path))
        }

        async fn delete(&self, path: &str) -> StoreResult<()> {
            self.calls.lock().push(StoreCall::Delete(path.to_string()));
            if self.fail_deletes {
                return Err(StoreError::DeleteFailed(format!("refused {path}")));
            }
            match self.objects.lock().remove(path) {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound(path.to_string())),
            }
        }
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    #[test]
    fn extract_path_from_hosted_url() {
        let url = "https://firebasestorage.googleapis.com/v0/b/app.appspot.com/o/trackers%2Fuser42%2Fabc_original.jpg?alt=media&token=t0k3n";
        assert_eq!(
            extract_path(url).as_deref(),
            Some("trackers/user42/abc_original.jpg")
        );
    }

    #[test]
    fn extract_path_decodes_spaces_and_unicode() {
        let url = "https://host/o/a%20b%2F%C3%A9t%C3%A9.jpg";
        assert_eq!(extract_path(url).as_deref(), Some("a b/été.jpg"));
    }

    #[test]
    fn extract_path_ignores_fragment() {
        assert_eq!(extract_path("https://h/o/x.jpg#frag").as_deref(), Some("x.jpg"));
    }

    #[test]
    fn extract_path_rejects_unparsable() {
        assert_eq!(extract_path("https://example.com/images/x.jpg"), None);
        assert_eq!(extract_path("https://host/o/?alt=media"), None);
        assert_eq!(extract_path("https://host/o/%FF%FE"), None);
        assert_eq!(extract_path(""), None);
    }

    #[test]
    fn object_url_round_trips() {
        for path in ["trackers/u1/x_cropped.jpg", "a b/c+d.jpg", "ünï/cödé.jpg"] {
            let url = object_url("https://host/v0/b/bucket/", path);
            assert!(url.starts_with("https://host/v0/b/bucket/o/"), "{url}");
            assert_eq!(extract_path(&url).as_deref(), Some(path));
        }
    }

    #[test]
    fn object_url_encodes_slashes() {
        assert_eq!(
            object_url("mem://bucket", "a/b.jpg"),
            "mem://bucket/o/a%2Fb.jpg?alt=media"
        );
    }

    // =========================================================================
    // LocalStore
    // =========================================================================

    async fn local_store(tmp: &TempDir) -> LocalStore {
        LocalStore::new(tmp.path().join("objects"), "http://localhost:9199/v0/b/test")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn local_upload_writes_file_and_returns_url() {
        let tmp = TempDir::new().unwrap();
        let store = local_store(&tmp).await;

        let url = store
            .upload("trackers/u1/p_original.jpg", b"jpeg".to_vec(), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(
            url,
            "http://localhost:9199/v0/b/test/o/trackers%2Fu1%2Fp_original.jpg?alt=media"
        );
        let on_disk = std::fs::read(store.base_dir().join("trackers/u1/p_original.jpg")).unwrap();
        assert_eq!(on_disk, b"jpeg");
    }

    #[tokio::test]
    async fn local_download_url_of_missing_object_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = local_store(&tmp).await;
        assert!(matches!(
            store.download_url("nope.jpg").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn local_rejects_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let store = local_store(&tmp).await;
        for path in ["", "/etc/passwd", "../x.jpg", "a/../../x.jpg", "a//b.jpg", "a\\b.jpg"] {
            assert!(
                matches!(
                    store.put(path, vec![1], "image/jpeg").await,
                    Err(StoreError::InvalidKey(_))
                ),
                "{path:?}"
            );
        }
    }

    #[tokio::test]
    async fn local_delete_by_url() {
        let tmp = TempDir::new().unwrap();
        let store = local_store(&tmp).await;
        let url = store.upload("a/b.jpg", vec![1, 2], "image/jpeg").await.unwrap();

        store.delete_by_url(&url).await.unwrap();
        assert!(!store.base_dir().join("a/b.jpg").exists());
        assert!(matches!(
            store.delete_by_url(&url).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_by_unparsable_url_is_invalid_url() {
        let tmp = TempDir::new().unwrap();
        let store = local_store(&tmp).await;
        assert!(matches!(
            store.delete_by_url("https://example.com/x.jpg").await,
            Err(StoreError::InvalidUrl(_))
        ));
    }

    // =========================================================================
    // RecordingStore sanity
    // =========================================================================

    #[tokio::test]
    async fn recording_store_records_and_fails_on_pattern() {
        let store = RecordingStore::failing_puts("_cropped");
        store.put("x_original.jpg", vec![1], "image/jpeg").await.unwrap();
        assert!(store.put("x_cropped.jpg", vec![1], "image/jpeg").await.is_err());
        assert_eq!(store.paths(), vec!["x_original.jpg".to_string()]);
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::Put("x_original.jpg".into()),
                StoreCall::Put("x_cropped.jpg".into())
            ]
        );
    }
}
