//! Dual-variant upload pipeline.
//!
//! One logical image is stored as two objects: the full original and the
//! cropped derivative. Both are produced and uploaded together and reported
//! as a single [`VariantPair`]; a caller never sees half a pair.
//!
//! ```text
//! original ─┐  spawn_blocking + rayon::join   ┌─ put + download_url ─┐
//!           ├─ process_for_upload + encode ──┤   (tokio::join!)      ├─▶ VariantPair
//! cropped  ─┘                                 └─ put + download_url ─┘
//! ```
//!
//! 1. **Prepare**: both variants are shaped and encoded concurrently on the
//!    CPU pool. If either fails the call ends with
//!    [`UploadError::ProcessingFailure`] before any network call.
//! 2. **Upload**: both buffers go to `{base}/{uuid}_original.jpg` and
//!    `{base}/{uuid}_cropped.jpg` concurrently. Each upload runs to
//!    completion; if either fails the store error is returned as
//!    [`UploadError::TransportFailure`]. Nothing is retried.
//!
//! ## Replacing a stored pair
//!
//! [`UploadPipeline::replace_pair`] sequences upload → caller's record step
//! → deletion of the previous pair. The old objects are only touched after
//! the caller has durably recorded the new URLs, so a failed upload or a
//! failed record leaves the previous pair intact. Deleting the old pair is
//! best-effort: failures are logged, not returned.

use crate::imaging::{
    Bitmap, CodecError, ImageBackend, RustBackend, UploadParams, prepare_variant,
};
use crate::naming::{self, VariantKind};
use crate::store::{ObjectStore, StoreError};
use crate::types::VariantPair;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Content type of every uploaded variant.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("processing the {variant} variant failed: {source}")]
    ProcessingFailure {
        variant: VariantKind,
        #[source]
        source: CodecError,
    },
    #[error("image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("upload failed: {0}")]
    TransportFailure(#[from] StoreError),
    #[error("recording the new pair failed: {0}")]
    Persistence(Box<dyn StdError + Send + Sync>),
}

/// Encoded bytes of both variants, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPair {
    pub original: Vec<u8>,
    pub cropped: Vec<u8>,
}

pub struct UploadPipeline {
    store: Arc<dyn ObjectStore>,
    backend: Arc<dyn ImageBackend>,
    params: UploadParams,
}

impl UploadPipeline {
    /// Pipeline with the pure-Rust codec and default upload parameters.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_backend(store, Arc::new(RustBackend::new()), UploadParams::default())
    }

    pub fn with_backend(
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn ImageBackend>,
        params: UploadParams,
    ) -> Self {
        Self {
            store,
            backend,
            params,
        }
    }

    pub fn params(&self) -> UploadParams {
        self.params
    }

    /// Shape and encode both variants concurrently on the rayon pool.
    pub async fn prepare_pair(
        &self,
        original: Bitmap,
        cropped: Bitmap,
    ) -> Result<PreparedPair, UploadError> {
        let backend = Arc::clone(&self.backend);
        let params = self.params;
        let (original, cropped) = tokio::task::spawn_blocking(move || {
            rayon::join(
                || prepare_variant(backend.as_ref(), &original, params),
                || prepare_variant(backend.as_ref(), &cropped, params),
            )
        })
        .await?;

        let original = original.map_err(|source| UploadError::ProcessingFailure {
            variant: VariantKind::Original,
            source,
        })?;
        let cropped = cropped.map_err(|source| UploadError::ProcessingFailure {
            variant: VariantKind::Cropped,
            source,
        })?;
        Ok(PreparedPair { original, cropped })
    }

    /// Process and upload both variants under a fresh shared identifier.
    ///
    /// # Errors
    /// * [`UploadError::ProcessingFailure`] if either variant fails to encode
    ///   (no store call is made)
    /// * [`UploadError::TransportFailure`] if either upload fails
    pub async fn upload_pair(
        &self,
        original: Bitmap,
        cropped: Bitmap,
        base_path: &str,
    ) -> Result<VariantPair, UploadError> {
        let id = Uuid::new_v4();
        let prepared = self.prepare_pair(original, cropped).await?;
        debug!(
            %id,
            original_bytes = prepared.original.len(),
            cropped_bytes = prepared.cropped.len(),
            "variant pair prepared"
        );

        let (original_path, cropped_path) = naming::pair_paths(base_path, id);
        let (original_url, cropped_url) = tokio::join!(
            self.store
                .upload(&original_path, prepared.original, JPEG_CONTENT_TYPE),
            self.store
                .upload(&cropped_path, prepared.cropped, JPEG_CONTENT_TYPE),
        );
        let pair = VariantPair {
            original_url: original_url?,
            cropped_url: cropped_url?,
        };

        info!(%id, original = %original_path, cropped = %cropped_path, "variant pair uploaded");
        Ok(pair)
    }

    /// Upload a new pair, let the caller record it, then delete `previous`.
    ///
    /// `record` receives the new pair and must persist it; only when it
    /// succeeds are the previous objects deleted.
    ///
    /// # Errors
    /// * Any [`upload_pair`](Self::upload_pair) error (`record` is not called)
    /// * [`UploadError::Persistence`] if `record` fails (nothing is deleted)
    pub async fn replace_pair<F, Fut, E>(
        &self,
        previous: Option<&VariantPair>,
        original: Bitmap,
        cropped: Bitmap,
        base_path: &str,
        record: F,
    ) -> Result<VariantPair, UploadError>
    where
        F: FnOnce(VariantPair) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let pair = self.upload_pair(original, cropped, base_path).await?;
        record(pair.clone())
            .await
            .map_err(|e| UploadError::Persistence(e.into()))?;

        if let Some(previous) = previous {
            self.delete_pair(previous).await;
        }
        Ok(pair)
    }

    /// Best-effort delete of both objects of a stored pair.
    ///
    /// Empty URLs are skipped. Failures are logged and otherwise ignored.
    pub async fn delete_pair(&self, pair: &VariantPair) {
        let (original, cropped) = tokio::join!(
            self.delete_url(&pair.original_url, VariantKind::Original),
            self.delete_url(&pair.cropped_url, VariantKind::Cropped),
        );
        debug!(original, cropped, "previous variant pair cleanup finished");
    }

    /// Returns whether the object was deleted.
    async fn delete_url(&self, url: &str, variant: VariantKind) -> bool {
        if url.is_empty() {
            return false;
        }
        match self.store.delete_by_url(url).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%variant, url, error = %e, "failed to delete previous variant");
                false
            }
        }
    }
}
