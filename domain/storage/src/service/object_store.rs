use async_trait::async_trait;
use bytes::Bytes;

use crate::model::{
    entity::{CompletedUpload, Multipart},
    vo::PartReceipt,
};

/// # Object store
///
/// Multipart transaction operations of a bucket-backed object store.
///
/// Implementations are shared by every concurrent upload, so they must not keep per-upload
/// state outside of what the store itself tracks under `upload_id`.
#[async_trait]
pub trait ObjectStoreService: Send + Sync {
    /// Open a multipart upload for `key`.
    async fn create_multipart(&self, key: &str, content_type: &str) -> anyhow::Result<Multipart>;

    /// Upload one part. `part_number` is 1-based.
    async fn upload_part(
        &self,
        multipart: &Multipart,
        part_number: u32,
        content: Bytes,
    ) -> anyhow::Result<PartReceipt>;

    /// Assemble the object from `parts`, which must be ordered by part number.
    async fn complete_multipart(
        &self,
        multipart: &Multipart,
        parts: &[PartReceipt],
    ) -> anyhow::Result<CompletedUpload>;

    /// Discard the upload and any parts already stored.
    async fn abort_multipart(&self, multipart: &Multipart) -> anyhow::Result<()>;
}
