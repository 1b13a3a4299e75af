use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::exception::FileResult;
use crate::model::{entity::CompletedUpload, vo::UploadRequest};

/// # Streaming multipart upload
///
/// Reads a request body incrementally and stores it as one object through a multipart
/// transaction, so neither side has to hold the whole object in memory.
#[async_trait]
pub trait MultipartUploadService: Send + Sync {
    /// Checks that need no store access and no body bytes: media type and declared length.
    fn admit(&self, content_type: &str, declared_length: Option<u64>) -> FileResult<()>;

    /// Upload the request body as a new object.
    ///
    /// On any failure after the transaction is opened the transaction is aborted before
    /// returning. Once `cancel` fires, no further reads, part uploads or completion happen.
    async fn upload(
        &self,
        request: UploadRequest,
        cancel: CancellationToken,
    ) -> FileResult<CompletedUpload>;
}
