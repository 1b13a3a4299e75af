use bytes::Bytes;
use futures::stream::BoxStream;

/// Single-pass request body. Items are consumed in order and can't be re-read.
pub type BodyStream = BoxStream<'static, std::io::Result<Bytes>>;

/// One incoming upload, consumed exactly once by the upload service.
pub struct UploadRequest {
    pub content_type: String,
    /// `Content-Length` of the request, `None` for chunked transfer.
    pub declared_length: Option<u64>,
    pub body: BodyStream,
}

impl UploadRequest {
    pub fn new(
        content_type: impl Into<String>,
        declared_length: Option<u64>,
        body: BodyStream,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            declared_length,
            body,
        }
    }
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("content_type", &self.content_type)
            .field("declared_length", &self.declared_length)
            .finish_non_exhaustive()
    }
}
