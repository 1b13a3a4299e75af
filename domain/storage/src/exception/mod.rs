pub type FileResult<T> = Result<T, FileException>;

#[derive(Debug, thiserror::Error)]
pub enum FileException {
    #[error("Content type: \"{content_type}\" is not accepted.")]
    UnsupportedMediaType { content_type: String },

    #[error("Object size: {size} exceeds the maximum object size: {max}.")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("File is empty, no need to upload.")]
    EmptyFile,

    #[error("Declared content length: {declared} doesn't match received bytes: {received}.")]
    LengthMismatch { declared: u64, received: u64 },

    #[error("Upload of object: {object_key} failed: {source}")]
    UploadFailed {
        object_key: String,
        #[source]
        source: UploadFailure,
    },

    #[error("File internal error: {source}")]
    InternalError {
        #[source]
        source: anyhow::Error,
    },
}

impl FileException {
    /// Whether the error is caused by the request rather than the server or the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMediaType { .. }
                | Self::PayloadTooLarge { .. }
                | Self::EmptyFile
                | Self::LengthMismatch { .. }
        )
    }
}

impl From<anyhow::Error> for FileException {
    fn from(e: anyhow::Error) -> Self {
        FileException::InternalError { source: e }
    }
}

/// Failures of a multipart transaction. Every fatal one ends with an abort.
#[derive(Debug, thiserror::Error)]
pub enum UploadFailure {
    #[error("can't open multipart upload: {source}")]
    Open {
        #[source]
        source: anyhow::Error,
    },

    #[error("reading request body failed: {source}")]
    StreamRead {
        #[source]
        source: std::io::Error,
    },

    #[error("store rejected part {part_number}: {source}")]
    PartUpload {
        part_number: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("store returned receipt for part {received} while part {expected} was uploaded")]
    UnmatchedPart { expected: u32, received: u32 },

    #[error("store rejected completion: {source}")]
    Finalize {
        #[source]
        source: anyhow::Error,
    },

    #[error("upload was cancelled")]
    Cancelled,

    /// Cleanup after one of the failures above. Only logged, never returned to callers.
    #[error("can't abort multipart upload: {source}")]
    Abort {
        #[source]
        source: anyhow::Error,
    },
}
