use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use domain_storage::{
    exception::{FileException, FileResult, UploadFailure},
    model::{
        entity::{CompletedUpload, Multipart, MultipartState},
        vo::{is_contiguous, BodyStream, MediaTypePolicy, UploadRequest},
    },
    service::{MultipartUploadService, ObjectStoreService},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Span};
use typed_builder::TypedBuilder;

use crate::{BufferPool, StreamChunker};

/// Smallest part S3-compatible stores accept for every part but the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

pub const DEFAULT_MAX_OBJECT_SIZE: u64 = 2500 * 1024 * 1024;

/// Most parts one S3 multipart upload can hold.
pub const MAX_PART_COUNT: u32 = 10_000;

/// Streams a request body into the object store, one part at a time.
///
/// Parts are uploaded strictly in order and one at a time: the body can't be re-read, so a
/// failed part ends the whole transaction with an abort.
#[derive(TypedBuilder)]
pub struct MultipartUploadServiceImpl {
    object_store: Arc<dyn ObjectStoreService>,
    #[builder(default)]
    media_policy: MediaTypePolicy,
    #[builder(default = DEFAULT_MAX_OBJECT_SIZE)]
    max_object_size: u64,
    /// Size of every part but the last. Must not be below the store's minimum part size.
    #[builder(default = MIN_PART_SIZE)]
    part_size: usize,
    #[builder(default, setter(strip_option))]
    buffer_pool: Option<Arc<BufferPool>>,
}

fn failed(multipart: &Multipart, source: UploadFailure) -> FileException {
    FileException::UploadFailed {
        object_key: multipart.object_key.to_owned(),
        source,
    }
}

#[async_trait]
impl MultipartUploadService for MultipartUploadServiceImpl {
    fn admit(&self, content_type: &str, declared_length: Option<u64>) -> FileResult<()> {
        if self.part_size == 0 {
            return Err(anyhow!("part size must not be zero").into());
        }
        if !self.media_policy.is_allowed(content_type) {
            return Err(FileException::UnsupportedMediaType {
                content_type: content_type.to_owned(),
            });
        }
        let max = self.size_limit();
        match declared_length {
            Some(size) if size > max => Err(FileException::PayloadTooLarge { size, max }),
            Some(0) => Err(FileException::EmptyFile),
            _ => Ok(()),
        }
    }

    #[tracing::instrument(
        skip_all,
        fields(
            content_type = %request.content_type,
            declared_length = ?request.declared_length,
            object_key = tracing::field::Empty,
        )
    )]
    async fn upload(
        &self,
        request: UploadRequest,
        cancel: CancellationToken,
    ) -> FileResult<CompletedUpload> {
        let UploadRequest {
            content_type,
            declared_length,
            body,
        } = request;
        self.admit(&content_type, declared_length)?;

        let object_key = self.media_policy.object_key(&content_type);
        Span::current().record("object_key", object_key.as_str());
        if cancel.is_cancelled() {
            return Err(FileException::UploadFailed {
                object_key,
                source: UploadFailure::Cancelled,
            });
        }

        // Without an upload id there is nothing to abort.
        let mut multipart =
            match self.object_store.create_multipart(&object_key, &content_type).await {
                Ok(el) => el,
                Err(source) => {
                    warn!(error = %source, "can't open multipart upload");
                    return Err(FileException::UploadFailed {
                        object_key,
                        source: UploadFailure::Open { source },
                    });
                }
            };
        debug!(upload_id = %multipart.upload_id, "multipart upload opened");

        let mut chunker = StreamChunker::new(body, self.part_size);
        if let Some(pool) = &self.buffer_pool {
            chunker = chunker.with_pool(pool.clone());
        }
        match self.transfer(&mut multipart, &mut chunker, declared_length, &cancel).await {
            Ok(completed) => Ok(completed),
            Err(e) => {
                if e.is_client_error() {
                    info!(error = %e, "rejecting upload");
                } else {
                    warn!(error = %e, "multipart upload failed");
                }
                self.abort(&mut multipart).await;
                Err(e)
            }
        }
    }
}

impl MultipartUploadServiceImpl {
    async fn transfer(
        &self,
        multipart: &mut Multipart,
        chunker: &mut StreamChunker<BodyStream>,
        declared_length: Option<u64>,
        cancel: &CancellationToken,
    ) -> FileResult<CompletedUpload> {
        let mut receipts = vec![];
        let mut received = 0u64;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(failed(multipart, UploadFailure::Cancelled)),
                chunk = chunker.next_chunk() => chunk
                    .map_err(|source| failed(multipart, UploadFailure::StreamRead { source }))?,
            };
            let size = chunk.content.len();
            received += size as u64;
            self.check_received(received, declared_length)?;

            if size > 0 {
                let part_number = multipart.next_part()?;
                let receipt = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(failed(multipart, UploadFailure::Cancelled));
                    }
                    receipt = self.object_store.upload_part(multipart, part_number, chunk.content) => {
                        receipt.map_err(|source| {
                            failed(multipart, UploadFailure::PartUpload { part_number, source })
                        })?
                    }
                };
                if receipt.part_number != part_number {
                    return Err(failed(
                        multipart,
                        UploadFailure::UnmatchedPart {
                            expected: part_number,
                            received: receipt.part_number,
                        },
                    ));
                }
                debug!(part_number, size, "part uploaded");
                receipts.push(receipt);
            }
            if chunk.is_final {
                break;
            }
        }

        if received == 0 {
            return Err(FileException::EmptyFile);
        }
        if let Some(declared) = declared_length {
            if declared != received {
                return Err(FileException::LengthMismatch { declared, received });
            }
        }
        if !is_contiguous(&receipts) || receipts.len() as u32 != multipart.parts_taken() {
            return Err(failed(
                multipart,
                UploadFailure::Finalize {
                    source: anyhow!("receipts don't match the uploaded parts"),
                },
            ));
        }
        if cancel.is_cancelled() {
            return Err(failed(multipart, UploadFailure::Cancelled));
        }

        multipart.transition(MultipartState::Finalizing)?;
        let completed = self
            .object_store
            .complete_multipart(multipart, &receipts)
            .await
            .map_err(|source| failed(multipart, UploadFailure::Finalize { source }))?;
        multipart.transition(MultipartState::Completed)?;
        info!(
            parts = receipts.len(),
            bytes = received,
            elapsed_ms = (Utc::now() - multipart.opened_at).num_milliseconds(),
            "multipart upload completed"
        );
        Ok(completed)
    }

    /// Largest object this service accepts: the configured maximum, capped by what
    /// `MAX_PART_COUNT` parts of `part_size` can hold.
    fn size_limit(&self) -> u64 {
        let by_parts = (self.part_size as u64).saturating_mul(u64::from(MAX_PART_COUNT));
        self.max_object_size.min(by_parts)
    }

    fn check_received(&self, received: u64, declared_length: Option<u64>) -> FileResult<()> {
        let max = self.size_limit();
        if received > max {
            return Err(FileException::PayloadTooLarge {
                size: received,
                max,
            });
        }
        match declared_length {
            Some(declared) if received > declared => {
                Err(FileException::LengthMismatch { declared, received })
            }
            _ => Ok(()),
        }
    }

    /// Best effort: a failed abort is logged and otherwise ignored.
    async fn abort(&self, multipart: &mut Multipart) {
        if let Err(e) = multipart.transition(MultipartState::Aborting) {
            warn!(error = %e, "not aborting");
            return;
        }
        match self.object_store.abort_multipart(multipart).await {
            Ok(()) => {
                if let Err(e) = multipart.transition(MultipartState::Aborted) {
                    warn!(error = %e, "abort state");
                }
                info!(upload_id = %multipart.upload_id, "multipart upload aborted");
            }
            Err(source) => {
                let failure = UploadFailure::Abort { source };
                warn!(upload_id = %multipart.upload_id, error = %failure, "multipart upload left behind");
            }
        }
    }
}
