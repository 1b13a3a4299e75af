use crate::{
    exception::FileResult,
    model::{
        entity::{CompletedUpload, Multipart},
        vo::{PartReceipt, UploadRequest},
    },
    service::{MultipartUploadService, ObjectStoreService},
};
use async_trait::async_trait;
use bytes::Bytes;
use mockall::mock;
use tokio_util::sync::CancellationToken;

mock! {
    pub ObjectStore {}
    #[async_trait]
    impl ObjectStoreService for ObjectStore {
        async fn create_multipart(&self, key: &str, content_type: &str) -> anyhow::Result<Multipart>;
        async fn upload_part(
            &self,
            multipart: &Multipart,
            part_number: u32,
            content: Bytes,
        ) -> anyhow::Result<PartReceipt>;
        async fn complete_multipart(
            &self,
            multipart: &Multipart,
            parts: &[PartReceipt],
        ) -> anyhow::Result<CompletedUpload>;
        async fn abort_multipart(&self, multipart: &Multipart) -> anyhow::Result<()>;
    }
}

mock! {
    pub MultipartUpload {}
    #[async_trait]
    impl MultipartUploadService for MultipartUpload {
        fn admit(&self, content_type: &str, declared_length: Option<u64>) -> FileResult<()>;
        async fn upload(
            &self,
            request: UploadRequest,
            cancel: CancellationToken,
        ) -> FileResult<CompletedUpload>;
    }
}
