use std::sync::Arc;

use domain_storage::{
    model::vo::MediaTypePolicy,
    service::{MultipartUploadService, ObjectStoreService},
};
use service_storage::{BufferPool, InMemoryObjectStore, MultipartUploadServiceImpl, MIN_PART_SIZE};

use super::{service::prelude::*, StoreConfig, UploadServerConfig};

/// Everything request handlers need, built once at startup.
pub struct ServiceProvider {
    config: UploadServerConfig,
    upload_service: Arc<dyn MultipartUploadService>,
}

impl ServiceProvider {
    pub fn build(config: UploadServerConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let object_store: Arc<dyn ObjectStoreService> = match &config.store {
            StoreConfig::S3(s3) => Arc::new(S3ObjectStore::new(s3)),
            StoreConfig::Memory => Arc::new(
                InMemoryObjectStore::builder()
                    .min_part_size(config.upload.part_size.min(MIN_PART_SIZE))
                    .build(),
            ),
        };
        Ok(Self::with_store(config, object_store))
    }

    pub fn with_store(config: UploadServerConfig, object_store: Arc<dyn ObjectStoreService>) -> Self {
        let upload = &config.upload;
        let buffer_pool = Arc::new(BufferPool::new(upload.buffer_pool_size, upload.part_size));
        let upload_service = MultipartUploadServiceImpl::builder()
            .object_store(object_store)
            .media_policy(MediaTypePolicy::new(upload.allowed_content_types.iter()))
            .max_object_size(upload.max_object_size)
            .part_size(upload.part_size)
            .buffer_pool(buffer_pool)
            .build();
        Self::new(config, Arc::new(upload_service))
    }

    pub fn new(config: UploadServerConfig, upload_service: Arc<dyn MultipartUploadService>) -> Self {
        Self {
            config,
            upload_service,
        }
    }

    pub fn config(&self) -> &UploadServerConfig {
        &self.config
    }

    pub fn upload_service(&self) -> Arc<dyn MultipartUploadService> {
        self.upload_service.clone()
    }
}
