use anyhow::{anyhow, Context};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{BehaviorVersion, Region},
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl},
    Client,
};
use bytes::Bytes;
use domain_storage::{
    model::{
        entity::{CompletedUpload, Multipart},
        vo::PartReceipt,
    },
    service::ObjectStoreService,
};
use tracing::{debug, info};

use crate::infrastructure::S3Config;

/// Multipart uploads against an S3 compatible bucket.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint: String,
    public_url: Option<String>,
}

impl S3ObjectStore {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "upload-server",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style)
            .build();
        info!(bucket = %config.bucket, endpoint = %config.endpoint, "S3 object store initialized");
        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.to_owned(),
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
            public_url: config.public_url.as_ref().map(|url| url.trim_end_matches('/').to_owned()),
        }
    }

    fn link(&self, key: &str, location: Option<&str>) -> String {
        match (&self.public_url, location) {
            (Some(public_url), _) => format!("{public_url}/{key}"),
            (None, Some(location)) if !location.is_empty() => location.to_owned(),
            _ => format!("{}/{}/{key}", self.endpoint, self.bucket),
        }
    }
}

#[async_trait]
impl ObjectStoreService for S3ObjectStore {
    async fn create_multipart(&self, key: &str, content_type: &str) -> anyhow::Result<Multipart> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .acl(ObjectCannedAcl::Private)
            .send()
            .await
            .with_context(|| format!("create multipart upload for {key}"))?;
        let upload_id = output
            .upload_id()
            .ok_or_else(|| anyhow!("store returned no upload id for {key}"))?;
        debug!(key, upload_id, "Multipart upload created");
        Ok(Multipart::new(key, upload_id))
    }

    async fn upload_part(
        &self,
        multipart: &Multipart,
        part_number: u32,
        content: Bytes,
    ) -> anyhow::Result<PartReceipt> {
        let size = content.len();
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&multipart.object_key)
            .upload_id(&multipart.upload_id)
            .part_number(i32::try_from(part_number)?)
            .content_length(i64::try_from(size)?)
            .body(ByteStream::from(content))
            .send()
            .await
            .with_context(|| format!("upload part {part_number} of {}", multipart.object_key))?;
        let e_tag = output
            .e_tag()
            .ok_or_else(|| anyhow!("store returned no etag for part {part_number}"))?;
        debug!(key = %multipart.object_key, part_number, size, "Part uploaded");
        Ok(PartReceipt::new(part_number, e_tag))
    }

    async fn complete_multipart(
        &self,
        multipart: &Multipart,
        parts: &[PartReceipt],
    ) -> anyhow::Result<CompletedUpload> {
        let mut completed_parts = Vec::with_capacity(parts.len());
        for part in parts {
            completed_parts.push(
                CompletedPart::builder()
                    .part_number(i32::try_from(part.part_number)?)
                    .e_tag(&part.e_tag)
                    .build(),
            );
        }
        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&multipart.object_key)
            .upload_id(&multipart.upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder().set_parts(Some(completed_parts)).build(),
            )
            .send()
            .await
            .with_context(|| format!("complete multipart upload of {}", multipart.object_key))?;
        Ok(CompletedUpload {
            object_key: multipart.object_key.to_owned(),
            location: self.link(&multipart.object_key, output.location()),
        })
    }

    async fn abort_multipart(&self, multipart: &Multipart) -> anyhow::Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&multipart.object_key)
            .upload_id(&multipart.upload_id)
            .send()
            .await
            .with_context(|| format!("abort multipart upload of {}", multipart.object_key))?;
        debug!(key = %multipart.object_key, upload_id = %multipart.upload_id, "Multipart upload aborted");
        Ok(())
    }
}
