use std::collections::BTreeMap;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use domain_storage::{
    model::{
        entity::{CompletedUpload, Multipart},
        vo::PartReceipt,
    },
    service::ObjectStoreService,
};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Object store kept in process memory.
///
/// Follows the S3 multipart rules: parts other than the last must reach `min_part_size`, and
/// completion needs every uploaded part listed once, in order, with matching ETags.
#[derive(TypedBuilder)]
pub struct InMemoryObjectStore {
    #[builder(default = 5 * 1024 * 1024)]
    min_part_size: usize,
    #[builder(default = "memory://".to_owned(), setter(into))]
    location_prefix: String,
    #[builder(default)]
    uploads: DashMap<String, PendingObject>,
    #[builder(default)]
    objects: DashMap<String, StoredObject>,
}

struct PendingObject {
    key: String,
    content_type: String,
    parts: BTreeMap<u32, Bytes>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub content: Bytes,
}

fn e_tag(content: &[u8]) -> String {
    format!("\"{}\"", blake3::hash(content).to_hex())
}

impl InMemoryObjectStore {
    /// A completed object.
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|el| el.value().clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Multipart uploads neither completed nor aborted.
    pub fn pending_upload_count(&self) -> usize {
        self.uploads.len()
    }
}

#[async_trait]
impl ObjectStoreService for InMemoryObjectStore {
    async fn create_multipart(&self, key: &str, content_type: &str) -> anyhow::Result<Multipart> {
        let upload_id = Uuid::new_v4().to_string();
        self.uploads.insert(
            upload_id.clone(),
            PendingObject {
                key: key.to_owned(),
                content_type: content_type.to_owned(),
                parts: BTreeMap::new(),
            },
        );
        Ok(Multipart::new(key, upload_id))
    }

    async fn upload_part(
        &self,
        multipart: &Multipart,
        part_number: u32,
        content: Bytes,
    ) -> anyhow::Result<PartReceipt> {
        if !(1..=10_000).contains(&part_number) {
            bail!("part number {part_number} is out of range");
        }
        let mut pending = self
            .uploads
            .get_mut(&multipart.upload_id)
            .ok_or(anyhow!("no such upload: {}", multipart.upload_id))?;
        let receipt = PartReceipt::new(part_number, e_tag(&content));
        pending.parts.insert(part_number, content);
        Ok(receipt)
    }

    async fn complete_multipart(
        &self,
        multipart: &Multipart,
        parts: &[PartReceipt],
    ) -> anyhow::Result<CompletedUpload> {
        let (_, pending) = self
            .uploads
            .remove(&multipart.upload_id)
            .ok_or(anyhow!("no such upload: {}", multipart.upload_id))?;
        let result = assemble(&pending, parts, self.min_part_size);
        let content = match result {
            Ok(content) => content,
            Err(e) => {
                // A failed completion leaves the upload open, as S3 does.
                self.uploads.insert(multipart.upload_id.clone(), pending);
                return Err(e);
            }
        };
        self.objects.insert(
            pending.key.clone(),
            StoredObject {
                content_type: pending.content_type,
                content,
            },
        );
        Ok(CompletedUpload {
            location: format!("{}{}", self.location_prefix, pending.key),
            object_key: pending.key,
        })
    }

    async fn abort_multipart(&self, multipart: &Multipart) -> anyhow::Result<()> {
        self.uploads
            .remove(&multipart.upload_id)
            .map(|_| ())
            .ok_or(anyhow!("no such upload: {}", multipart.upload_id))
    }
}

fn assemble(
    pending: &PendingObject,
    receipts: &[PartReceipt],
    min_part_size: usize,
) -> anyhow::Result<Bytes> {
    if receipts.is_empty() {
        bail!("a multipart upload needs at least one part");
    }
    if receipts.len() != pending.parts.len() {
        bail!(
            "{} parts listed but {} uploaded",
            receipts.len(),
            pending.parts.len()
        );
    }
    let mut content = BytesMut::new();
    for (nth, (receipt, expected)) in receipts.iter().zip(1u32..).enumerate() {
        if receipt.part_number != expected {
            bail!("part {} listed where part {expected} belongs", receipt.part_number);
        }
        let part = pending
            .parts
            .get(&receipt.part_number)
            .ok_or(anyhow!("part {} was never uploaded", receipt.part_number))?;
        if receipt.e_tag != e_tag(part) {
            bail!("ETag of part {} doesn't match", receipt.part_number);
        }
        let is_last = nth + 1 == receipts.len();
        if !is_last && part.len() < min_part_size {
            bail!(
                "part {} is {} bytes, smaller than the minimum {min_part_size}",
                receipt.part_number,
                part.len()
            );
        }
        content.extend_from_slice(part);
    }
    Ok(content.freeze())
}
