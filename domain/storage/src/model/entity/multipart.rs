use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exception::{FileException, FileResult};

/// An open multipart upload on the object store.
///
/// Owned by exactly one upload; it is never shared between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Multipart {
    /// Key of the object being assembled.
    pub object_key: String,
    /// Opaque transaction id issued by the store.
    pub upload_id: String,
    /// Number the next part will be uploaded with, starting at 1.
    pub next_part_number: u32,
    pub opened_at: DateTime<Utc>,
    state: MultipartState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultipartState {
    Open,
    UploadingParts,
    Finalizing,
    Completed,
    Aborting,
    Aborted,
}

impl MultipartState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    fn can_become(self, next: Self) -> bool {
        use MultipartState::*;
        match (self, next) {
            (Open, UploadingParts | Finalizing) => true,
            (UploadingParts, UploadingParts | Finalizing) => true,
            (Finalizing, Completed) => true,
            (Aborting, Aborted) => true,
            (from, Aborting) => !from.is_terminal() && from != Aborting,
            _ => false,
        }
    }
}

impl Multipart {
    pub fn new(object_key: impl Into<String>, upload_id: impl Into<String>) -> Self {
        Self {
            object_key: object_key.into(),
            upload_id: upload_id.into(),
            next_part_number: 1,
            opened_at: Utc::now(),
            state: MultipartState::Open,
        }
    }

    pub fn state(&self) -> MultipartState {
        self.state
    }

    /// Move the transaction to `next`, refusing anything the state machine doesn't allow.
    pub fn transition(&mut self, next: MultipartState) -> FileResult<()> {
        if !self.state.can_become(next) {
            return Err(FileException::InternalError {
                source: anyhow::anyhow!(
                    "multipart {} can't go from {:?} to {:?}",
                    self.upload_id,
                    self.state,
                    next
                ),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Take the number for the next part. Part numbers are never reused.
    pub fn next_part(&mut self) -> FileResult<u32> {
        self.transition(MultipartState::UploadingParts)?;
        let part_number = self.next_part_number;
        self.next_part_number += 1;
        Ok(part_number)
    }

    /// Count of part numbers handed out so far.
    pub fn parts_taken(&self) -> u32 {
        self.next_part_number - 1
    }
}
