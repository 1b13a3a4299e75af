use serde::{Deserialize, Serialize};

/// An object assembled by the store from all of its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedUpload {
    /// Object key in the bucket.
    pub object_key: String,
    /// Where the object can be fetched from.
    pub location: String,
}
