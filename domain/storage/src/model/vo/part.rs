use serde::{Deserialize, Serialize};

/// Store acknowledgement of one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartReceipt {
    /// 1-based part number.
    pub part_number: u32,
    /// Integrity tag (ETag) the store returned for the part.
    pub e_tag: String,
}

impl PartReceipt {
    pub fn new(part_number: u32, e_tag: impl Into<String>) -> Self {
        Self {
            part_number,
            e_tag: e_tag.into(),
        }
    }
}

/// Whether `receipts` is the contiguous sequence `1..=N`.
pub fn is_contiguous(receipts: &[PartReceipt]) -> bool {
    receipts.iter().zip(1u32..).all(|(receipt, expected)| receipt.part_number == expected)
}
