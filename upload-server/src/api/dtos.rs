use domain_storage::model::entity::CompletedUpload;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct UploadFileResponse {
    pub key: String,
    pub links: Vec<Link>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Link {
    pub url: String,
}

impl From<CompletedUpload> for UploadFileResponse {
    fn from(value: CompletedUpload) -> Self {
        Self {
            key: value.object_key,
            links: vec![Link { url: value.location }],
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
