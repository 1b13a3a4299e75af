use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Allow-list of media types accepted for upload, matched by prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTypePolicy {
    pub allowed_prefixes: Vec<String>,
}

impl Default for MediaTypePolicy {
    fn default() -> Self {
        Self {
            allowed_prefixes: vec!["image/".to_owned(), "video/".to_owned()],
        }
    }
}

impl MediaTypePolicy {
    pub fn new<I, S>(allowed_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_prefixes: allowed_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, content_type: &str) -> bool {
        let essence = essence(content_type);
        !essence.is_empty()
            && self
                .allowed_prefixes
                .iter()
                .any(|prefix| essence.starts_with(&prefix.to_ascii_lowercase()))
    }

    /// A fresh, collision-resistant object key, suffixed with the extension of `content_type`.
    pub fn object_key(&self, content_type: &str) -> String {
        let id = Uuid::new_v4();
        match extension_for(content_type) {
            Some(ext) => format!("{id}{ext}"),
            None => id.to_string(),
        }
    }
}

/// Filename extension for well-known media types.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    Some(match essence(content_type).as_str() {
        "image/gif" => ".gif",
        "image/jpeg" => ".jpeg",
        "image/png" => ".png",
        "image/tiff" => ".tiff",
        "image/webp" => ".webp",
        "video/quicktime" => ".mov",
        "video/mpeg" => ".mpeg",
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        _ => return None,
    })
}

/// `type/subtype` in lowercase, without parameters.
fn essence(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}
