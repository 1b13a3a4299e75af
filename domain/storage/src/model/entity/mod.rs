mod completed_upload;
pub mod multipart;

#[rustfmt::skip]
pub use {
    completed_upload::CompletedUpload,
    multipart::{Multipart, MultipartState},
};
