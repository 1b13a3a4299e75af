mod multipart;
mod object_store;

#[rustfmt::skip]
pub use {
    multipart::MultipartUploadService,
    object_store::ObjectStoreService,
};
