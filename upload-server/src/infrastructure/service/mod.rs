mod s3_object_store;

pub mod prelude {
    pub use super::s3_object_store::S3ObjectStore;
}
