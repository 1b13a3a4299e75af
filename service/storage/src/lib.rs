mod buffer_pool;
mod chunker;
mod memory;
mod multipart;

#[rustfmt::skip]
pub use {
    buffer_pool::BufferPool,
    chunker::{Chunk, StreamChunker},
    memory::{InMemoryObjectStore, StoredObject},
    multipart::{MultipartUploadServiceImpl, DEFAULT_MAX_OBJECT_SIZE, MAX_PART_COUNT, MIN_PART_SIZE},
};
